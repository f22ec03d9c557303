use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    /// Shared secret the gateway signs webhook bodies with.
    pub gateway_webhook_secret: SecretString,
    /// API key for the gateway's transaction-verify endpoint.
    pub gateway_api_key: SecretString,
    pub gateway_base_url: Url,
    pub billing_base_url: Url,
    pub billing_api_key: SecretString,
    /// Bearer token for the operator routes.
    pub operator_token: SecretString,
    /// Total request timeout for outbound verification calls.
    pub verify_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let gateway_webhook_secret =
            SecretString::new(get_env::<String>("GATEWAY_WEBHOOK_SECRET").into());
        let gateway_api_key = SecretString::new(get_env::<String>("GATEWAY_API_KEY").into());
        let gateway_base_url: Url = get_env("GATEWAY_BASE_URL");
        let billing_base_url: Url = get_env("BILLING_BASE_URL");
        let billing_api_key = SecretString::new(get_env::<String>("BILLING_API_KEY").into());
        let operator_token = SecretString::new(get_env::<String>("OPERATOR_TOKEN").into());

        let verify_timeout_secs: u64 = get_env_default("VERIFY_TIMEOUT_SECS", 10);
        let sweep_interval_secs: u64 = get_env_default("SWEEP_INTERVAL_SECS", 3600);
        let sweep_page_size: i64 = get_env_default("SWEEP_PAGE_SIZE", 300);

        Self {
            bind_addr,
            database_url,
            cors_origin,
            gateway_webhook_secret,
            gateway_api_key,
            gateway_base_url,
            billing_base_url,
            billing_api_key,
            operator_token,
            verify_timeout_secs,
            sweep_interval_secs,
            sweep_page_size,
        }
    }
}

fn get_env<T: FromStr>(name: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    std::env::var(name)
        .unwrap_or_else(|_| panic!("{name} must be set"))
        .parse()
        .unwrap_or_else(|e| panic!("{name} is invalid: {e:?}"))
}

fn get_env_default<T: FromStr>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{name} is invalid: {e:?}")),
        Err(_) => default,
    }
}
