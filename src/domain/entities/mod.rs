pub mod entitlement;
pub mod ledger_entry;
pub mod payment_event;
