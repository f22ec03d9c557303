pub mod reconcile;
pub mod sweep;
