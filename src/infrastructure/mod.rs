pub mod backoff;
pub mod cache;
pub mod ledger_client;
pub mod solana_client;
pub mod throttle;
