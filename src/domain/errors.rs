use thiserror::Error;

/// Failures raised by the ledger RPC boundary.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("rate limited by rpc endpoint: {0}")]
    RateLimited(String),
    #[error("rpc transport failure: {0}")]
    Transport(String),
    #[error("invalid account address {0}")]
    InvalidAccount(String),
    #[error("invalid transaction signature {0}")]
    InvalidSignature(String),
}

/// Failures raised while turning a raw balance snapshot into a token amount.
#[derive(Error, Debug)]
pub enum AmountError {
    #[error("unparseable raw token amount {0:?}")]
    Unparseable(String),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Raised by the backoff scheduler once every retry slot has been
    /// consumed by a rate-limit response. Distinct from
    /// `LedgerError::RateLimited` so callers can tell a single transient
    /// rejection from an exhausted retry budget.
    #[error("ledger call still rate limited after {attempts} retries")]
    RetriesExceeded { attempts: usize },
}

impl LedgerError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LedgerError::RateLimited(_))
    }
}

impl HistoryError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, HistoryError::Ledger(e) if e.is_rate_limited())
    }
}
