use crate::domain::errors::LedgerError;
use crate::domain::models::{ParsedLedgerTransaction, SignatureRecord};

/// Boundary to the authoritative ledger. Only two calls are needed: the
/// lightweight signature list and the full parsed transaction for one
/// signature.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Most recent signatures touching `account`, newest first as the
    /// ledger delivers them, bounded to `limit` entries.
    async fn signatures_for_account(
        &self,
        account: &str,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError>;

    /// Full parsed transaction. `Ok(None)` when the ledger has no record of
    /// the signature, which is distinct from a transport failure.
    async fn parsed_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<ParsedLedgerTransaction>, LedgerError>;
}
