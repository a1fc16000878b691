use super::classifier::classify;
use crate::domain::models::{
    parse_ledger_amount, OperationType, ParsedLedgerTransaction, TokenBalance, TokenCatalog,
    TokenRef, TransactionDetail, TxStatus,
};

/// Decimal places assumed when neither the catalog nor the snapshot can
/// resolve a mint's decimals.
const DEFAULT_DECIMALS: u8 = 9;

/// Direction-aware delta for token amounts, applied after scaling. Known
/// inflow operations count `post - pre`, known outflow operations count
/// `pre - post`, both clamped at zero. Everything else, including Unknown,
/// reports the absolute delta; the deployed client behaves this way and the
/// asymmetry is preserved as observed.
fn signed_amount(operation: OperationType, pre: f64, post: f64) -> f64 {
    match operation {
        OperationType::Deposit | OperationType::Borrow => (post - pre).max(0.0),
        OperationType::Withdraw | OperationType::Repay => (pre - post).max(0.0),
        _ => (post - pre).abs(),
    }
}

/// Catalog first, then the snapshot's own report, then the chain default.
fn resolve_decimals(catalog: &TokenCatalog, snapshot: &TokenBalance) -> u8 {
    catalog
        .get(&snapshot.mint)
        .map(|token| token.decimals)
        .or(snapshot.decimals)
        .unwrap_or(DEFAULT_DECIMALS)
}

/// Computes the scaled token delta for a transaction, by convention from
/// the first post-balance entry, paired with its pre-balance by account
/// index. A freshly created token account has no pre-balance and counts as
/// zero. Returns nothing when no token-program instruction took part.
fn extract_token_delta(
    tx: &ParsedLedgerTransaction,
    operation: OperationType,
    catalog: &TokenCatalog,
) -> (Option<f64>, Option<TokenRef>) {
    let token_program = spl_token::id().to_string();
    if !tx.instructions.iter().any(|ix| ix.program_id == token_program) {
        return (None, None);
    }
    let Some(snapshot) = tx.post_token_balances.first() else {
        return (None, None);
    };

    let post_raw = match parse_ledger_amount(&snapshot.raw_amount) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(mint = %snapshot.mint, "dropping amount: {e}");
            return (None, catalog.get(&snapshot.mint).cloned());
        }
    };
    let pre_raw = tx
        .pre_token_balances
        .iter()
        .find(|pre| pre.account_index == snapshot.account_index)
        .and_then(|pre| match parse_ledger_amount(&pre.raw_amount) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(mint = %snapshot.mint, "unreadable pre-balance, counting zero: {e}");
                None
            }
        })
        .unwrap_or(0);

    let scale = 10f64.powi(resolve_decimals(catalog, snapshot) as i32);
    let amount = signed_amount(operation, pre_raw as f64 / scale, post_raw as f64 / scale);

    (Some(amount), catalog.get(&snapshot.mint).cloned())
}

/// Turns a fetched transaction into its classified, amount-bearing detail.
/// Total: malformed instructions degrade to `Unknown`, unreadable amounts
/// are dropped, nothing here fails.
pub fn decode_detail(
    signature: &str,
    tx: &ParsedLedgerTransaction,
    program_id: &str,
    catalog: &TokenCatalog,
) -> TransactionDetail {
    let program_instruction = tx
        .instructions
        .iter()
        .find(|ix| ix.program_id == program_id);

    let operation = program_instruction
        .map(|ix| classify(&ix.data))
        .unwrap_or(OperationType::Unknown);

    let (amount, token) = extract_token_delta(tx, operation, catalog);

    let status = if tx.err.is_some() {
        TxStatus::Error
    } else {
        TxStatus::Success
    };

    TransactionDetail {
        signature: signature.to_string(),
        operation,
        amount,
        token,
        fee: Some(tx.fee),
        slot: Some(tx.slot),
        block_time: tx.block_time,
        status,
        raw_instruction: program_instruction.cloned(),
        raw_transaction: tx.clone(),
    }
}
