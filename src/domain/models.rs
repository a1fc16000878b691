use super::errors::AmountError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of operations the lending program can perform. `Unknown` is
/// both the initial state of a freshly fetched summary and the fallback
/// whenever classification finds no matching discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    InitAccount,
    InitAccountState,
    Unknown,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OperationType::Deposit => "deposit",
            OperationType::Withdraw => "withdraw",
            OperationType::Borrow => "borrow",
            OperationType::Repay => "repay",
            OperationType::InitAccount => "init_account",
            OperationType::InitAccountState => "init_account_state",
            OperationType::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Error,
    Pending,
}

/// Lightweight record produced by the signature-list call. One per
/// signature per account; immutable until superseded by a decoded detail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub signature: String,
    /// Unix seconds; zero when the ledger reported no block time.
    pub timestamp: i64,
    pub block_time: Option<i64>,
    pub status: TxStatus,
}

/// Token metadata resolved from the external catalog. Never authored here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRef {
    /// Mint address; external catalogs also call this `address`.
    #[serde(alias = "address")]
    pub mint: String,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "logoURI", default)]
    pub logo_uri: String,
    pub decimals: u8,
}

/// Mint address -> metadata, loaded once by the caller and passed in.
#[derive(Clone, Debug, Default)]
pub struct TokenCatalog {
    tokens: std::collections::HashMap<String, TokenRef>,
}

impl TokenCatalog {
    pub fn get(&self, mint: &str) -> Option<&TokenRef> {
        self.tokens.get(mint)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<TokenRef> for TokenCatalog {
    fn from_iter<I: IntoIterator<Item = TokenRef>>(iter: I) -> Self {
        Self {
            tokens: iter
                .into_iter()
                .map(|t| (t.mint.clone(), t))
                .collect(),
        }
    }
}

/// One instruction of a fetched transaction: the program it targets and its
/// opaque payload, already decoded from base58.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawInstruction {
    pub program_id: String,
    pub data: Vec<u8>,
}

/// Pre- or post-execution token balance of one account within a transaction.
/// `raw_amount` stays a string exactly as the RPC delivers it; it is only
/// interpreted through [`parse_ledger_amount`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: u8,
    pub mint: String,
    pub owner: Option<String>,
    pub raw_amount: String,
    /// As reported by the snapshot itself; absent on some RPC providers.
    pub decimals: Option<u8>,
}

/// Domain projection of a fully fetched, parsed ledger transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParsedLedgerTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub fee: u64,
    pub err: Option<String>,
    pub instructions: Vec<RawInstruction>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

/// Record from the ledger's signature-list call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub err: Option<String>,
}

impl SignatureRecord {
    pub fn into_summary(self) -> TransactionSummary {
        let status = if self.err.is_some() {
            TxStatus::Error
        } else {
            TxStatus::Success
        };
        TransactionSummary {
            signature: self.signature,
            timestamp: self.block_time.unwrap_or_default(),
            block_time: self.block_time,
            status,
        }
    }
}

/// Superset of a summary produced on first successful decode of a
/// signature. Effectively immutable afterwards; a settled transaction's
/// on-ledger content cannot change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub signature: String,
    pub operation: OperationType,
    pub amount: Option<f64>,
    pub token: Option<TokenRef>,
    pub fee: Option<u64>,
    pub slot: Option<u64>,
    pub block_time: Option<i64>,
    pub status: TxStatus,
    pub raw_instruction: Option<RawInstruction>,
    pub raw_transaction: ParsedLedgerTransaction,
}

/// One row of the merged history view served to the presentation layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub signature: String,
    pub timestamp: i64,
    pub block_time: Option<i64>,
    pub status: TxStatus,
    pub operation: OperationType,
    pub amount: Option<f64>,
    pub token: Option<TokenRef>,
    pub fee: Option<u64>,
    pub slot: Option<u64>,
}

impl HistoryRecord {
    pub fn from_summary(summary: &TransactionSummary) -> Self {
        Self {
            signature: summary.signature.clone(),
            timestamp: summary.timestamp,
            block_time: summary.block_time,
            status: summary.status,
            operation: OperationType::Unknown,
            amount: None,
            token: None,
            fee: None,
            slot: None,
        }
    }

    /// Enriches this row in place; position in the list never changes.
    pub fn merge_detail(&mut self, detail: &TransactionDetail) {
        self.operation = detail.operation;
        self.amount = detail.amount;
        self.token = detail.token.clone();
        self.fee = detail.fee;
        self.slot = detail.slot;
        if let Some(block_time) = detail.block_time {
            self.block_time = Some(block_time);
            self.timestamp = block_time;
        }
    }
}

/// Mutable filter state held by the facade. Only the date range feeds the
/// signature fetch; token and operation filters narrow already-fetched rows.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub token_symbol: Option<String>,
    pub operation: Option<OperationType>,
}

impl HistoryFilter {
    /// Inclusive date-window check on a block time. Records without a block
    /// time are excluded once either bound is set.
    pub fn window_contains(&self, block_time: Option<i64>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(block_time) = block_time else {
            return false;
        };
        if let Some(start) = self.start {
            if block_time < start.timestamp() {
                return false;
            }
        }
        if let Some(end) = self.end {
            if block_time > end.timestamp() {
                return false;
            }
        }
        true
    }

    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if !self.window_contains(record.block_time) {
            return false;
        }
        if let Some(symbol) = &self.token_symbol {
            match &record.token {
                Some(token) if token.symbol.eq_ignore_ascii_case(symbol) => {}
                _ => return false,
            }
        }
        if let Some(operation) = self.operation {
            if record.operation != operation {
                return false;
            }
        }
        true
    }
}

/// Total parser for the heterogeneous raw amounts the RPC reports. The raw
/// value is a base-10 integer string of the smallest token unit.
pub fn parse_ledger_amount(raw: &str) -> Result<u64, AmountError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| AmountError::Unparseable(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signature_record_with_err_becomes_error_summary() {
        let record = SignatureRecord {
            signature: "S2".into(),
            slot: 7,
            block_time: Some(50),
            err: Some("fail".into()),
        };
        let summary = record.into_summary();
        assert_eq!(summary.status, TxStatus::Error);
        assert_eq!(summary.timestamp, 50);
    }

    #[test]
    fn parse_ledger_amount_is_total() {
        assert_eq!(parse_ledger_amount("1500").unwrap(), 1500);
        assert_eq!(parse_ledger_amount(" 42 ").unwrap(), 42);
        assert!(matches!(
            parse_ledger_amount("12.5"),
            Err(AmountError::Unparseable(_))
        ));
        assert!(matches!(
            parse_ledger_amount("abc"),
            Err(AmountError::Unparseable(_))
        ));
    }

    #[test]
    fn window_is_inclusive_and_drops_missing_block_times() {
        let filter = HistoryFilter {
            start: Some(Utc.timestamp_opt(100, 0).unwrap()),
            end: Some(Utc.timestamp_opt(200, 0).unwrap()),
            ..Default::default()
        };
        assert!(filter.window_contains(Some(100)));
        assert!(filter.window_contains(Some(200)));
        assert!(!filter.window_contains(Some(99)));
        assert!(!filter.window_contains(Some(201)));
        assert!(!filter.window_contains(None));

        let open = HistoryFilter::default();
        assert!(open.window_contains(None));
    }
}
