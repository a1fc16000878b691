use crate::application::decoder::decode_detail;
use crate::domain::errors::HistoryError;
use crate::domain::models::{
    HistoryFilter, HistoryRecord, OperationType, SignatureRecord, TokenCatalog,
    TransactionDetail, TransactionSummary,
};
use crate::infrastructure::backoff::retry_on_rate_limit;
use crate::infrastructure::cache::{SystemClock, TtlCache};
use crate::infrastructure::ledger_client::LedgerClient;
use crate::infrastructure::throttle::QueryThrottle;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use typed_builder::TypedBuilder;

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Cooperative cancellation for the drip-feed loop. Cancelling never aborts
/// an in-flight ledger call, it only skips the iterations that follow.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Two-phase query surface over the ledger for one account's lending
/// activity. Phase one fetches cheap signature summaries; phase two lazily
/// decodes each signature into a classified, amount-bearing detail and
/// merges it into the summary list in place.
#[derive(TypedBuilder)]
pub struct TransactionHistory<C> {
    client: C,
    account: String,
    program_id: String,
    #[builder(default)]
    catalog: TokenCatalog,
    #[builder(default = TtlCache::new(DEFAULT_TTL, Arc::new(SystemClock)))]
    summaries_cache: TtlCache<String, Vec<TransactionSummary>>,
    #[builder(default = TtlCache::new(DEFAULT_TTL, Arc::new(SystemClock)))]
    details_cache: TtlCache<String, TransactionDetail>,
    #[builder(default = QueryThrottle::new(DEFAULT_MIN_INTERVAL, Arc::new(SystemClock)))]
    throttle: QueryThrottle,
    #[builder(default = DEFAULT_PAGE_LIMIT)]
    page_limit: usize,
    #[builder(default = 3)]
    max_retries: usize,
    #[builder(default = Duration::from_millis(500))]
    base_delay: Duration,
    #[builder(default = Duration::from_millis(800))]
    drip_delay: Duration,
    #[builder(default)]
    filter: RwLock<HistoryFilter>,
    #[builder(default)]
    summaries: RwLock<Vec<TransactionSummary>>,
    #[builder(default)]
    cancel: CancelToken,
}

impl<C> TransactionHistory<C>
where
    C: LedgerClient,
{
    fn summaries_key(&self, filter: &HistoryFilter) -> String {
        format!(
            "summaries:{}:{}:{}",
            self.account,
            filter.start.map(|d| d.timestamp()).unwrap_or(i64::MIN),
            filter.end.map(|d| d.timestamp()).unwrap_or(i64::MAX),
        )
    }

    /// Refreshes the summary list: throttle gate, then cache, then a
    /// backoff-wrapped signature-list call. The date window is applied
    /// client-side, inclusive on both bounds. A throttled call returns an
    /// empty no-op result; a ledger failure after retries falls back to the
    /// last cached value for this query when one exists.
    pub async fn fetch_summaries(&self) -> Result<Vec<TransactionSummary>, HistoryError> {
        let filter = self.filter.read().await.clone();
        let key = self.summaries_key(&filter);

        if !self.throttle.admit(&key) {
            return Ok(Vec::new());
        }

        if let Some(cached) = self.summaries_cache.get(&key) {
            tracing::debug!(%key, "summaries served from cache");
            *self.summaries.write().await = cached.clone();
            return Ok(cached);
        }

        let fetched = retry_on_rate_limit(
            || self.client.signatures_for_account(&self.account, self.page_limit),
            self.max_retries,
            self.base_delay,
        )
        .await;

        match fetched {
            Ok(records) => {
                // Ledger order (descending block time) is preserved as is.
                let summaries: Vec<TransactionSummary> = records
                    .into_iter()
                    .map(SignatureRecord::into_summary)
                    .filter(|summary| filter.window_contains(summary.block_time))
                    .collect();
                tracing::info!(account = %self.account, count = summaries.len(), "fetched summaries");
                self.summaries_cache.insert(key, summaries.clone());
                *self.summaries.write().await = summaries.clone();
                Ok(summaries)
            }
            Err(e) => match self.summaries_cache.get_stale(&key) {
                Some(stale) => {
                    tracing::warn!("serving stale summaries after ledger failure: {e}");
                    *self.summaries.write().await = stale.clone();
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// On-demand enrichment of one signature. `Ok(None)` when the ledger has
    /// no record of it. Failures are not cached, so a later call retries;
    /// a decoded detail is cached and served unchanged thereafter.
    pub async fn fetch_detail(
        &self,
        signature: &str,
    ) -> Result<Option<TransactionDetail>, HistoryError> {
        let key = signature.to_string();
        if let Some(detail) = self.details_cache.get(&key) {
            return Ok(Some(detail));
        }

        let fetched = retry_on_rate_limit(
            || self.client.parsed_transaction(signature),
            self.max_retries,
            self.base_delay,
        )
        .await?;

        let Some(tx) = fetched else {
            tracing::debug!(signature, "no ledger record for signature");
            return Ok(None);
        };

        let detail = decode_detail(signature, &tx, &self.program_id, &self.catalog);
        self.details_cache.insert(key, detail.clone());
        Ok(Some(detail))
    }

    /// Serially resolves details for every summary that has none yet, one
    /// signature at a time with a fixed inter-item delay. The pacing is the
    /// rate-limiting discipline for detail enrichment, not accidental
    /// serialization. One bad transaction never blocks the rest.
    pub async fn resolve_pending_details(&self) {
        let pending: Vec<String> = {
            let summaries = self.summaries.read().await;
            summaries
                .iter()
                .filter(|s| self.details_cache.get_stale(&s.signature).is_none())
                .map(|s| s.signature.clone())
                .collect()
        };

        for signature in pending {
            if self.cancel.is_cancelled() {
                tracing::info!("drip-feed cancelled, skipping remaining signatures");
                break;
            }
            if let Err(e) = self.fetch_detail(&signature).await {
                tracing::warn!(%signature, "detail fetch failed: {e}");
            }
            tokio::time::sleep(self.drip_delay).await;
        }
    }

    /// Merged view: summaries in ledger order, enriched in place with any
    /// decoded detail, narrowed by the current filter state. Details are
    /// immutable once decoded, so the merge reads past their TTL.
    pub async fn records(&self) -> Vec<HistoryRecord> {
        let filter = self.filter.read().await.clone();
        let summaries = self.summaries.read().await;
        summaries
            .iter()
            .map(|summary| {
                let mut record = HistoryRecord::from_summary(summary);
                if let Some(detail) = self.details_cache.get_stale(&summary.signature) {
                    record.merge_detail(&detail);
                }
                record
            })
            .filter(|record| filter.matches(record))
            .collect()
    }

    pub async fn set_date_range(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        let mut filter = self.filter.write().await;
        filter.start = start;
        filter.end = end;
    }

    pub async fn set_token_filter(&self, symbol: Option<String>) {
        self.filter.write().await.token_symbol = symbol;
    }

    pub async fn set_operation_filter(&self, operation: Option<OperationType>) {
        self.filter.write().await.operation = operation;
    }

    /// Handle callers hold on to for stopping the drip-feed at teardown.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Explicit cache sweep; nothing here runs on a background timer.
    pub fn cleanup(&self) {
        self.summaries_cache.sweep();
        self.details_cache.sweep();
    }
}
