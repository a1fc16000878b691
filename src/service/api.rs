use crate::application::history::TransactionHistory;
use crate::domain::errors::HistoryError;
use crate::domain::models::{HistoryRecord, OperationType, TransactionDetail};
use crate::infrastructure::ledger_client::LedgerClient;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

pub async fn start_server<C>(
    shutdown: broadcast::Sender<()>,
    history: Arc<TransactionHistory<C>>,
    listen_port: u16,
) -> anyhow::Result<()>
where
    C: LedgerClient + Send + Sync + 'static,
{
    let app = Router::new()
        .route("/history", get(get_history::<C>))
        .route("/history/:signature", get(get_detail::<C>))
        .route("/cache", delete(sweep_caches::<C>))
        .with_state(history)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", listen_port)).await?;
    let server = axum::serve(listener, app);

    tracing::info!("API server started on port {listen_port}");

    let mut shutdown_rx = shutdown.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::warn!("API server received shutdown signal");
        }
        _ = server => {
            tracing::warn!("API server stopped unexpectedly");
        }
    }

    Ok(())
}

#[derive(Deserialize)]
struct HistoryQuery {
    /// `%Y-%m-%d`, inclusive.
    start: Option<String>,
    /// `%Y-%m-%d`, inclusive.
    end: Option<String>,
    token: Option<String>,
    operation: Option<OperationType>,
}

fn day_start(day: &str) -> Result<DateTime<Utc>, StatusCode> {
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
}

fn day_end(day: &str) -> Result<DateTime<Utc>, StatusCode> {
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(date.and_hms_opt(23, 59, 59).unwrap().and_utc())
}

fn status_of(error: &HistoryError) -> StatusCode {
    match error {
        HistoryError::RetriesExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        HistoryError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_history<C>(
    State(history): State<Arc<TransactionHistory<C>>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>, StatusCode>
where
    C: LedgerClient + Send + Sync + 'static,
{
    let start = params.start.as_deref().map(day_start).transpose()?;
    let end = params.end.as_deref().map(day_end).transpose()?;
    history.set_date_range(start, end).await;
    history.set_token_filter(params.token).await;
    history.set_operation_filter(params.operation).await;

    history
        .fetch_summaries()
        .await
        .map_err(|e| status_of(&e))?;

    Ok(Json(history.records().await))
}

async fn get_detail<C>(
    State(history): State<Arc<TransactionHistory<C>>>,
    Path(signature): Path<String>,
) -> Result<Json<TransactionDetail>, StatusCode>
where
    C: LedgerClient + Send + Sync + 'static,
{
    match history.fetch_detail(&signature).await {
        Ok(Some(detail)) => Ok(Json(detail)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(status_of(&e)),
    }
}

async fn sweep_caches<C>(State(history): State<Arc<TransactionHistory<C>>>) -> StatusCode
where
    C: LedgerClient + Send + Sync + 'static,
{
    history.cleanup();
    StatusCode::NO_CONTENT
}
