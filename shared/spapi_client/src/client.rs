//! Typed marketplace client
//!
//! Every operation goes through one request policy: acquire a throttle
//! token, attach the tenant's credential, then classify failures - 401
//! rotates once, 429 penalizes the shared bucket and waits it out, 5xx and
//! network errors retry with full-jitter exponential backoff, any other
//! 4xx is terminal. Paginated fetches surface as lazy record streams;
//! every fetched page is archived before its records are yielded.

use crate::archive::Archiver;
use crate::config::{SpApiConfig, PROVIDER_SPAPI};
use crate::error::{Result, SpApiError};
use crate::types::{
    CreateReportResponse, FinancialEvent, InventorySummariesPage, InventorySummary,
    MarketplaceRecord, Order, OrdersPage, ReportDocumentRef, ReportStatusWire,
};
use crate::vault::TokenVault;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Method;
use serde_json::Value;
use shared_rate_limit::{throttle_key, TokenBucketThrottle};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Backoff base for transient failures
const BACKOFF_BASE_MS: u64 = 1_000;
/// Backoff ceiling
const BACKOFF_CAP_MS: u64 = 30_000;
/// Attempts for 5xx / network failures
const MAX_TRANSIENT_ATTEMPTS: usize = 5;
/// Attempts allowed to drain through upstream 429s
const MAX_RATE_LIMIT_RETRIES: usize = 5;

enum PageCursor {
    First,
    Next(String),
    Done,
}

pub struct SpApiClient {
    http: reqwest::Client,
    config: SpApiConfig,
    vault: Arc<TokenVault>,
    throttle: Arc<TokenBucketThrottle>,
    archiver: Arc<dyn Archiver>,
}

impl SpApiClient {
    pub fn new(
        config: SpApiConfig,
        vault: Arc<TokenVault>,
        throttle: Arc<TokenBucketThrottle>,
        archiver: Arc<dyn Archiver>,
    ) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SpApiError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            vault,
            throttle,
            archiver,
        })
    }

    /// FBA inventory summaries, paginated by `nextToken`.
    pub fn inventory_summaries(
        &self,
        tenant_id: Uuid,
        marketplace_ids: &[String],
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<InventorySummary>> {
        let marketplace_id = marketplace_ids.first().cloned().unwrap_or_default();
        let base_query = vec![
            ("granularityType".to_string(), "Marketplace".to_string()),
            ("granularityId".to_string(), marketplace_id.clone()),
            ("marketplaceIds".to_string(), marketplace_ids.join(",")),
            ("details".to_string(), "true".to_string()),
        ];
        let parse = move |payload: &Value| -> Result<(Vec<InventorySummary>, Option<String>)> {
            let page: InventorySummariesPage = serde_json::from_value(payload.clone())?;
            let next_token = page.pagination.and_then(|p| p.next_token);
            let records = page
                .payload
                .map(|p| p.inventory_summaries)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|wire| wire.normalise(&marketplace_id))
                .collect();
            Ok((records, next_token))
        };

        self.paged_records(
            tenant_id,
            "inventory_summaries",
            "/fba/inventory/v1/summaries",
            base_query,
            "nextToken",
            parse,
            cancel.clone(),
        )
    }

    /// Orders updated after `since`.
    pub fn orders(
        &self,
        tenant_id: Uuid,
        marketplace_ids: &[String],
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<Order>> {
        let base_query = vec![
            ("MarketplaceIds".to_string(), marketplace_ids.join(",")),
            ("LastUpdatedAfter".to_string(), since.to_rfc3339()),
        ];
        let parse = |payload: &Value| -> Result<(Vec<Order>, Option<String>)> {
            let page: OrdersPage = serde_json::from_value(payload.clone())?;
            let (orders, next_token) = match page.payload {
                Some(payload) => (payload.orders, payload.next_token),
                None => (Vec::new(), None),
            };
            Ok((orders.into_iter().map(Order::from).collect(), next_token))
        };

        self.paged_records(
            tenant_id,
            "orders",
            "/orders/v0/orders",
            base_query,
            "NextToken",
            parse,
            cancel.clone(),
        )
    }

    /// Financial events posted in `[since, until]`. Best-effort: a 4xx
    /// ends the stream without surfacing an error.
    pub fn financial_events(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<FinancialEvent>> {
        let base_query = vec![
            ("PostedAfter".to_string(), since.to_rfc3339()),
            ("PostedBefore".to_string(), until.to_rfc3339()),
        ];
        let parse = |payload: &Value| -> Result<(Vec<FinancialEvent>, Option<String>)> {
            let mut records = Vec::new();
            if let Some(Value::Object(groups)) = payload.pointer("/payload/FinancialEvents") {
                for (group, items) in groups {
                    if let Value::Array(items) = items {
                        records.extend(items.iter().map(|item| FinancialEvent {
                            group: group.clone(),
                            payload: item.clone(),
                        }));
                    }
                }
            }
            let next_token = payload
                .pointer("/payload/NextToken")
                .and_then(Value::as_str)
                .map(String::from);
            Ok((records, next_token))
        };

        let inner = self.paged_records(
            tenant_id,
            "financial_events",
            "/finances/v0/financialEvents",
            base_query,
            "NextToken",
            parse,
            cancel.clone(),
        );

        Box::pin(inner.scan((), |_, item| {
            futures::future::ready(match item {
                Err(SpApiError::Api { status, .. }) if status < 500 => {
                    tracing::warn!(
                        status = %status,
                        "Financial events unavailable, continuing without them"
                    );
                    None
                },
                other => Some(other),
            })
        }))
    }

    /// Returns processed in `[since, until]`.
    pub fn returns(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<MarketplaceRecord>> {
        self.dataset_records(tenant_id, "returns", "/fba/returns/v1/returns", since, until, cancel)
    }

    /// Inbound shipments updated in `[since, until]`.
    pub fn shipments(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<MarketplaceRecord>> {
        self.dataset_records(
            tenant_id,
            "shipments",
            "/fba/inbound/v0/shipments",
            since,
            until,
            cancel,
        )
    }

    /// Settlement summaries posted in `[since, until]`.
    pub fn settlements(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<MarketplaceRecord>> {
        self.dataset_records(
            tenant_id,
            "settlements",
            "/finances/v0/settlements",
            since,
            until,
            cancel,
        )
    }

    /// Removal shipments updated in `[since, until]`.
    pub fn removals(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<MarketplaceRecord>> {
        self.dataset_records(
            tenant_id,
            "removals",
            "/fba/removals/v0/removals",
            since,
            until,
            cancel,
        )
    }

    /// Request an async report; returns the upstream report id.
    pub async fn create_report(
        &self,
        tenant_id: Uuid,
        report_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let marketplace_ids: Vec<String> = self.config.marketplace_id.iter().cloned().collect();
        let body = serde_json::json!({
            "reportType": report_type,
            "dataStartTime": start.to_rfc3339(),
            "dataEndTime": end.to_rfc3339(),
            "marketplaceIds": marketplace_ids,
        });

        let payload = self
            .request_json(
                tenant_id,
                Method::POST,
                "/reports/2021-06-30/reports",
                &[],
                Some(&body),
                cancel,
            )
            .await?;
        self.archive(tenant_id, "reports", &payload).await?;

        let response: CreateReportResponse = serde_json::from_value(payload)?;
        Ok(response.report_id)
    }

    /// Poll a report until `COMPLETED`, with doubling delays capped at 30s.
    /// `FAILED`/`CANCELLED` and the `max_wait` budget fail deterministically.
    pub async fn wait_for_report(
        &self,
        tenant_id: Uuid,
        report_id: &str,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<ReportDocumentRef> {
        let deadline = tokio::time::Instant::now() + max_wait;
        let mut delay = Duration::from_secs(2);

        loop {
            let payload = self
                .request_json(
                    tenant_id,
                    Method::GET,
                    &format!("/reports/2021-06-30/reports/{}", report_id),
                    &[],
                    None,
                    cancel,
                )
                .await?;
            let status: ReportStatusWire = serde_json::from_value(payload)?;

            match status.processing_status.as_str() {
                "COMPLETED" => {
                    let document_id = status.report_document_id.ok_or_else(|| {
                        SpApiError::ReportFailed {
                            report_id: report_id.to_string(),
                            status: "COMPLETED without document".to_string(),
                        }
                    })?;
                    let document = self
                        .request_json(
                            tenant_id,
                            Method::GET,
                            &format!("/reports/2021-06-30/documents/{}", document_id),
                            &[],
                            None,
                            cancel,
                        )
                        .await?;
                    self.archive(tenant_id, "report_documents", &document).await?;
                    return Ok(serde_json::from_value(document)?);
                },
                "FAILED" | "CANCELLED" => {
                    return Err(SpApiError::ReportFailed {
                        report_id: report_id.to_string(),
                        status: status.processing_status,
                    });
                },
                _ => {
                    if tokio::time::Instant::now() + delay >= deadline {
                        return Err(SpApiError::Timeout(format!(
                            "report {} not ready within {:?}",
                            report_id, max_wait
                        )));
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SpApiError::Cancelled),
                        _ = tokio::time::sleep(delay) => {},
                    }
                    delay = (delay * 2).min(Duration::from_secs(30));
                },
            }
        }
    }

    fn dataset_records(
        &self,
        tenant_id: Uuid,
        dataset: &'static str,
        path: &'static str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, Result<MarketplaceRecord>> {
        let base_query = vec![
            ("createdAfter".to_string(), since.to_rfc3339()),
            ("createdBefore".to_string(), until.to_rfc3339()),
        ];
        let parse = move |payload: &Value| -> Result<(Vec<MarketplaceRecord>, Option<String>)> {
            let records = extract_records(payload)
                .into_iter()
                .map(|item| MarketplaceRecord {
                    dataset: dataset.to_string(),
                    payload: item,
                })
                .collect();
            let next_token = payload
                .pointer("/pagination/nextToken")
                .or_else(|| payload.pointer("/payload/NextToken"))
                .and_then(Value::as_str)
                .map(String::from);
            Ok((records, next_token))
        };

        self.paged_records(
            tenant_id,
            dataset,
            path,
            base_query,
            "nextToken",
            parse,
            cancel.clone(),
        )
    }

    fn paged_records<'a, T, F>(
        &'a self,
        tenant_id: Uuid,
        dataset: &'static str,
        path: &'static str,
        base_query: Vec<(String, String)>,
        next_token_param: &'static str,
        parse: F,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<T>>
    where
        T: Send + 'a,
        F: Fn(&Value) -> Result<(Vec<T>, Option<String>)> + Send + Sync + 'a,
    {
        let pages = stream::try_unfold((PageCursor::First, parse), move |(cursor, parse)| {
            let base_query = base_query.clone();
            let cancel = cancel.clone();
            async move {
                let token = match cursor {
                    PageCursor::First => None,
                    PageCursor::Next(token) => Some(token),
                    PageCursor::Done => return Ok::<_, SpApiError>(None),
                };

                let mut query = base_query;
                if let Some(token) = token {
                    query.push((next_token_param.to_string(), token));
                }

                let payload = self
                    .request_json(tenant_id, Method::GET, path, &query, None, &cancel)
                    .await?;
                self.archive(tenant_id, dataset, &payload).await?;

                let (records, next_token) = parse(&payload)?;
                let cursor = match next_token {
                    Some(token) => PageCursor::Next(token),
                    None => PageCursor::Done,
                };
                Ok(Some((
                    stream::iter(records.into_iter().map(Ok::<T, SpApiError>)),
                    (cursor, parse),
                )))
            }
        });

        Box::pin(pages.try_flatten())
    }

    async fn archive(&self, tenant_id: Uuid, dataset: &str, payload: &Value) -> Result<()> {
        self.archiver
            .archive(tenant_id, dataset, payload)
            .await
            .map(|_| ())
            .map_err(|e| SpApiError::Archive(e.to_string()))
    }

    async fn request_json(
        &self,
        tenant_id: Uuid,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let url = format!("{}{}", self.config.endpoint(), path);
        let key = throttle_key(PROVIDER_SPAPI, &tenant_id.to_string());
        let mut transient_attempts = 0usize;
        let mut rate_limit_retries = 0usize;
        let mut rotated = false;

        loop {
            if cancel.is_cancelled() {
                return Err(SpApiError::Cancelled);
            }

            self.throttle.acquire(&key, cancel).await?;
            let credential = self.vault.load(tenant_id, PROVIDER_SPAPI).await?;

            let mut request = self
                .http
                .request(method.clone(), &url)
                .query(query)
                .bearer_auth(&credential.access_token)
                .header("x-amz-access-token", &credential.access_token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(SpApiError::Cancelled),
                response = request.send() => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    transient_attempts += 1;
                    if transient_attempts >= MAX_TRANSIENT_ATTEMPTS {
                        return Err(SpApiError::Request(e));
                    }
                    tracing::warn!(
                        url = %url,
                        attempt = %transient_attempts,
                        error = %e,
                        "Network failure, backing off"
                    );
                    self.backoff(transient_attempts, cancel).await?;
                    continue;
                },
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response.json::<Value>().await?);
            }

            match status {
                401 if !rotated => {
                    rotated = true;
                    tracing::warn!(tenant_id = %tenant_id, "401 from marketplace, rotating credential");
                    self.vault.force_rotate(tenant_id, PROVIDER_SPAPI).await?;
                },
                429 => {
                    let retry_after = retry_after_duration(&response);
                    self.throttle.penalize(&key, retry_after).await;
                    rate_limit_retries += 1;
                    if rate_limit_retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(SpApiError::RateLimited { retry_after });
                    }
                },
                s if s >= 500 => {
                    transient_attempts += 1;
                    if transient_attempts >= MAX_TRANSIENT_ATTEMPTS {
                        let body = response.text().await.unwrap_or_default();
                        return Err(SpApiError::Api {
                            status: s,
                            code: error_code(&body),
                            body,
                        });
                    }
                    tracing::warn!(
                        url = %url,
                        status = %s,
                        attempt = %transient_attempts,
                        "Server error, backing off"
                    );
                    self.backoff(transient_attempts, cancel).await?;
                },
                s => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SpApiError::Api {
                        status: s,
                        code: error_code(&body),
                        body,
                    });
                },
            }
        }
    }

    /// Full-jitter exponential backoff: base 1s doubling, capped at 30s.
    async fn backoff(&self, attempt: usize, cancel: &CancellationToken) -> Result<()> {
        let exp = BACKOFF_BASE_MS
            .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(5))
            .min(BACKOFF_CAP_MS);
        let delay = jitter(Duration::from_millis(exp));
        tokio::select! {
            _ = cancel.cancelled() => Err(SpApiError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

fn retry_after_duration(response: &reqwest::Response) -> Duration {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1))
}

/// Best-effort error code from an SP-API error body
/// (`{"errors": [{"code": ..., "message": ...}]}`).
fn error_code(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .pointer("/errors/0/code")?
        .as_str()
        .map(String::from)
}

/// Pull the record array out of a loosely-shaped list payload: either
/// `payload` is the array itself or its first array-valued field.
fn extract_records(payload: &Value) -> Vec<Value> {
    match payload.get("payload") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(fields)) => fields
            .values()
            .find_map(|value| value.as_array())
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
