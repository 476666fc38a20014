//! Accrual calculator HTTP client

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::OrderStatus;

#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("Invalid accrual base URL: {0}")]
    InvalidBase(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Status as reported by the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    /// Ledger status once the calculator is done with the order
    pub fn terminal(&self) -> Option<OrderStatus> {
        match self {
            AccrualStatus::Invalid => Some(OrderStatus::Invalid),
            AccrualStatus::Processed => Some(OrderStatus::Processed),
            AccrualStatus::Registered | AccrualStatus::Processing => None,
        }
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Ready {
        status: AccrualStatus,
        accrual: Decimal,
    },
    /// 429, wait this long before asking again
    RateLimited(Duration),
    /// Network failure, unexpected status or undecodable body
    Transient,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    status: AccrualStatus,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    accrual: Option<Decimal>,
}

/// Anything the worker can poll for an order's accrual
#[async_trait]
pub trait AccrualSource: Send + Sync {
    async fn query(&self, number: &str) -> PollResult;
}

pub struct AccrualClient {
    http: reqwest::Client,
    base: String,
    /// Used when a 429 carries no usable `Retry-After`
    fallback_retry: Duration,
}

impl AccrualClient {
    pub fn new(
        base: &str,
        timeout: Duration,
        fallback_retry: Duration,
    ) -> Result<Self, AccrualError> {
        let base = base.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AccrualError::InvalidBase(base.to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.to_string(),
            fallback_retry,
        })
    }

    pub fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base, number)
    }

    fn retry_after(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.fallback_retry)
    }
}

#[async_trait]
impl AccrualSource for AccrualClient {
    async fn query(&self, number: &str) -> PollResult {
        let url = self.order_url(number);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(order = %number, error = %e, "Accrual request failed");
                return PollResult::Transient;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<OrderResponse>().await {
                Ok(body) => {
                    debug!(order = %number, status = ?body.status, accrual = ?body.accrual, "Accrual response");
                    PollResult::Ready {
                        status: body.status,
                        accrual: body.accrual.unwrap_or(Decimal::ZERO),
                    }
                }
                Err(e) => {
                    warn!(order = %number, error = %e, "Undecodable accrual response");
                    PollResult::Transient
                }
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let delay = self.retry_after(response.headers());
                warn!(order = %number, retry_after_secs = delay.as_secs(), "Accrual rate limited");
                PollResult::RateLimited(delay)
            }
            other => {
                debug!(order = %number, status = %other, "Accrual not ready");
                PollResult::Transient
            }
        }
    }
}
