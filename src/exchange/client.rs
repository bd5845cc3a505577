//! Authenticated exchange client.
//!
//! One client instance serves the whole process. It enforces a 200 ms gap
//! between any two requests (≈5 req/s, inside the Basic tier), signs each
//! request over the URL path, and wraps every call in the retry policy:
//! 429 → exponential backoff, 5xx → one retry after 2 s, 409 on POST →
//! idempotent success, network errors → backoff, anything else → fail now.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::types::{Market, Orderbook};

use super::auth::{Credentials, HEADER_KEY, HEADER_SIGNATURE, HEADER_TIMESTAMP};
use super::error::ExchangeError;
use super::models::{
    self, AmendRequest, AmendResponse, Balance, CancelResponse, DecreaseRequest, FillsResponse,
    OrderRequest, OrderResponse, OrdersListResponse, PositionsResponse, WireOrder,
};

const RATE_LIMIT_GAP: Duration = Duration::from_millis(200);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
/// Batch endpoints accept at most this many orders per call.
pub const BATCH_LIMIT: usize = 20;

/// Connectivity health snapshot, surfaced on /system/health.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct HealthInfo {
    pub last_successful_request: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub total_requests: u64,
    pub healthy: bool,
}

#[derive(Default)]
struct HealthState {
    last_successful_request: Option<DateTime<Utc>>,
    consecutive_errors: u32,
    total_requests: u64,
}

pub struct KalshiClient {
    http: reqwest::Client,
    base_url: String,
    creds: Credentials,
    /// Completion time of the most recent request — the rate gate.
    last_request: tokio::sync::Mutex<Option<Instant>>,
    health: Mutex<HealthState>,
}

impl KalshiClient {
    pub fn new(creds: Credentials, base_url: impl Into<String>) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            creds,
            last_request: tokio::sync::Mutex::new(None),
            health: Mutex::new(HealthState::default()),
        })
    }

    // ─── Transport ───

    /// Enforce ≥200 ms between any two outbound requests.
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < RATE_LIMIT_GAP {
                tokio::time::sleep(RATE_LIMIT_GAP - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// One signed request. The signature covers the URL path only — query
    /// strings are excluded by the exchange's auth scheme.
    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&B>,
    ) -> Result<Value, ExchangeError> {
        self.rate_limit().await;

        let url = Url::parse(&format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .map_err(|e| ExchangeError::Validation(format!("bad url: {}", e)))?;
        let signed_path = url.path().to_string();
        let (key, timestamp, signature) =
            self.creds.auth_headers(method.as_str(), &signed_path)?;

        self.health.lock().total_requests += 1;
        debug!(%method, path, "exchange request");

        let mut req = self
            .http
            .request(method, url)
            .header(HEADER_KEY, key)
            .header(HEADER_TIMESTAMP, timestamp)
            .header(HEADER_SIGNATURE, signature);
        if let Some(q) = query {
            req = req.query(q);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                self.note_failure();
                return Err(ExchangeError::Network(e));
            }
        };

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            self.note_failure();
            return Err(ExchangeError::Http { status: status.as_u16(), body: text });
        }

        {
            let mut h = self.health.lock();
            h.last_successful_request = Some(Utc::now());
            h.consecutive_errors = 0;
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn note_failure(&self) {
        self.health.lock().consecutive_errors += 1;
    }

    /// Retry-wrapped request. See the module docs for the full policy.
    async fn request_with_retry<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&B>,
    ) -> Result<Value, ExchangeError> {
        for attempt in 0..=MAX_RETRIES {
            match self.request(method.clone(), path, query, body).await {
                Ok(v) => return Ok(v),
                Err(ExchangeError::Http { status, body: text }) => {
                    if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
                        if attempt < MAX_RETRIES {
                            let delay = 1u64 << attempt;
                            warn!(path, attempt, delay_s = delay, "429 rate limited, backing off");
                            tokio::time::sleep(Duration::from_secs(delay)).await;
                            continue;
                        }
                        return Err(ExchangeError::RateLimited { attempts: MAX_RETRIES });
                    }
                    if (500..600).contains(&status) && attempt == 0 {
                        warn!(path, status, "server error, retrying once in 2s");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                    if status == StatusCode::CONFLICT.as_u16() && method == Method::POST {
                        // Duplicate client_order_id: the order already exists,
                        // the response body is the original accepted order.
                        info!(path, "409 duplicate client_order_id, idempotent success");
                        return Ok(serde_json::from_str(&text).unwrap_or(Value::Null));
                    }
                    return Err(ExchangeError::Http { status, body: text });
                }
                Err(ExchangeError::Network(e)) => {
                    if attempt < MAX_RETRIES {
                        let delay = 1u64 << attempt;
                        warn!(path, attempt, delay_s = delay, error = %e, "network error, retrying");
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                        continue;
                    }
                    return Err(ExchangeError::Network(e));
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("retry loop always returns")
    }

    // ─── Market data ───

    /// GET /markets for one series.
    pub async fn get_markets(
        &self,
        series_ticker: &str,
        status: &str,
        limit: u32,
    ) -> Result<Vec<Market>, ExchangeError> {
        let query = [
            ("series_ticker", series_ticker.to_string()),
            ("status", status.to_string()),
            ("limit", limit.to_string()),
        ];
        let data = self
            .request_with_retry::<()>(Method::GET, "/markets", Some(&query), None)
            .await?;
        let markets: Vec<Market> = data
            .get("markets")
            .and_then(|m| m.as_array())
            .map(|arr| arr.iter().filter_map(models::parse_market).collect())
            .unwrap_or_default();
        debug!(series_ticker, count = markets.len(), "fetched markets");
        Ok(markets)
    }

    /// GET /markets/{ticker}.
    pub async fn get_market(&self, ticker: &str) -> Result<Market, ExchangeError> {
        let data = self
            .request_with_retry::<()>(Method::GET, &format!("/markets/{}", ticker), None, None)
            .await?;
        let raw = data.get("market").unwrap_or(&data);
        models::parse_market(raw)
            .ok_or_else(|| ExchangeError::Validation(format!("unparseable market {}", ticker)))
    }

    /// GET /markets/{ticker}/orderbook.
    pub async fn get_orderbook(&self, ticker: &str) -> Result<Orderbook, ExchangeError> {
        let data = self
            .request_with_retry::<()>(
                Method::GET,
                &format!("/markets/{}/orderbook", ticker),
                None,
                None,
            )
            .await?;
        Ok(models::parse_orderbook(ticker, &data))
    }

    // ─── Portfolio reads ───

    /// GET /portfolio/balance — cents.
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let data = self
            .request_with_retry::<()>(Method::GET, "/portfolio/balance", None, None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// GET /portfolio/positions — exchange-side positions, raw.
    pub async fn get_positions(&self) -> Result<PositionsResponse, ExchangeError> {
        let data = self
            .request_with_retry::<()>(Method::GET, "/portfolio/positions", None, None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// GET /portfolio/fills — cursor-paginated fill history.
    pub async fn get_fills(
        &self,
        ticker: Option<&str>,
        order_id: Option<&str>,
        min_ts: Option<i64>,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<FillsResponse, ExchangeError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(t) = ticker {
            query.push(("ticker", t.to_string()));
        }
        if let Some(o) = order_id {
            query.push(("order_id", o.to_string()));
        }
        if let Some(ts) = min_ts {
            query.push(("min_ts", ts.to_string()));
        }
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        let data = self
            .request_with_retry::<()>(Method::GET, "/portfolio/fills", Some(&query), None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// All fill pages since `min_ts`, bounded at `max_pages`.
    pub async fn all_fills(
        &self,
        min_ts: Option<i64>,
        limit: u32,
        max_pages: u32,
    ) -> Result<Vec<models::WireFill>, ExchangeError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..max_pages {
            let page = self
                .get_fills(None, None, min_ts, limit, cursor.as_deref())
                .await?;
            let n = page.fills.len();
            out.extend(page.fills);
            cursor = page.cursor;
            if cursor.is_none() || n < limit as usize {
                break;
            }
        }
        Ok(out)
    }

    /// GET /portfolio/settlements — raw passthrough.
    pub async fn get_settlements(
        &self,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Value, ExchangeError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        self.request_with_retry::<()>(Method::GET, "/portfolio/settlements", Some(&query), None)
            .await
    }

    /// GET /portfolio/orders. status ∈ {resting, canceled, executed}.
    pub async fn list_orders(
        &self,
        ticker: Option<&str>,
        status: Option<&str>,
    ) -> Result<OrdersListResponse, ExchangeError> {
        let mut query = vec![("limit", "100".to_string())];
        if let Some(t) = ticker {
            query.push(("ticker", t.to_string()));
        }
        if let Some(s) = status {
            query.push(("status", s.to_string()));
        }
        let data = self
            .request_with_retry::<()>(Method::GET, "/portfolio/orders", Some(&query), None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// GET /portfolio/orders/{order_id}.
    pub async fn get_order_status(&self, order_id: &str) -> Result<WireOrder, ExchangeError> {
        let data = self
            .request_with_retry::<()>(
                Method::GET,
                &format!("/portfolio/orders/{}", order_id),
                None,
                None,
            )
            .await?;
        let resp: OrderResponse = serde_json::from_value(data)?;
        Ok(resp.order)
    }

    /// GET /portfolio/orders/{order_id}/queue_position.
    pub async fn get_queue_position(&self, order_id: &str) -> Result<Value, ExchangeError> {
        self.request_with_retry::<()>(
            Method::GET,
            &format!("/portfolio/orders/{}/queue_position", order_id),
            None,
            None,
        )
        .await
    }

    /// GET /portfolio/orders/queue_positions — all resting orders at once.
    pub async fn get_all_queue_positions(&self) -> Result<Value, ExchangeError> {
        self.request_with_retry::<()>(
            Method::GET,
            "/portfolio/orders/queue_positions",
            None,
            None,
        )
        .await
    }

    // ─── Order mutations ───

    /// POST /portfolio/orders. The caller supplies a fresh UUIDv4
    /// client_order_id inside the request and keeps it for dedup.
    pub async fn place_order(&self, req: &OrderRequest) -> Result<WireOrder, ExchangeError> {
        info!(
            ticker = %req.ticker,
            side = %req.side,
            count = req.count,
            yes_price = ?req.yes_price,
            no_price = ?req.no_price,
            client_order_id = %req.client_order_id,
            "placing order"
        );
        let data = self
            .request_with_retry(Method::POST, "/portfolio/orders", None, Some(req))
            .await?;
        let resp: OrderResponse = serde_json::from_value(data)?;
        info!(order_id = %resp.order.order_id, status = %resp.order.status, "order accepted");
        Ok(resp.order)
    }

    /// DELETE /portfolio/orders/{order_id} — only valid on resting orders.
    pub async fn cancel_order(&self, order_id: &str) -> Result<CancelResponse, ExchangeError> {
        info!(order_id, "cancelling order");
        let data = self
            .request_with_retry::<()>(
                Method::DELETE,
                &format!("/portfolio/orders/{}", order_id),
                None,
                None,
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// POST /portfolio/orders/{order_id}/amend — the exchange cancels the old
    /// order and returns a NEW order_id.
    pub async fn amend_order(
        &self,
        order_id: &str,
        req: &AmendRequest,
    ) -> Result<AmendResponse, ExchangeError> {
        info!(order_id, "amending order");
        let data = self
            .request_with_retry(
                Method::POST,
                &format!("/portfolio/orders/{}/amend", order_id),
                None,
                Some(req),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// POST /portfolio/orders/{order_id}/decrease — exactly one of
    /// reduce_by / reduce_to; reduce_to=0 behaves like a cancel.
    pub async fn decrease_order(
        &self,
        order_id: &str,
        reduce_by: Option<u32>,
        reduce_to: Option<u32>,
    ) -> Result<WireOrder, ExchangeError> {
        if reduce_by.is_some() == reduce_to.is_some() {
            return Err(ExchangeError::Validation(
                "provide exactly one of reduce_by / reduce_to".into(),
            ));
        }
        let body = DecreaseRequest { reduce_by, reduce_to };
        let data = self
            .request_with_retry(
                Method::POST,
                &format!("/portfolio/orders/{}/decrease", order_id),
                None,
                Some(&body),
            )
            .await?;
        let resp: OrderResponse = serde_json::from_value(data)?;
        Ok(resp.order)
    }

    /// POST /portfolio/orders/batched — up to 20 orders.
    pub async fn batch_place(&self, orders: &[OrderRequest]) -> Result<Value, ExchangeError> {
        if orders.len() > BATCH_LIMIT {
            return Err(ExchangeError::Validation(format!(
                "batch place limited to {} orders",
                BATCH_LIMIT
            )));
        }
        let body = serde_json::json!({ "orders": orders });
        self.request_with_retry(Method::POST, "/portfolio/orders/batched", None, Some(&body))
            .await
    }

    /// DELETE /portfolio/orders/batched — up to 20 order ids.
    pub async fn batch_cancel(&self, order_ids: &[String]) -> Result<Value, ExchangeError> {
        if order_ids.len() > BATCH_LIMIT {
            return Err(ExchangeError::Validation(format!(
                "batch cancel limited to {} orders",
                BATCH_LIMIT
            )));
        }
        let body = serde_json::json!({ "ids": order_ids });
        self.request_with_retry(Method::DELETE, "/portfolio/orders/batched", None, Some(&body))
            .await
    }

    // ─── Health ───

    pub fn health_info(&self) -> HealthInfo {
        let h = self.health.lock();
        HealthInfo {
            last_successful_request: h.last_successful_request,
            consecutive_errors: h.consecutive_errors,
            total_requests: h.total_requests,
            healthy: h.consecutive_errors < 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeSide;

    #[test]
    fn test_batch_limits_enforced_locally() {
        let creds = test_creds();
        let client = KalshiClient::new(creds, "https://example.invalid/trade-api/v2").unwrap();
        let ids: Vec<String> = (0..21).map(|i| format!("oid-{}", i)).collect();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt.block_on(client.batch_cancel(&ids)).unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
    }

    #[test]
    fn test_decrease_requires_exactly_one() {
        let creds = test_creds();
        let client = KalshiClient::new(creds, "https://example.invalid/trade-api/v2").unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let both = rt.block_on(client.decrease_order("oid", Some(1), Some(2)));
        assert!(matches!(both, Err(ExchangeError::Validation(_))));
        let neither = rt.block_on(client.decrease_order("oid", None, None));
        assert!(matches!(neither, Err(ExchangeError::Validation(_))));
    }

    #[test]
    fn test_order_request_roundtrip_side_fields() {
        let req = OrderRequest::limit_buy("T", TradeSide::No, 3, 0.42, "cid").unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["no_price"], 42);
        assert!(v.get("yes_price").is_none());
    }

    fn test_creds() -> Credentials {
        // 1024-bit throwaway key: test-only, far too small for production use.
        // (512 bits is too small to hold SHA-256 PSS padding with a 32-byte salt.)
        let mut rng = rand::thread_rng();
        let key = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let pem = rsa::pkcs8::EncodePrivateKey::to_pkcs8_pem(&key, rsa::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string();
        Credentials::from_pem("test-key", &pem).unwrap()
    }

    #[test]
    fn test_signature_is_base64_and_fresh() {
        let creds = test_creds();
        let sig_a = creds.sign("GET", "/trade-api/v2/markets", 1_700_000_000_000).unwrap();
        let sig_b = creds.sign("GET", "/trade-api/v2/markets", 1_700_000_000_000).unwrap();
        use base64::Engine as _;
        assert!(base64::engine::general_purpose::STANDARD.decode(&sig_a).is_ok());
        // PSS is randomized: same message, different salt, different signature
        assert_ne!(sig_a, sig_b);
    }
}
