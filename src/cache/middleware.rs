//! HTTP 回應快取中間件
//!
//! 只快取 GET 請求的 2xx 回應。未命中時回應主體一邊串流給客戶端一邊複製到緩衝區，
//! 最後一塊送出後、串流結束前寫入快取，因此客戶端讀完主體時條目已可見；
//! 中途中斷的回應不會被快取。

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{any, MethodRouter},
};
use bytes::BytesMut;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::cache::metrics::CacheMetrics;
use crate::cache::multi_level::MultiLevelCache;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_DATE: HeaderName = HeaderName::from_static("x-cache-date");

/// 失效端點讀取請求主體的上限
const MAX_PATTERN_BODY_BYTES: usize = 64 * 1024;

/// 從請求生成快取鍵
pub type KeyBuilder = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// 快取中的 HTTP 回應
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedHttpResponse {
    pub status_code: u16,
    pub headers: Vec<CachedHeader>,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// 原樣保存的標頭，值以位元組保存，非 ASCII 的值也能重放
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedHeader {
    pub name: String,
    #[serde(with = "base64_body")]
    pub value: Vec<u8>,
}

impl CachedHttpResponse {
    fn capture(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: headers
                .iter()
                .filter(|(name, _)| **name != X_CACHE && **name != X_CACHE_DATE)
                .map(|(name, value)| CachedHeader {
                    name: name.to_string(),
                    value: value.as_bytes().to_vec(),
                })
                .collect(),
            body: body.to_vec(),
            captured_at: Utc::now(),
        }
    }

    /// 重建回應並附加快取標頭
    pub fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status_code);

        for cached_header in &self.headers {
            match HeaderValue::from_bytes(&cached_header.value) {
                Ok(value) => builder = builder.header(cached_header.name.as_str(), value),
                Err(e) => warn!("略過無法重建的快取標頭 [{}]: {}", cached_header.name, e),
            }
        }

        let cached_date = self
            .captured_at
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        builder
            .header(X_CACHE, "HIT")
            .header(X_CACHE_DATE, cached_date)
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

mod base64_body {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// `http:{METHOD}:{URI}`
pub fn default_key_builder(request: &Request) -> String {
    format!("http:{}:{}", request.method(), request.uri())
}

/// 鍵中包含用戶識別，避免不同用戶共用回應
pub fn user_aware_key_builder<F>(get_user_id: F) -> KeyBuilder
where
    F: Fn(&Request) -> String + Send + Sync + 'static,
{
    Arc::new(move |request: &Request| {
        format!(
            "http:{}:{}:user:{}",
            request.method(),
            request.uri(),
            get_user_id(request)
        )
    })
}

/// 以 SHA-256 摘要的前 16 個十六進位字元作為鍵，適合很長的 URI
pub fn hash_key_builder(request: &Request) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.method().as_str().as_bytes());
    hasher.update(request.uri().to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("http:{}", &digest[..16])
}

/// 中間件共享狀態
#[derive(Clone)]
pub struct HttpCache {
    cache: Arc<MultiLevelCache>,
    ttl: Duration,
    key_builder: KeyBuilder,
}

impl HttpCache {
    /// 未提供鍵生成器時使用 `default_key_builder`
    pub fn new(cache: Arc<MultiLevelCache>, ttl: Duration, key_builder: Option<KeyBuilder>) -> Self {
        Self {
            cache,
            ttl,
            key_builder: key_builder
                .unwrap_or_else(|| Arc::new(default_key_builder) as KeyBuilder),
        }
    }

    pub fn cache(&self) -> &Arc<MultiLevelCache> {
        &self.cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key_for(&self, request: &Request) -> String {
        (self.key_builder)(request)
    }
}

/// 回應快取中間件，以 `axum::middleware::from_fn_with_state` 掛載
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(http_cache): State<HttpCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        CacheMetrics::record_http("bypass");
        return next.run(request).await;
    }

    let key = http_cache.key_for(&request);

    match http_cache.cache.get::<CachedHttpResponse>(&key).await {
        Ok(cached) => {
            debug!(cache = "http", outcome = "hit", key = %key, "返回快取回應");
            CacheMetrics::record_http("hit");
            return cached.into_response();
        }
        Err(e) if e.is_miss() => {}
        Err(e) => warn!("讀取快取回應失敗，按未命中處理 [{}]: {}", key, e),
    }

    debug!(cache = "http", outcome = "miss", key = %key, "執行處理器");
    CacheMetrics::record_http("miss");

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    if !parts.status.is_success() {
        parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
        return Response::from_parts(parts, body);
    }

    let pending = PendingCapture {
        cache: http_cache.cache.clone(),
        key,
        ttl: http_cache.ttl,
        status: parts.status,
        headers: parts.headers.clone(),
    };
    parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));

    Response::from_parts(parts, tee_body(body, pending))
}

/// 等待主體讀完後寫入的回應
struct PendingCapture {
    cache: Arc<MultiLevelCache>,
    key: String,
    ttl: Duration,
    status: StatusCode,
    headers: HeaderMap,
}

impl PendingCapture {
    async fn store(self, body: Bytes) {
        let cached = CachedHttpResponse::capture(self.status, &self.headers, body);
        match self.cache.set_with_ttl(&self.key, &cached, self.ttl).await {
            Ok(()) => CacheMetrics::record_http("stored"),
            Err(e) => warn!("寫入快取回應失敗 [{}]: {}", self.key, e),
        }
    }
}

/// 轉發主體的同時累積內容
///
/// 最後一塊送出後先完成快取寫入再結束串流；分散式寫入受 `operation_timeout` 限制。
/// 串流出錯或被丟棄時不寫入。
fn tee_body(body: Body, pending: PendingCapture) -> Body {
    let stream = async_stream::stream! {
        let mut data = body.into_data_stream();
        let mut buffer = BytesMut::new();

        while let Some(chunk) = data.next().await {
            match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    yield Ok::<Bytes, axum::Error>(bytes);
                }
                Err(e) => {
                    debug!("回應串流未完成，不寫入快取: {}", pending.key);
                    yield Err(e);
                    return;
                }
            }
        }

        pending.store(buffer.freeze()).await;
    };

    Body::from_stream(stream)
}

/// 快取失效端點
///
/// 只接受 `POST` / `DELETE`。給定固定模式時忽略請求主體，否則以 UTF-8 主體作為模式。
pub fn invalidate_handler<S>(
    cache: Arc<MultiLevelCache>,
    fixed_pattern: Option<String>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    any(move |request: Request| {
        let cache = cache.clone();
        let fixed_pattern = fixed_pattern.clone();
        async move { invalidate(&cache, fixed_pattern, request).await }
    })
}

async fn invalidate(
    cache: &MultiLevelCache,
    fixed_pattern: Option<String>,
    request: Request,
) -> Response {
    let method = request.method();
    if method != Method::POST && method != Method::DELETE {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST, DELETE")],
            "Method not allowed",
        )
            .into_response();
    }

    let pattern = match fixed_pattern {
        Some(pattern) => pattern,
        None => {
            let body = match axum::body::to_bytes(request.into_body(), MAX_PATTERN_BODY_BYTES).await
            {
                Ok(body) => body,
                Err(e) => {
                    warn!("讀取失效請求主體失敗: {}", e);
                    return (StatusCode::BAD_REQUEST, "Failed to read body").into_response();
                }
            };
            match String::from_utf8(body.to_vec()) {
                Ok(pattern) if !pattern.trim().is_empty() => pattern.trim().to_string(),
                Ok(_) => return (StatusCode::BAD_REQUEST, "Missing pattern").into_response(),
                Err(_) => {
                    return (StatusCode::BAD_REQUEST, "Pattern must be UTF-8").into_response()
                }
            }
        }
    };

    match cache.invalidate_pattern(&pattern).await {
        Ok(deleted) => {
            debug!("HTTP 失效請求完成 [{}]，刪除 {} 個鍵", pattern, deleted);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to invalidate: {}", e),
        )
            .into_response(),
    }
}
