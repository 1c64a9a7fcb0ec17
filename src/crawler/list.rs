//! Notice listing client
//!
//! The listing API is a single JSON POST that returns the most recent page of
//! notices. Every failure here is fatal for the run: without a trustworthy
//! list there is nothing to compare the watermark against.

use chrono::{DateTime, Utc};
use reqwest::{header::HeaderMap, Client};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, SourceConfig};
use crate::crawler::dedup::DedupPolicy;
use crate::crawler::fetcher::build_client;
use crate::crawler::headers::build_api_headers;
use crate::models::{NoticeCandidate, NoticeId};
use crate::utils::error::FetchError;

/// Listing request envelope
#[derive(Debug, Clone, Serialize)]
pub struct ListRequest {
    pub head: RequestHead,
    pub body: RequestBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHead {
    pub action: String,
    pub result_code: String,
    pub error_msg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestBody {
    pub data: RequestData,
    pub datastatic: DeviceStatic,
}

/// Paging parameters; the first page is always requested
#[derive(Debug, Clone, Serialize)]
pub struct RequestData {
    pub cellid: String,
    pub pagenum: String,
    pub minid: String,
    #[serde(rename = "versionFlag")]
    pub version_flag: String,
}

/// Device identity block
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatic {
    pub app_version: String,
    pub cell_id: String,
    pub from_type: String,
    pub imei: String,
    pub ip: String,
    pub sys_version: String,
    pub tel: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub user_id: String,
    pub version_info: String,
}

impl ListRequest {
    /// Build the request payload from source configuration
    pub fn from_source(source: &SourceConfig) -> Self {
        let device = &source.device;

        Self {
            head: RequestHead {
                action: source.action.clone(),
                result_code: "0".to_string(),
                error_msg: "OK!".to_string(),
            },
            body: RequestBody {
                data: RequestData {
                    cellid: source.cell_id.clone(),
                    pagenum: "1".to_string(),
                    minid: String::new(),
                    version_flag: "1".to_string(),
                },
                datastatic: DeviceStatic {
                    app_version: device.app_version.clone(),
                    cell_id: source.cell_id.clone(),
                    from_type: device.from_type.clone(),
                    imei: device.imei.clone(),
                    ip: device.ip.clone(),
                    sys_version: device.sys_version.clone(),
                    tel: device.tel.clone(),
                    device_type: device.device_type.clone(),
                    user_id: device.user_id.clone(),
                    version_info: device.version_info.clone(),
                },
            },
        }
    }
}

/// Listing API client
pub struct ListFetcher {
    client: Client,
    list_url: String,
    headers: HeaderMap,
    request: ListRequest,
}

impl ListFetcher {
    /// Create a list fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(config.request_timeout())?,
            list_url: config.source.list_url.clone(),
            headers: build_api_headers(&config.crawler.user_agent)?,
            request: ListRequest::from_source(&config.source),
        })
    }

    /// Request payload sent on every call
    pub fn request(&self) -> &ListRequest {
        &self.request
    }

    /// Fetch every listing entry, in API order
    ///
    /// # Errors
    ///
    /// Transport errors, non-2xx statuses, malformed JSON, a missing
    /// `body.list`, and ids that are not integers are all reported
    pub async fn fetch_entries(&self) -> Result<Vec<NoticeCandidate>, FetchError> {
        tracing::debug!(url = %self.list_url, "Requesting notice listing");

        let response = self
            .client
            .post(&self.list_url)
            .headers(self.headers.clone())
            .json(&self.request)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        parse_listing(&bytes)
    }

    /// Fetch the listing and keep only what the policy admits
    pub async fn fetch_candidates(
        &self,
        policy: &DedupPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<NoticeCandidate>, FetchError> {
        let entries = self.fetch_entries().await?;
        let total = entries.len();
        let candidates = policy.select(entries, now);

        tracing::info!(
            listed = total,
            new = candidates.len(),
            "Fetched notice listing"
        );

        Ok(candidates)
    }
}

/// Parse a listing response body
///
/// An explicit `"list": null` is read as an empty page. Entries that are
/// not JSON objects are skipped.
pub fn parse_listing(bytes: &[u8]) -> Result<Vec<NoticeCandidate>, FetchError> {
    let root: Value =
        serde_json::from_slice(bytes).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    let body = root.get("body").ok_or(FetchError::MissingField("body"))?;
    let list = match body.get("list") {
        None => return Err(FetchError::MissingField("body.list")),
        Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(FetchError::MalformedResponse(format!(
                "body.list is not an array: {other}"
            )))
        }
    };

    let mut candidates = Vec::with_capacity(list.len());
    for item in list {
        let Some(entry) = item.as_object() else {
            tracing::warn!(entry = %item, "Skipping non-object listing entry");
            continue;
        };

        let id = parse_id(entry.get("id").unwrap_or(&Value::Null))?;
        let add_time = entry
            .get("addtime")
            .and_then(Value::as_str)
            .map(str::to_string);

        candidates.push(NoticeCandidate::new(id, add_time));
    }

    Ok(candidates)
}

/// Accept an integer or an integer string
fn parse_id(value: &Value) -> Result<NoticeId, FetchError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| FetchError::InvalidId(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<NoticeId>()
            .map_err(|_| FetchError::InvalidId(s.clone())),
        other => Err(FetchError::InvalidId(other.to_string())),
    }
}
