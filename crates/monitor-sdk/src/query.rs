//! Pull-side client for the paginated REST endpoints.
//!
//! Every operation is an independent request; overlapping calls are not
//! coalesced. Non-2xx responses come back as [`QueryError::UnexpectedStatus`].

use std::time::Duration;

use monitor_proto::{
    GoroutineHistoryQuery, GoroutineList, GoroutineQuery, GoroutineScope, GoroutineTrace,
    HeapProfile, MonitorQuery, RequestHistoryQuery, RequestList, RequestQuery, RequestSearch,
    RequestSearchPage, RequestTrace, SystemInfo,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientSetupError, QueryError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct QueryClient {
    http: Client,
    base_url: String,
}

impl QueryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, QueryError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QueryError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// Builds a client rooted at the API base derived from the dashboard URL.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientSetupError> {
        let base = config.paths()?.api_url("");
        Ok(Self::with_timeout(base, config.request_timeout)?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn goroutines(&self, query: &GoroutineQuery) -> Result<GoroutineList, QueryError> {
        self.get("/goroutines", Some(query)).await
    }

    pub async fn goroutine(&self, id: &str) -> Result<GoroutineTrace, QueryError> {
        let path = format!("/goroutine/{}", encode_segment(id));
        self.get(&path, None::<&()>).await
    }

    pub async fn goroutine_history(
        &self,
        query: &GoroutineHistoryQuery,
    ) -> Result<GoroutineList, QueryError> {
        self.get("/goroutines/history", Some(query)).await
    }

    pub async fn active_goroutines(&self, limit: Option<u32>) -> Result<GoroutineList, QueryError> {
        let query = GoroutineQuery {
            limit,
            scope: Some(GoroutineScope::Active),
            ..Default::default()
        };
        self.goroutines(&query).await
    }

    pub async fn heap_profile(&self) -> Result<HeapProfile, QueryError> {
        self.get("/heap", None::<&()>).await
    }

    pub async fn requests(&self, query: &RequestQuery) -> Result<RequestList, QueryError> {
        self.get("/requests", Some(query)).await
    }

    pub async fn request(&self, id: &str) -> Result<RequestTrace, QueryError> {
        let path = format!("/request/{}", encode_segment(id));
        self.get(&path, None::<&()>).await
    }

    pub async fn request_history(
        &self,
        query: &RequestHistoryQuery,
    ) -> Result<RequestList, QueryError> {
        self.get("/requests/history", Some(query)).await
    }

    pub async fn active_requests(&self) -> Result<RequestList, QueryError> {
        self.get("/requests/active", None::<&()>).await
    }

    pub async fn search_requests(
        &self,
        search: &RequestSearch,
    ) -> Result<RequestSearchPage, QueryError> {
        let url = self.endpoint("/requests/search")?;
        self.execute(self.http.post(url).json(search)).await
    }

    pub async fn system_info(&self) -> Result<SystemInfo, QueryError> {
        self.get("/system", None::<&()>).await
    }

    /// Aggregate counters; the shape is backend-defined.
    pub async fn monitor_stats(&self) -> Result<Value, QueryError> {
        self.get("/stats", None::<&()>).await
    }

    pub async fn connections(&self) -> Result<Value, QueryError> {
        self.get("/connections", None::<&()>).await
    }

    pub async fn unified_monitor(&self, query: &MonitorQuery) -> Result<Value, QueryError> {
        self.get("/monitor", Some(query)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    async fn get<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut builder = self.http.get(url);
        if let Some(query) = query {
            builder = builder.query(query);
        }
        self.execute(builder).await
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, QueryError> {
        let res = builder.send().await?;
        let status = res.status();
        debug!(
            target: "monitor.query",
            url = %res.url(),
            status = status.as_u16(),
            "query response"
        );

        if status.is_success() {
            return Ok(res.json::<T>().await?);
        }

        let url = res.url().to_string();
        let body = res.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!(target: "monitor.query", url = %url, "unauthorized access");
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!(target: "monitor.query", url = %url, body = %body, "server error");
            }
            _ => {}
        }
        Err(QueryError::UnexpectedStatus { status, body })
    }
}

fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
