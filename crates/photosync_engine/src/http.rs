//! HTTP remote catalog.
//!
//! Speaks JSON to the image API:
//!
//! | Call | Request |
//! |---|---|
//! | list | `GET /api/images?page=N&limit=M` |
//! | fetch | `GET /api/images/{id}/file` |
//! | create | `POST /api/images?name=..&modifiedAt=..` with the raw bytes as body |
//! | delete | `DELETE /api/images/{id}` |
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the engine does
//! not depend on a particular HTTP library.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{Page, PageRequest, Pagination, RemoteCatalog};
use photosync_protocol::{Item, Timestamp};
use serde::{Deserialize, Serialize};

/// HTTP methods used by the image API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters, not yet percent-encoded.
    pub query: Vec<(String, String)>,
    /// Request body. Empty for GET and DELETE.
    pub body: Vec<u8>,
}

impl HttpRequest {
    fn new(method: HttpMethod, url: String) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: Vec::new(),
        }
    }

    fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Returns the value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A response returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err` means
/// no response was received; error statuses are returned as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and waits for the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Image record as serialized by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteImage {
    /// Record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// File name in server storage. Falls back to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_name: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, milliseconds since the epoch.
    pub modified_at: u64,
    /// Whether the server flagged the file as unreadable.
    #[serde(default)]
    pub corrupted: bool,
}

impl RemoteImage {
    /// Converts to the engine's item model.
    pub fn into_item(self) -> Item {
        let storage_name = self.storage_name.unwrap_or_else(|| self.name.clone());
        Item::remote(
            self.id,
            self.name,
            storage_name,
            self.size,
            Timestamp::from_millis(self.modified_at),
        )
        .with_corrupted(self.corrupted)
    }

    /// Builds the wire record for an item.
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.remote_id.clone().unwrap_or_default(),
            name: item.logical_name.clone(),
            storage_name: Some(item.storage_name.clone()),
            size: item.size_bytes,
            modified_at: item.modified_at.map(Timestamp::as_millis).unwrap_or(0),
            corrupted: item.corrupted,
        }
    }
}

/// Body of a listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageListResponse {
    /// Items on this page.
    pub images: Vec<RemoteImage>,
    /// Paging metadata.
    pub pagination: Pagination,
}

/// [`RemoteCatalog`] over the HTTP image API.
pub struct HttpRemoteCatalog<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpRemoteCatalog<C> {
    /// Creates a catalog client for `base_url` (e.g. `https://photos.example.com`).
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn call(&self, request: HttpRequest) -> RemoteResult<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.client.send(request).map_err(|e| {
            tracing::debug!(method = method.as_str(), %url, error = %e, "request failed");
            RemoteError::transport(e)
        })?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(RemoteError::status(
                response.status,
                String::from_utf8_lossy(&response.body).into_owned(),
            ))
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> RemoteResult<T> {
        serde_json::from_slice(body)
            .map_err(|e| RemoteError::invalid_response(format!("malformed JSON: {e}")))
    }
}

impl<C: HttpClient> RemoteCatalog for HttpRemoteCatalog<C> {
    fn list_items(&self, request: PageRequest) -> RemoteResult<Page> {
        let http = HttpRequest::new(HttpMethod::Get, self.url("/api/images"))
            .query("page", request.page)
            .query("limit", request.limit);
        let response: ImageListResponse = Self::decode(&self.call(http)?.body)?;

        Ok(Page {
            items: response
                .images
                .into_iter()
                .map(RemoteImage::into_item)
                .collect(),
            pagination: response.pagination,
        })
    }

    fn fetch_bytes(&self, id: &str) -> RemoteResult<Vec<u8>> {
        let http = HttpRequest::new(HttpMethod::Get, self.url(&format!("/api/images/{id}/file")));
        Ok(self.call(http)?.body)
    }

    fn create_item(
        &self,
        bytes: &[u8],
        display_name: &str,
        modified_at: Option<Timestamp>,
    ) -> RemoteResult<Item> {
        let mut http =
            HttpRequest::new(HttpMethod::Post, self.url("/api/images")).query("name", display_name);
        if let Some(ts) = modified_at {
            http = http.query("modifiedAt", ts.as_millis());
        }
        http.body = bytes.to_vec();

        let image: RemoteImage = Self::decode(&self.call(http)?.body)?;
        Ok(image.into_item())
    }

    fn delete_item(&self, id: &str) -> RemoteResult<()> {
        let http = HttpRequest::new(HttpMethod::Delete, self.url(&format!("/api/images/{id}")));
        match self.call(http) {
            Ok(_) => Ok(()),
            // Already gone.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Replies with canned responses and records requests.
    struct ScriptedClient {
        responses: Mutex<Vec<Result<HttpResponse, String>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedClient {
        fn new(mut responses: Vec<Result<HttpResponse, String>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for &ScriptedClient {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err("no response scripted".into()))
        }
    }

    fn json(value: serde_json::Value) -> Result<HttpResponse, String> {
        Ok(HttpResponse::new(200, value.to_string()))
    }

    #[test]
    fn list_parses_page() {
        let client = ScriptedClient::new(vec![json(serde_json::json!({
            "images": [
                {"id": "7", "name": "a.jpg", "size": 3, "modifiedAt": 1500},
                {"id": "8", "name": "b.png", "storageName": "b-1.png", "size": 4,
                 "modifiedAt": 2000, "corrupted": true}
            ],
            "pagination": {"page": 1, "limit": 2, "total": 5, "hasMore": true}
        }))]);
        let remote = HttpRemoteCatalog::new("https://photos.example.com/", &client);

        let page = remote.list_items(PageRequest::first(2)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].storage_name, "a.jpg");
        assert_eq!(page.items[0].modified_at, Some(Timestamp::from_millis(1500)));
        assert_eq!(page.items[1].storage_name, "b-1.png");
        assert!(page.items[1].corrupted);
        assert!(page.pagination.has_more);

        let sent = &client.requests.lock()[0];
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(sent.url, "https://photos.example.com/api/images");
        assert_eq!(sent.query_value("page"), Some("1"));
        assert_eq!(sent.query_value("limit"), Some("2"));
    }

    #[test]
    fn create_sends_name_and_hint() {
        let client = ScriptedClient::new(vec![json(serde_json::json!({
            "id": "9", "name": "c.png", "size": 2, "modifiedAt": 42000
        }))]);
        let remote = HttpRemoteCatalog::new("http://localhost:3000", &client);

        let item = remote
            .create_item(b"hi", "c.png", Some(Timestamp::from_secs(42)))
            .unwrap();
        assert_eq!(item.remote_id.as_deref(), Some("9"));

        let sent = &client.requests.lock()[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.query_value("name"), Some("c.png"));
        assert_eq!(sent.query_value("modifiedAt"), Some("42000"));
        assert_eq!(sent.body, b"hi");
    }

    #[test]
    fn error_status_carries_body() {
        let client = ScriptedClient::new(vec![Ok(HttpResponse::new(503, "maintenance"))]);
        let remote = HttpRemoteCatalog::new("http://localhost", &client);

        let err = remote.fetch_bytes("1").unwrap_err();
        assert_eq!(err.status, Some(503));
        assert_eq!(err.detail, "maintenance");
        assert!(err.is_retryable());
    }

    #[test]
    fn transport_failure_is_retryable() {
        let client = ScriptedClient::new(vec![Err("connection refused".into())]);
        let remote = HttpRemoteCatalog::new("http://localhost", &client);

        let err = remote.list_items(PageRequest::first(10)).unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.is_retryable());
    }

    #[test]
    fn malformed_body_is_not_retryable() {
        let client = ScriptedClient::new(vec![Ok(HttpResponse::new(200, "<html>"))]);
        let remote = HttpRemoteCatalog::new("http://localhost", &client);

        let err = remote.list_items(PageRequest::first(10)).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn delete_tolerates_missing_item() {
        let client = ScriptedClient::new(vec![
            Ok(HttpResponse::new(404, "not found")),
            Ok(HttpResponse::new(403, "forbidden")),
        ]);
        let remote = HttpRemoteCatalog::new("http://localhost", &client);

        remote.delete_item("1").unwrap();
        assert_eq!(remote.delete_item("2").unwrap_err().status, Some(403));
        assert_eq!(client.requests.lock()[1].url, "http://localhost/api/images/2");
    }
}
