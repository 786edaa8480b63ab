//! In-process image API server for HTTP tests.

use photosync_engine::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, ImageListResponse, MemoryRemoteCatalog,
    PageRequest, RemoteCatalog, RemoteError, RemoteImage,
};
use photosync_protocol::Timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An [`HttpClient`] that routes image API requests straight into a
/// [`MemoryRemoteCatalog`].
///
/// Useful for exercising [`HttpRemoteCatalog`](photosync_engine::HttpRemoteCatalog)
/// without a network.
#[derive(Clone)]
pub struct LoopbackClient {
    catalog: Arc<MemoryRemoteCatalog>,
    offline: Arc<AtomicBool>,
}

impl LoopbackClient {
    /// Creates a client serving `catalog`.
    pub fn new(catalog: Arc<MemoryRemoteCatalog>) -> Self {
        Self {
            catalog,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every request fail as if the server were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn route(&self, request: &HttpRequest) -> Result<HttpResponse, RemoteError> {
        let path = request
            .url
            .find("/api/images")
            .map(|i| &request.url[i..])
            .unwrap_or(&request.url);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (HttpMethod::Get, ["api", "images"]) => {
                let page = PageRequest {
                    page: query_number(request, "page").unwrap_or(1),
                    limit: query_number(request, "limit").unwrap_or(100),
                };
                let page = self.catalog.list_items(page)?;
                let body = ImageListResponse {
                    images: page.items.iter().map(RemoteImage::from_item).collect(),
                    pagination: page.pagination,
                };
                Ok(json(200, &body))
            }
            (HttpMethod::Get, ["api", "images", id, "file"]) => {
                Ok(HttpResponse::new(200, self.catalog.fetch_bytes(id)?))
            }
            (HttpMethod::Post, ["api", "images"]) => {
                let Some(name) = request.query_value("name") else {
                    return Ok(HttpResponse::new(400, "missing name"));
                };
                let hint = query_number(request, "modifiedAt").map(Timestamp::from_millis);
                let item = self.catalog.create_item(&request.body, name, hint)?;
                Ok(json(201, &RemoteImage::from_item(&item)))
            }
            (HttpMethod::Delete, ["api", "images", id]) => {
                self.catalog.delete_item(id)?;
                Ok(HttpResponse::new(204, Vec::new()))
            }
            _ => Ok(HttpResponse::new(404, format!("no route for {path}"))),
        }
    }
}

impl HttpClient for LoopbackClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        if self.offline.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        match self.route(&request) {
            Ok(response) => Ok(response),
            Err(e) => match e.status {
                Some(status) => Ok(HttpResponse::new(status, e.detail)),
                None => Err(e.detail),
            },
        }
    }
}

fn query_number<T: std::str::FromStr>(request: &HttpRequest, key: &str) -> Option<T> {
    request.query_value(key).and_then(|v| v.parse().ok())
}

fn json<T: serde::Serialize>(status: u16, body: &T) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(body).unwrap_or_default())
}
