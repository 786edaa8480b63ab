//! Blocking HTTP transport for the image API.

use photosync_engine::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use std::time::Duration;

/// [`HttpClient`] backed by `reqwest`'s blocking client.
///
/// Must be built and dropped outside of a Tokio runtime context.
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("photosync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let builder = match request.method {
            HttpMethod::Get => self.inner.get(&request.url),
            HttpMethod::Post => self
                .inner
                .post(&request.url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(request.body),
            HttpMethod::Delete => self.inner.delete(&request.url),
        };

        let response = builder
            .query(&request.query)
            .send()
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
