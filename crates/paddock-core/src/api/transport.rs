use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client};

use super::ApiError;

/// The parts of an HTTP response the fetch pipeline looks at
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `retry-after` header value, if present
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Issues GET requests. Transport-level failures (DNS, connection reset,
/// timeout) are errors; every HTTP status, including 4xx/5xx, is a response.
pub trait HttpTransport {
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, ApiError>> + Send;
}

/// `reqwest`-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, ApiError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let mut response = HttpResponse {
            status: 200,
            retry_after: None,
            body: String::new(),
        };
        assert!(response.is_success());
        assert!(!response.is_rate_limited());

        response.status = 429;
        assert!(!response.is_success());
        assert!(response.is_rate_limited());

        response.status = 304;
        assert!(!response.is_success());
    }
}
