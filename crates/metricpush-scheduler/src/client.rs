//! HTTP delivery of a rendered snapshot.

use std::time::Duration;

use bytes::Bytes;
use http::{header, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::error::{DeliveryError, PushError, PushResult};

const USER_AGENT: &str = concat!("metricpush/", env!("CARGO_PKG_VERSION"));

/// Posts exposition payloads to a single collector URL.
///
/// Keeps a small connection pool, so one client should live as long as
/// its push target.
#[derive(Debug, Clone)]
pub struct PushClient {
    client: Client<HttpConnector, Full<Bytes>>,
    uri: Uri,
    timeout: Duration,
}

impl PushClient {
    pub fn new(uri: Uri, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            uri,
            timeout,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// POST `body` as `text/plain`.
    ///
    /// Returns the status on 2xx. The response body is always read to
    /// the end so the connection can return to the pool.
    pub async fn post(&self, body: Bytes) -> Result<StatusCode, DeliveryError> {
        let len = body.len();
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::USER_AGENT, USER_AGENT)
            .body(Full::new(body))?;

        let exchange = async {
            let resp = self.client.request(req).await?;
            let status = resp.status();
            if let Err(e) = resp.into_body().collect().await {
                debug!(error = %e, uri = %self.uri, "failed to drain push response body");
            }
            Ok::<_, DeliveryError>(status)
        };

        let status = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))??;

        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        debug!(uri = %self.uri, bytes = len, status = status.as_u16(), "metrics pushed");
        Ok(status)
    }
}

/// Parse and check a push URL. Only `http://` with a host is accepted.
pub fn parse_push_url(url: &str) -> PushResult<Uri> {
    let invalid = |reason: &str| PushError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some("https") => return Err(invalid("https is not supported")),
        Some(other) => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        None => return Err(invalid("missing scheme")),
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_urls() {
        let uri = parse_push_url("http://localhost:8428/api/v1/import/prometheus").unwrap();
        assert_eq!(uri.host(), Some("localhost"));
        assert_eq!(uri.port_u16(), Some(8428));
        assert_eq!(uri.path(), "/api/v1/import/prometheus");
    }

    #[test]
    fn rejects_https() {
        let err = parse_push_url("https://example.com/").unwrap_err();
        assert!(matches!(err, PushError::InvalidUrl { .. }));
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn rejects_missing_scheme_and_garbage() {
        assert!(parse_push_url("localhost:8428/metrics").is_err());
        assert!(parse_push_url("/metrics").is_err());
        assert!(parse_push_url("http://exa mple.com/").is_err());
        assert!(parse_push_url("").is_err());
    }

    #[test]
    fn rejects_other_schemes() {
        let err = parse_push_url("ftp://example.com/").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[tokio::test]
    async fn post_to_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let uri: Uri = format!("http://{addr}/").parse().unwrap();
        let client = PushClient::new(uri, Duration::from_secs(2));
        let err = client.post(Bytes::from_static(b"up 1\n")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Request(_)), "{err:?}");
    }
}
