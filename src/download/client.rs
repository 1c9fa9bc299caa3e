//! HTTP client wrapper shared by the portal and document transfers.
//!
//! `HttpClient` owns a pooled `reqwest::Client` configured with timeouts, gzip
//! and the project User-Agent. Non-2xx responses become
//! [`DownloadError::HttpStatus`] (with any `Retry-After` value kept) so callers
//! classify every failure the same way.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use reqwest::cookie::Jar;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    DOWNLOAD_CONNECT_TIMEOUT_SECS, DOWNLOAD_READ_TIMEOUT_SECS, WRITE_BUFFER_BYTES,
};
use super::error::DownloadError;
use super::progress::ProgressObserver;
use crate::store::PendingWrite;
use crate::user_agent;

/// Pooled HTTP client with typed error mapping.
///
/// Create once per role and clone freely; clones share the connection pool
/// and, when present, the cookie jar.
///
/// # Example
///
/// ```no_run
/// use harvester_core::download::HttpClient;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let page = client.get_text(&Url::parse("https://portal.example.gov/pubcris")?).await?;
/// println!("{} bytes of markup", page.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Client with the document download timeouts (30s connect, 300s total).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(DOWNLOAD_CONNECT_TIMEOUT_SECS, DOWNLOAD_READ_TIMEOUT_SECS, None)
    }

    /// Client with explicit timeouts and an optional shared cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    #[instrument(level = "debug", skip(cookie_jar), fields(cookies = cookie_jar.is_some()))]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
        cookie_jar: Option<Arc<Jar>>,
    ) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent());
        if let Some(jar) = cookie_jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Sends a GET and returns the response if the status is 2xx.
    ///
    /// # Errors
    ///
    /// Returns `Timeout`/`Network` for transport failures and `HttpStatus`
    /// for any non-2xx response.
    pub async fn get(&self, url: &Url) -> Result<Response, DownloadError> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;
        check_status(url, response)
    }

    /// Sends a form-encoded POST and returns the response if the status is 2xx.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn post_form(
        &self,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<Response, DownloadError> {
        debug!(url = %url, fields = form.len(), "POST form");
        let response = self
            .client
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;
        check_status(url, response)
    }

    /// GET and read the body as text.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus transport errors while reading the body.
    pub async fn get_text(&self, url: &Url) -> Result<String, DownloadError> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))
    }

    /// POST a form and read the body as text.
    ///
    /// # Errors
    ///
    /// Same as [`post_form`](Self::post_form), plus transport errors while
    /// reading the body.
    pub async fn post_form_text(
        &self,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<String, DownloadError> {
        let response = self.post_form(url, form).await?;
        response
            .text()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))
    }

    /// Underlying reqwest client, for callers that need custom requests.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Passes 2xx responses through; maps anything else to [`DownloadError::HttpStatus`].
pub(crate) fn check_status(url: &Url, response: Response) -> Result<Response, DownloadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    Err(DownloadError::http_status_with_retry_after(
        url.as_str(),
        status.as_u16(),
        retry_after,
    ))
}

/// Streams a response body into a pending store write, returning bytes written.
///
/// Chunks pass through a fixed-size buffer; the body is never held in memory
/// as a whole. The caller commits or aborts `pending` based on the result.
pub(crate) async fn stream_to_pending(
    response: Response,
    pending: &mut PendingWrite,
    name: &str,
    observer: &dyn ProgressObserver,
) -> Result<u64, DownloadError> {
    let url = response.url().to_string();
    let temp_path = pending.temp_path().to_path_buf();
    let file = pending.file_mut()?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::from_reqwest(&url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(&temp_path, e))?;
        let len = chunk.len() as u64;
        bytes_written += len;
        observer.on_bytes(name, len);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(&temp_path, e))?;
    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::download::NoopProgress;
    use crate::store::DocumentStore;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_get_text_success() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/pubcris"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/pubcris", mock_server.uri())).unwrap();
        assert_eq!(client.get_text(&url).await.unwrap(), "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_get_maps_status_and_retry_after() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/busy", mock_server.uri())).unwrap();
        match client.get(&url).await {
            Err(DownloadError::HttpStatus {
                status,
                retry_after,
                ..
            }) => {
                assert_eq!(status, 429);
                assert_eq!(retry_after.as_deref(), Some("7"));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_form_encodes_fields() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("p_auth=tok123"))
            .and(body_string_contains("cur=2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("results"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/search", mock_server.uri())).unwrap();
        let form = [
            ("p_auth".to_string(), "tok123".to_string()),
            ("cur".to_string(), "2".to_string()),
        ];
        assert_eq!(client.post_form_text(&url, &form).await.unwrap(), "results");
    }

    #[tokio::test]
    async fn test_read_timeout_maps_to_timeout_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_timeouts(1, 1, None).unwrap();
        let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();
        assert!(matches!(
            client.get(&url).await,
            Err(DownloadError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_to_pending_writes_all_bytes() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let body = vec![7_u8; 200 * 1024];
        Mock::given(method("GET"))
            .and(path("/big.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let store = DocumentStore::open(temp.path()).await.unwrap();
        let client = HttpClient::new().unwrap();
        let url = Url::parse(&format!("{}/big.pdf", mock_server.uri())).unwrap();

        let response = client.get(&url).await.unwrap();
        let mut pending = store.begin_write("big.pdf").await.unwrap();
        let written = stream_to_pending(response, &mut pending, "big.pdf", &NoopProgress)
            .await
            .unwrap();
        pending.commit().await.unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(temp.path().join("big.pdf")).unwrap(), body);
    }
}
