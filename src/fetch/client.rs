//! HTTP fetcher with a uniform retry policy for listings and file content.
//!
//! The [`Fetcher`] owns one pooled reqwest client and a [`RetryPolicy`]. Every
//! request, whether it fetches a listing page or streams a file to disk, goes
//! through the same retry loop.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PARTIAL_SUFFIX, READ_TIMEOUT_SECS};
use super::error::FetchError;
use super::retry::RetryPolicy;
use crate::user_agent;

/// A single metadata request: where to go and how to treat a 404.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL to GET.
    pub url: String,
    /// `Accept` header value.
    pub accept: &'static str,
    /// When set, a 404 fails immediately instead of being retried.
    pub not_found_is_fatal: bool,
}

impl FetchRequest {
    /// Creates a request whose 404 responses are retried like any other status.
    #[must_use]
    pub fn new(url: impl Into<String>, accept: &'static str) -> Self {
        Self {
            url: url.into(),
            accept,
            not_found_is_fatal: false,
        }
    }

    /// Marks 404 as a final answer for this request.
    #[must_use]
    pub fn fatal_not_found(mut self, fatal: bool) -> Self {
        self.not_found_is_fatal = fatal;
        self
    }
}

/// HTTP fetcher with retry and streaming support.
///
/// Create once per run and reuse so requests share the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher with the default timeouts and the given retry policy.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Self::with_timeouts(policy, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn with_timeouts(
        policy: RetryPolicy,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(user_agent::ACCEPT_LANGUAGE),
        );
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .default_headers(headers)
            .build()?;
        Ok(Self { client, policy })
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a listing document and decodes it as UTF-8.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected, whatever
    /// charset the server announces.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] once every attempt failed,
    /// [`FetchError::NotFound`] for a fatal 404 and [`FetchError::InvalidUrl`]
    /// for a malformed URL.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn get_text(&self, request: &FetchRequest) -> Result<String, FetchError> {
        Url::parse(&request.url).map_err(|_| FetchError::invalid_url(request.url.clone()))?;
        self.retrying(&request.url, || self.get_text_once(request))
            .await
    }

    /// Streams `url` into `target`, returning the number of bytes written.
    ///
    /// The body goes to `<target>.part` first and is renamed onto `target`
    /// only after the whole body has been flushed. A failed attempt removes
    /// the partial file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] once every attempt failed,
    /// [`FetchError::Io`] for local write failures and
    /// [`FetchError::InvalidUrl`] for a malformed URL.
    #[instrument(skip(self), fields(url = %url, target = %target.display()))]
    pub async fn download_to_file(&self, url: &str, target: &Path) -> Result<u64, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        let partial = partial_path(target);
        self.retrying(url, || self.download_once(url, target, &partial))
            .await
    }

    /// Runs `operation` under the retry policy.
    async fn retrying<T, F, Fut>(&self, url: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            attempt += 1;
            warn!(
                url,
                status = ?error.status(),
                attempt,
                max_attempts,
                error = %error,
                "request failed"
            );
            if attempt >= max_attempts {
                return Err(FetchError::exhausted(url, attempt, error));
            }
        }
    }

    async fn get_text_once(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let response = self
            .send(&request.url, request.accept, request.not_found_is_fatal)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(request.url.clone(), e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn download_once(
        &self,
        url: &str,
        target: &Path,
        partial: &Path,
    ) -> Result<u64, FetchError> {
        let response = self.send(url, user_agent::ACCEPT_ANY, false).await?;

        let mut file = File::create(partial)
            .await
            .map_err(|e| FetchError::io(partial, e))?;

        let stream_result = stream_to_file(&mut file, response, url, partial).await;
        drop(file);

        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %partial.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(partial).await;
                return Err(error);
            }
        };

        tokio::fs::rename(partial, target)
            .await
            .map_err(|e| FetchError::io(target, e))?;

        info!(path = %target.display(), bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    async fn send(
        &self,
        url: &str,
        accept: &'static str,
        not_found_is_fatal: bool,
    ) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if not_found_is_fatal && status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(url));
        }
        Err(FetchError::http_status(url, status.as_u16()))
    }
}

/// Streams the response body to `file` chunk by chunk, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(file_path, e))?;

    Ok(bytes_written)
}

/// `song.mp3` → `song.mp3.part`, in the same directory.
pub(crate) fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}
