use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::SubsetterConfig;
use crate::error::{TransportError, describe_http_failure};
use crate::util::guess_filename_from_url;

/// Ordered form fields sent as the body of a POST request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    fields: Vec<(String, String)>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// One `key: value` line per field, with no enclosing punctuation.
    pub fn log_string(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// How a resource is requested.
///
/// A POST with an empty payload is still a POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post(FormPayload),
}

impl RequestMethod {
    pub fn payload(&self) -> Option<&FormPayload> {
        match self {
            RequestMethod::Get => None,
            RequestMethod::Post(payload) => Some(payload),
        }
    }
}

/// Single-attempt download primitive.
///
/// Implementations fetch `url` into `destination` and return the local path.
/// They must report authorization failures as [`TransportError::Forbidden`];
/// any other failure is a [`TransportError::Failed`] whose message the
/// downloader inspects.
pub trait Transport {
    fn download(
        &self,
        url: &str,
        destination: &Path,
        method: &RequestMethod,
        access_token: Option<&str>,
    ) -> std::result::Result<PathBuf, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn download(
        &self,
        url: &str,
        destination: &Path,
        method: &RequestMethod,
        access_token: Option<&str>,
    ) -> std::result::Result<PathBuf, TransportError> {
        (**self).download(url, destination, method, access_token)
    }
}

/// [`Transport`] over blocking `reqwest`.
///
/// Each download lands in its own file, named after the last path segment of
/// the URL plus a random component, so concurrent requests for the same URL
/// never share a file.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
    progress: bool,
}

impl HttpTransport {
    pub fn new(config: &SubsetterConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("varsubset-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(config.timeout);

        if !config.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            http,
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn request(&self, url: &str, method: &RequestMethod, access_token: Option<&str>) -> RequestBuilder {
        let req = match method {
            RequestMethod::Get => self.http.get(url),
            RequestMethod::Post(payload) => self.http.post(url).form(payload.fields()),
        };
        match access_token {
            Some(token) => req.bearer_auth(token.trim()),
            None => req,
        }
    }

    fn progress_bar(&self, len: Option<u64>) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let pb = match len {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    }
}

impl Transport for HttpTransport {
    fn download(
        &self,
        url: &str,
        destination: &Path,
        method: &RequestMethod,
        access_token: Option<&str>,
    ) -> std::result::Result<PathBuf, TransportError> {
        let filename = guess_filename_from_url(url).unwrap_or_else(|| "download".to_string());

        std::fs::create_dir_all(destination).map_err(|e| TransportError::Failed {
            message: format!("failed to create directory {}", destination.display()),
            source: Some(Box::new(e)),
        })?;

        let mut resp = self
            .request(url, method, access_token)
            .send()
            .map_err(|e| TransportError::Failed {
                message: format!("could not connect to {}", url),
                source: Some(Box::new(e)),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(describe_http_failure(status, url, &body));
        }

        let write_failed = |e: std::io::Error| TransportError::Failed {
            message: format!("failed to write download into {}", destination.display()),
            source: Some(Box::new(e)),
        };

        // Dropped (and removed) on any error below, so a failed transfer leaves
        // nothing behind.
        let mut out = download_file(destination, &filename).map_err(write_failed)?;
        debug!(url = %url, path = %out.path().display(), "writing response body");
        let pb = self.progress_bar(resp.content_length());

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = match resp.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    return Err(TransportError::Failed {
                        message: format!("download interrupted for {}", url),
                        source: Some(Box::new(e)),
                    });
                }
            };
            out.write_all(&buf[..n]).map_err(write_failed)?;
            if let Some(pb) = &pb {
                pb.inc(n as u64);
            }
        }
        out.flush().map_err(write_failed)?;

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        let (_, target) = out.keep().map_err(|e| write_failed(e.error))?;
        Ok(target)
    }
}

/// Creates a uniquely named file in `destination` that keeps the stem and
/// extension of `filename`, e.g. `africa.dap.k3Xz9Q.nc4`.
fn download_file(destination: &Path, filename: &str) -> std::io::Result<NamedTempFile> {
    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    let suffix = name
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(&format!("{}.", stem))
        .suffix(&suffix)
        .tempfile_in(destination)
}

/// Default user agent for [`HttpTransport`].
pub(crate) fn default_user_agent() -> String {
    format!("varsubset-rs/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_log_string_has_no_braces() {
        let payload = FormPayload::new()
            .with("dap4.ce", "%2Falpha_var")
            .with("extra", "1");
        assert_eq!(payload.log_string(), "dap4.ce: %2Falpha_var\nextra: 1");
        assert!(!payload.log_string().contains('{'));
    }

    #[test]
    fn empty_post_is_not_get() {
        let post = RequestMethod::Post(FormPayload::new());
        assert_ne!(post, RequestMethod::Get);
        assert_eq!(post.payload().map(FormPayload::is_empty), Some(true));
        assert!(RequestMethod::Get.payload().is_none());
    }

    #[test]
    fn payload_lookup() {
        let payload = FormPayload::new().with("dap4.ce", "x");
        assert_eq!(payload.get("dap4.ce"), Some("x"));
        assert_eq!(payload.get("missing"), None);
    }

    #[test]
    fn http_transport_builds_from_defaults() {
        let transport = HttpTransport::new(&SubsetterConfig::default()).unwrap();
        assert!(!transport.progress);
        assert!(transport.with_progress(true).progress);
    }

    #[test]
    fn download_files_keep_name_parts_and_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let first = download_file(dir.path(), "africa.dap.nc4").unwrap();
        let second = download_file(dir.path(), "africa.dap.nc4").unwrap();

        assert_ne!(first.path(), second.path());
        let name = first.path().file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("africa.dap."), "{name}");
        assert_eq!(first.path().extension().and_then(|e| e.to_str()), Some("nc4"));
        assert_eq!(first.path().parent(), Some(dir.path()));
    }

    #[test]
    fn dropped_download_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = download_file(dir.path(), "africa.dmr").unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }
}
