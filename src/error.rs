use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Prefix the HTTP transport puts on messages for 5xx responses.
pub const SERVER_ERROR_PREFIX: &str = "Unable to download.";

/// Status carried by an access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Code(u16),
    Unknown,
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessStatus::Code(code) => write!(f, "{code}"),
            AccessStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Errors returned by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("access to {url} is forbidden")]
    Forbidden { url: String },

    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TransportError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransportError::Failed {
            message: message.into(),
            source: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubsetError {
    #[error("access failed for {url} with status 400: forbidden")]
    AccessForbidden {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("access failed for {url} after {attempts} attempt(s)")]
    AccessFailedRetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("access failed for {url} with status Unknown")]
    AccessFailedUnknown {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to determine required variables")]
    Resolver(#[source] anyhow::Error),

    #[error("file operation failed on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SubsetError {
    /// Status associated with an access failure, if this is one.
    pub fn status(&self) -> Option<AccessStatus> {
        match self {
            SubsetError::AccessForbidden { .. } => Some(AccessStatus::Code(400)),
            SubsetError::AccessFailedUnknown { .. } => Some(AccessStatus::Unknown),
            _ => None,
        }
    }

    /// The URL that could not be accessed, if this is an access failure.
    pub fn url(&self) -> Option<&str> {
        match self {
            SubsetError::AccessForbidden { url, .. }
            | SubsetError::AccessFailedRetriesExhausted { url, .. }
            | SubsetError::AccessFailedUnknown { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Builds the transport error for a non-success HTTP response.
///
/// 401 and 403 become [`TransportError::Forbidden`]. 5xx responses get a
/// message starting with [`SERVER_ERROR_PREFIX`] so the downloader treats them
/// as transient. The server body is appended when it is short enough to be a
/// human-readable error.
pub(crate) fn describe_http_failure(status: StatusCode, url: &str, body: &str) -> TransportError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return TransportError::Forbidden {
            url: url.to_string(),
        };
    }

    let detail = summarize_body(body);

    if status.is_server_error() {
        return TransportError::failed(format!(
            "{} HTTP {} for url ({}){}",
            SERVER_ERROR_PREFIX,
            status.as_u16(),
            url,
            detail
        ));
    }

    if status == StatusCode::NOT_FOUND {
        return TransportError::failed(format!(
            "Granule resource not found (HTTP 404).\n- Check the granule URL and the service suffix\nrequest: {}{}",
            url, detail
        ));
    }

    TransportError::failed(format!(
        "Request failed: HTTP {} for url ({}){}",
        status.as_u16(),
        url,
        detail
    ))
}

fn summarize_body(body: &str) -> String {
    let body = body.trim();
    // Hyrax error pages can be large HTML documents; only keep short bodies.
    if body.is_empty() || body.len() > 512 {
        String::new()
    } else {
        format!("\n{}", body)
    }
}
