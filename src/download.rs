use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{SERVER_ERROR_PREFIX, SubsetError, TransportError};
use crate::transport::{RequestMethod, Transport};
use crate::util::backoff;

/// Number of attempts made for each download unless configured otherwise.
pub const DEFAULT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause before the first retry. Zero retries immediately.
    pub delay: Duration,
    /// Upper bound on the pause between retries.
    pub delay_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            delay: Duration::ZERO,
            delay_max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// How a failed attempt is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Forbidden,
    TransientServerError,
    Other,
}

/// Whether a transport failure message is the HTTP transport's 5xx signature.
pub fn is_internal_server_error(message: &str) -> bool {
    message.starts_with(SERVER_ERROR_PREFIX)
}

pub fn classify(error: &TransportError) -> FailureKind {
    match error {
        TransportError::Forbidden { .. } => FailureKind::Forbidden,
        TransportError::Failed { message, .. } if is_internal_server_error(message) => {
            FailureKind::TransientServerError
        }
        TransportError::Failed { .. } => FailureKind::Other,
    }
}

/// Wraps a [`Transport`] with the retry policy.
#[derive(Debug, Clone)]
pub struct Downloader<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Downloader<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Downloads `url` into `destination`, retrying on 5xx failures.
    ///
    /// The URL, and the payload of a POST, are logged before every attempt.
    ///
    /// Forbidden responses and failures without the 5xx signature are reported
    /// after the first attempt. A policy of zero attempts still makes one.
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        method: &RequestMethod,
        access_token: Option<&str>,
    ) -> Result<PathBuf, SubsetError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut sleep = self.policy.delay;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            info!(url = %url, attempt = attempts, "Downloading: {}", url);
            if let Some(payload) = method.payload() {
                info!(attempt = attempts, "POST request data: \"{}\"", payload.log_string());
            }

            let err = match self
                .transport
                .download(url, destination, method, access_token)
            {
                Ok(path) => return Ok(path),
                Err(err) => err,
            };

            match classify(&err) {
                FailureKind::Forbidden => {
                    return Err(SubsetError::AccessForbidden {
                        url: url.to_string(),
                        source: err,
                    });
                }
                FailureKind::TransientServerError if attempts < max_attempts => {
                    info!(url = %url, attempt = attempts, "500 error returned, retrying request.");
                    if !sleep.is_zero() {
                        thread::sleep(sleep);
                        sleep = backoff(sleep, self.policy.delay_max);
                    }
                }
                FailureKind::TransientServerError => {
                    warn!(url = %url, attempts, "giving up after repeated server errors");
                    return Err(SubsetError::AccessFailedRetriesExhausted {
                        url: url.to_string(),
                        attempts,
                        source: err,
                    });
                }
                FailureKind::Other => {
                    return Err(SubsetError::AccessFailedUnknown {
                        url: url.to_string(),
                        source: err,
                    });
                }
            }
        }
    }
}
