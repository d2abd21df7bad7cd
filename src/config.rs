use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::RetryPolicy;
use crate::transport::{default_timeout, default_user_agent};

/// Resolver configuration file used when none is configured.
pub const DEFAULT_RESOLVER_CONFIG: &str = "var_subsetter_config.yml";

#[derive(Debug, Clone)]
pub struct SubsetterConfig {
    /// Retry budget for every download.
    pub retry: RetryPolicy,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    pub user_agent: String,
    /// Configuration file handed to the variable resolver.
    pub resolver_config: PathBuf,
}

impl Default for SubsetterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: default_timeout(),
            verify: true,
            user_agent: default_user_agent(),
            resolver_config: PathBuf::from(DEFAULT_RESOLVER_CONFIG),
        }
    }
}

impl SubsetterConfig {
    /// Loads configuration from environment variables and/or `.varsubsetrc`.
    ///
    /// Precedence, highest first:
    /// - environment variables `VARSUBSET_ATTEMPTS`, `VARSUBSET_TIMEOUT`
    ///   (seconds), `VARSUBSET_VERIFY`, `VARSUBSET_RESOLVER_CONFIG`
    /// - the rc file from `VARSUBSET_RC`, `./.varsubsetrc` or `~/.varsubsetrc`
    /// - built-in defaults
    pub fn from_env() -> Result<Self> {
        let mut values = RcConfig {
            attempts: env_var("VARSUBSET_ATTEMPTS"),
            timeout: env_var("VARSUBSET_TIMEOUT"),
            verify: env_var("VARSUBSET_VERIFY"),
            resolver_config: env_var("VARSUBSET_RESOLVER_CONFIG"),
        };

        if !values.is_complete() {
            for rc_path in rc_candidates() {
                if rc_path.exists() {
                    let file = read_rc(&rc_path).with_context(|| {
                        format!("failed to read configuration file {}", rc_path.display())
                    })?;
                    values = values.or(file);
                    break;
                }
            }
        }

        values.into_config()
    }

    /// Sets the retry budget. At least one attempt is always made, so `0` is
    /// stored as `1`.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration, max: Duration) -> Self {
        self.retry.delay = delay;
        self.retry.delay_max = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_resolver_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolver_config = path.into();
        self
    }
}

#[derive(Debug, Default)]
struct RcConfig {
    attempts: Option<String>,
    timeout: Option<String>,
    verify: Option<String>,
    resolver_config: Option<String>,
}

impl RcConfig {
    fn is_complete(&self) -> bool {
        self.attempts.is_some()
            && self.timeout.is_some()
            && self.verify.is_some()
            && self.resolver_config.is_some()
    }

    fn or(self, other: RcConfig) -> RcConfig {
        RcConfig {
            attempts: self.attempts.or(other.attempts),
            timeout: self.timeout.or(other.timeout),
            verify: self.verify.or(other.verify),
            resolver_config: self.resolver_config.or(other.resolver_config),
        }
    }

    fn into_config(self) -> Result<SubsetterConfig> {
        let mut cfg = SubsetterConfig::default();

        if let Some(v) = self.attempts {
            let attempts: u32 = v
                .parse()
                .with_context(|| format!("invalid attempts value `{}`", v))?;
            if attempts == 0 {
                bail!("invalid attempts value `0`: at least one attempt is required");
            }
            cfg.retry.max_attempts = attempts;
        }
        if let Some(v) = self.timeout {
            let secs: u64 = v
                .parse()
                .with_context(|| format!("invalid timeout value `{}`", v))?;
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = self.verify {
            cfg.verify = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = self.resolver_config {
            cfg.resolver_config = PathBuf::from(v);
        }

        Ok(cfg)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((k, v)) = line.split_once(':') {
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                continue;
            }
            let v = Some(v.to_string());
            match k.trim() {
                "attempts" => cfg.attempts = v,
                "timeout" => cfg.timeout = v,
                "verify" => cfg.verify = v,
                "resolver_config" => cfg.resolver_config = v,
                _ => {}
            }
        }
    }

    cfg
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) VARSUBSET_RC (explicit)
    // 2) ./.varsubsetrc
    // 3) ~/.varsubsetrc
    if let Ok(p) = std::env::var("VARSUBSET_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".varsubsetrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".varsubsetrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SubsetterConfig::default();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert!(cfg.verify);
        assert_eq!(cfg.resolver_config, PathBuf::from(DEFAULT_RESOLVER_CONFIG));
    }

    #[test]
    fn parses_rc_text() {
        let cfg = parse_rc(
            "# comment\nattempts: 5\ntimeout: '30'\nverify: 0\nresolver_config: \"conf/vars.yml\"\nunknown: x\n",
        )
        .into_config()
        .unwrap();

        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(!cfg.verify);
        assert_eq!(cfg.resolver_config, PathBuf::from("conf/vars.yml"));
    }

    #[test]
    fn explicit_values_win_over_file() {
        let explicit = RcConfig {
            attempts: Some("7".into()),
            ..RcConfig::default()
        };
        let cfg = explicit.or(parse_rc("attempts: 2\ntimeout: 10\n")).into_config().unwrap();
        assert_eq!(cfg.retry.max_attempts, 7);
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_values() {
        let zero = RcConfig {
            attempts: Some("0".into()),
            ..RcConfig::default()
        };
        assert!(zero.into_config().is_err());

        let garbage = RcConfig {
            timeout: Some("soon".into()),
            ..RcConfig::default()
        };
        assert!(garbage.into_config().is_err());
    }

    #[test]
    fn builder_overrides() {
        let cfg = SubsetterConfig::default()
            .with_max_attempts(4)
            .with_verify(false)
            .with_resolver_config("x.yml");
        assert_eq!(cfg.retry.max_attempts, 4);
        assert!(!cfg.verify);
        assert_eq!(cfg.resolver_config, PathBuf::from("x.yml"));
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let cfg = SubsetterConfig::default().with_max_attempts(0);
        assert_eq!(cfg.retry.max_attempts, 1);
    }

    #[test]
    fn reads_rc_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".varsubsetrc");
        std::fs::write(&path, "attempts: 4\n").unwrap();
        let cfg = read_rc(&path).unwrap().into_config().unwrap();
        assert_eq!(cfg.retry.max_attempts, 4);
    }
}
