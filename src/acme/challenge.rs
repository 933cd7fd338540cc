use crate::utils::errors::{CertimateError, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Publishes and removes `_acme-challenge` TXT records.
///
/// Called from the ACME client's blocking worker, so implementations are
/// synchronous.
pub trait Dns01Provider: Send + Sync {
    fn present(&self, domain: &str, token: &str, key_auth: &str) -> Result<()>;
    fn cleanup(&self, domain: &str, token: &str, key_auth: &str) -> Result<()>;
}

/// Serves `/.well-known/acme-challenge/<token>` responses.
pub trait Http01Provider: Send + Sync {
    fn present(&self, domain: &str, token: &str, key_auth: &str) -> Result<()>;
    fn cleanup(&self, domain: &str, token: &str, key_auth: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeType {
    Dns01,
    Http01,
}

impl FromStr for ChallengeType {
    type Err = CertimateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dns-01" => Ok(ChallengeType::Dns01),
            "http-01" => Ok(ChallengeType::Http01),
            other => Err(CertimateError::Config(format!(
                "unsupported challenge type: '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeType::Dns01 => f.write_str("dns-01"),
            ChallengeType::Http01 => f.write_str("http-01"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dns01Options {
    pub propagation_wait: Option<Duration>,
    pub propagation_timeout: Option<Duration>,
    pub ttl: Option<u32>,
    pub nameservers: Vec<String>,
    pub disable_follow_cname: bool,
}

impl Dns01Options {
    /// Custom resolvers or a fixed wait replace the authoritative NS check.
    pub fn skip_authoritative_check(&self) -> bool {
        !self.nameservers.is_empty() || self.propagation_wait.is_some_and(|d| !d.is_zero())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Http01Options {
    pub delay: Duration,
}

/// A configured challenge provider handed to the ACME client.
#[derive(Clone)]
pub enum ChallengeSolver {
    Dns01 {
        provider: Arc<dyn Dns01Provider>,
        options: Dns01Options,
    },
    Http01 {
        provider: Arc<dyn Http01Provider>,
        options: Http01Options,
    },
}

impl ChallengeSolver {
    pub fn challenge_type(&self) -> ChallengeType {
        match self {
            ChallengeSolver::Dns01 { .. } => ChallengeType::Dns01,
            ChallengeSolver::Http01 { .. } => ChallengeType::Http01,
        }
    }
}

impl fmt::Debug for ChallengeSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeSolver::Dns01 { options, .. } => f
                .debug_struct("Dns01")
                .field("options", options)
                .finish_non_exhaustive(),
            ChallengeSolver::Http01 { options, .. } => f
                .debug_struct("Http01")
                .field("options", options)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_type_parsing() {
        assert_eq!("dns-01".parse::<ChallengeType>().unwrap(), ChallengeType::Dns01);
        assert_eq!("http-01".parse::<ChallengeType>().unwrap(), ChallengeType::Http01);
        let err = "tls-alpn-01".parse::<ChallengeType>().unwrap_err();
        assert!(err.to_string().contains("unsupported challenge type"));
    }

    #[test]
    fn test_skip_authoritative_check() {
        let mut options = Dns01Options::default();
        assert!(!options.skip_authoritative_check());
        options.propagation_wait = Some(Duration::ZERO);
        assert!(!options.skip_authoritative_check());
        options.propagation_wait = Some(Duration::from_secs(30));
        assert!(options.skip_authoritative_check());
        options.propagation_wait = None;
        options.nameservers = vec!["8.8.8.8:53".to_string()];
        assert!(options.skip_authoritative_check());
    }
}
