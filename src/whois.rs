use crate::{
    config::Config,
    errors::ExpiryError,
    parser::{WhoisFields, WhoisParser},
    runner::{CommandRunner, SystemRunner},
};
use serde::Serialize;
use std::{fmt, net::IpAddr, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Exit status many whois clients use for "no data", which is not a hard failure.
pub const SOFT_FAILURE_STATUS: i32 = 2;

/// What a lookup was run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Host(String),
    Ip(IpAddr),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Host(host) => f.write_str(host),
            Subject::Ip(ip) => write!(f, "{}", ip),
        }
    }
}

/// A query target as typed by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Host(String),
    Ip(IpAddr),
    Url(String),
}

impl Target {
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if let Ok(ip) = input.parse::<IpAddr>() {
            Target::Ip(ip)
        } else if input.contains("://") {
            Target::Url(input.to_string())
        } else {
            Target::Host(input.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct LookupResult {
    pub subject: Subject,
    pub raw: Vec<u8>,
    pub fields: WhoisFields,
    pub elapsed: Duration,
}

impl LookupResult {
    pub fn host(&self) -> Option<&str> {
        match &self.subject {
            Subject::Host(host) => Some(host),
            Subject::Ip(_) => None,
        }
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self.subject {
            Subject::Ip(ip) => Some(ip),
            Subject::Host(_) => None,
        }
    }

    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }

    /// First value recorded for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// Compact JSON encoding of the parsed fields.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }
}

impl fmt::Display for LookupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json().unwrap_or_default())
    }
}

pub struct WhoisService {
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
    parser: WhoisParser,
}

impl WhoisService {
    pub fn new(config: Arc<Config>) -> Self {
        let runner = Arc::new(SystemRunner::new(
            config.whois_binary.clone(),
            config.whois_timeout(),
        ));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: Arc<Config>, runner: Arc<dyn CommandRunner>) -> Self {
        let parser = WhoisParser::with_min_lines(config.min_response_lines);
        Self { config, runner, parser }
    }

    /// Dispatch a user-supplied target to the matching query.
    pub async fn query_target(&self, target: &Target, args: &[String]) -> Result<LookupResult, ExpiryError> {
        match target {
            Target::Host(host) => self.query_host(host, args).await,
            Target::Ip(ip) => self.query_ip(*ip, args).await,
            Target::Url(url) => self.query(url, args).await,
        }
    }

    /// Query whois data for the host part of a URL
    pub async fn query(&self, url: &str, args: &[String]) -> Result<LookupResult, ExpiryError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ExpiryError::InvalidTarget(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ExpiryError::InvalidTarget(format!("no host in {}", url)))?;

        // IPv6 hosts come back bracketed
        match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
            Ok(ip) => self.query_ip(ip, args).await,
            Err(_) => self.query_host(host, args).await,
        }
    }

    /// Query whois data for a host, walking up to the parent domain while
    /// the lookup fails and more than two labels remain.
    /// Dotted addresses are routed to [`query_ip`](Self::query_ip).
    pub async fn query_host(&self, host: &str, args: &[String]) -> Result<LookupResult, ExpiryError> {
        if let Ok(ip) = host.trim().parse::<IpAddr>() {
            return self.query_ip(ip, args).await;
        }
        let mut host = normalize_host(host)?;

        loop {
            match self.execute(&host, args).await {
                Ok(result) => {
                    info!("Lookup for {} succeeded in {:?}", host, result.elapsed);
                    return Ok(result);
                }
                Err(e) => match parent_domain(&host) {
                    Some(parent) if e.is_retryable() => {
                        warn!("Lookup for {} failed ({}), retrying with {}", host, e, parent);
                        host = parent;
                    }
                    _ => return Err(e),
                },
            }
        }
    }

    /// Query whois data for an IP address. No fallback is attempted.
    pub async fn query_ip(&self, ip: IpAddr, args: &[String]) -> Result<LookupResult, ExpiryError> {
        let result = self.execute(&ip.to_string(), args).await?;
        info!("Lookup for {} succeeded in {:?}", ip, result.elapsed);
        Ok(result)
    }

    /// Run the whois client once for `target` and parse what it printed.
    pub async fn execute(&self, target: &str, args: &[String]) -> Result<LookupResult, ExpiryError> {
        let output = self.runner.run(target, args).await?;

        match output.status {
            Some(0) => {}
            Some(SOFT_FAILURE_STATUS) => {
                debug!("whois exited with status {} for {}, parsing output anyway", SOFT_FAILURE_STATUS, target);
            }
            status => {
                return Err(ExpiryError::ExecutionFailed {
                    status: status.unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        if output.stdout.len() > self.config.max_response_size {
            return Err(ExpiryError::ResponseTooLarge);
        }

        let fields = self.parser.parse(&output.stdout)?;

        let subject = match target.parse::<IpAddr>() {
            Ok(ip) => Subject::Ip(ip),
            Err(_) => Subject::Host(target.to_string()),
        };

        Ok(LookupResult {
            subject,
            raw: output.stdout,
            fields,
            elapsed: output.elapsed,
        })
    }
}

fn normalize_host(host: &str) -> Result<String, ExpiryError> {
    let host = host.trim().trim_end_matches('.').to_lowercase();

    if host.is_empty() {
        return Err(ExpiryError::InvalidTarget("Empty host".to_string()));
    }

    // A leading dash would be read as a flag by the whois client
    if host.starts_with('-') || host.contains(char::is_whitespace) {
        return Err(ExpiryError::InvalidTarget(host));
    }

    Ok(host)
}

/// `sub.example.com` -> `example.com`; `None` once two labels remain.
fn parent_domain(host: &str) -> Option<String> {
    if host.split('.').count() <= 2 {
        return None;
    }
    host.split_once('.').map(|(_, parent)| parent.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_domain() {
        assert_eq!(parent_domain("sub.example.com"), Some("example.com".to_string()));
        assert_eq!(parent_domain("a.b.example.co.uk"), Some("b.example.co.uk".to_string()));
        assert_eq!(parent_domain("example.com"), None);
        assert_eq!(parent_domain("localhost"), None);
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("  Example.COM. ").unwrap(), "example.com");
        assert!(matches!(normalize_host("   "), Err(ExpiryError::InvalidTarget(_))));
        assert!(matches!(normalize_host("-h evil"), Err(ExpiryError::InvalidTarget(_))));
    }

    #[test]
    fn test_classify_target() {
        assert_eq!(Target::classify("192.0.2.1"), Target::Ip("192.0.2.1".parse().unwrap()));
        assert_eq!(Target::classify("2001:db8::1"), Target::Ip("2001:db8::1".parse().unwrap()));
        assert_eq!(
            Target::classify("https://sub.example.com/path"),
            Target::Url("https://sub.example.com/path".to_string())
        );
        assert_eq!(Target::classify(" example.com "), Target::Host("example.com".to_string()));
    }

    #[test]
    fn test_display_is_compact_json() {
        let mut fields = WhoisFields::new();
        fields.insert("A".to_string(), vec!["1".to_string(), "2".to_string()]);
        let result = LookupResult {
            subject: Subject::Host("example.com".to_string()),
            raw: Vec::new(),
            fields,
            elapsed: Duration::ZERO,
        };
        assert_eq!(result.to_string(), r#"{"A":["1","2"]}"#);
        assert_eq!(result.first("A"), Some("1"));
        assert_eq!(result.host(), Some("example.com"));
        assert_eq!(result.ip(), None);
    }
}
