//! # Domain Expiry Check
//!
//! Checks whether a domain registration is about to lapse by running the
//! system `whois` client, parsing its free-text output into fields, and
//! comparing the registry expiry date against a warning window.
//!
//! ## Features
//!
//! - Host, IP and URL queries, with extra arguments forwarded to the client
//! - Parent-domain fallback for subdomain queries (`sub.example.com` -> `example.com`)
//! - Soft-failure detection for short, well-formed-looking replies
//! - Pluggable [`CommandRunner`] so lookups can be tested without a real client
//! - JSON encoding of parsed fields and expiry reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_expiry_check::ExpiryClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ExpiryClient::new()?;
//!     let report = client.check("example.com", &[]).await?;
//!
//!     println!("Expires: {}", report.expiry);
//!     println!("Verdict: {}", report.verdict);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod expiry;
pub mod parser;
pub mod runner;
pub mod whois;

// Re-export main types for easy access
pub use config::Config;
pub use errors::ExpiryError;
pub use expiry::{ExpiryReport, Verdict};
pub use parser::{WhoisFields, WhoisParser};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use whois::{LookupResult, Subject, Target, WhoisService};

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// High-level client: one lookup, one expiry verdict
#[derive(Clone)]
pub struct ExpiryClient {
    service: Arc<WhoisService>,
    config: Arc<Config>,
}

impl ExpiryClient {
    /// Create a client from defaults and environment overrides
    pub fn new() -> Result<Self, ExpiryError> {
        let config = Arc::new(Config::load()?);
        Ok(Self::new_with_config(config))
    }

    pub fn new_with_config(config: Arc<Config>) -> Self {
        let service = Arc::new(WhoisService::new(config.clone()));
        Self { service, config }
    }

    /// Create a client that runs lookups through `runner` instead of the system binary
    pub fn with_runner(config: Arc<Config>, runner: Arc<dyn CommandRunner>) -> Self {
        let service = Arc::new(WhoisService::with_runner(config.clone(), runner));
        Self { service, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Look up a host, IP address or URL.
    pub async fn lookup(&self, target: &str, args: &[String]) -> Result<LookupResult, ExpiryError> {
        self.service.query_target(&Target::classify(target), args).await
    }

    /// Evaluate a finished lookup against the configured warning window.
    pub fn evaluate(&self, result: &LookupResult, now: DateTime<Utc>) -> Result<ExpiryReport, ExpiryError> {
        ExpiryReport::from_fields(
            result.subject.to_string(),
            &result.fields,
            now,
            self.config.warning_window()?,
        )
    }

    pub async fn check(&self, target: &str, args: &[String]) -> Result<ExpiryReport, ExpiryError> {
        self.check_at(target, args, Utc::now()).await
    }

    /// Like [`check`](Self::check) with an explicit current time.
    pub async fn check_at(
        &self,
        target: &str,
        args: &[String],
        now: DateTime<Utc>,
    ) -> Result<ExpiryReport, ExpiryError> {
        let result = self.lookup(target, args).await?;
        self.evaluate(&result, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ExpiryClient::new();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_empty_target_is_rejected() {
        let client = ExpiryClient::new_with_config(Arc::new(Config::default()));
        let result = client.lookup("", &[]).await;
        assert!(matches!(result, Err(ExpiryError::InvalidTarget(_))));
    }
}
