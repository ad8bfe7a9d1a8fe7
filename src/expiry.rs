use crate::{errors::ExpiryError, parser::WhoisFields};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REGISTRY_EXPIRY_FIELD: &str = "Registry Expiry Date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NearingExpiry,
    SufficientTime,
}

impl Verdict {
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::SufficientTime => 0,
            Verdict::NearingExpiry => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NearingExpiry => f.write_str("yes, the domain is nearing expiry"),
            Verdict::SufficientTime => f.write_str("no, sufficient time remains"),
        }
    }
}

/// Outcome of comparing a registry expiry date against the warning window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    pub domain: String,
    pub expiry: DateTime<Utc>,
    pub threshold: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
    pub window_hours: i64,
    pub expiring_soon: bool,
    pub verdict: Verdict,
}

impl ExpiryReport {
    pub fn evaluate(
        domain: impl Into<String>,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Self, ExpiryError> {
        let invalid = || ExpiryError::InvalidWindow(window.num_hours().unsigned_abs());
        if window < Duration::zero() {
            return Err(invalid());
        }
        let threshold = expiry.checked_sub_signed(window).ok_or_else(invalid)?;
        let verdict = if now >= threshold {
            Verdict::NearingExpiry
        } else {
            Verdict::SufficientTime
        };

        Ok(Self {
            domain: domain.into(),
            expiry,
            threshold,
            checked_at: now,
            window_hours: window.num_hours(),
            expiring_soon: verdict == Verdict::NearingExpiry,
            verdict,
        })
    }

    pub fn from_fields(
        domain: impl Into<String>,
        fields: &WhoisFields,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Self, ExpiryError> {
        let expiry = parse_expiry(registry_expiry_date(fields)?)?;
        Self::evaluate(domain, expiry, now, window)
    }
}

/// First "Registry Expiry Date" value in a parsed response.
pub fn registry_expiry_date(fields: &WhoisFields) -> Result<&str, ExpiryError> {
    fields
        .get(REGISTRY_EXPIRY_FIELD)
        .and_then(|values| values.first())
        .map(String::as_str)
        .ok_or_else(|| ExpiryError::MissingField(REGISTRY_EXPIRY_FIELD.to_string()))
}

/// Parse an RFC 3339 timestamp such as `2025-08-13T04:00:00Z`.
pub fn parse_expiry(value: &str) -> Result<DateTime<Utc>, ExpiryError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| ExpiryError::DateParseFailed {
            value: value.to_string(),
            source,
        })
}
