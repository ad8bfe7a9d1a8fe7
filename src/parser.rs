use crate::config::DEFAULT_MIN_RESPONSE_LINES;
use crate::errors::ExpiryError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Field name to every value seen for it, in encounter order.
pub type WhoisFields = BTreeMap<String, Vec<String>>;

// Comment and referral marker lines: "# ...", "% ...", ">>> ... <<<"
static MARKER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[#%>]+").unwrap());

const FIELD_DELIMITER: &str = ": ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Marker,
    Data,
}

pub struct WhoisParser {
    min_lines: usize,
}

impl Default for WhoisParser {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisParser {
    pub fn new() -> Self {
        Self::with_min_lines(DEFAULT_MIN_RESPONSE_LINES)
    }

    pub fn with_min_lines(min_lines: usize) -> Self {
        Self { min_lines }
    }

    /// Validate and tokenize a raw whois response.
    pub fn parse(&self, raw: &[u8]) -> Result<WhoisFields, ExpiryError> {
        let text = String::from_utf8_lossy(raw);
        self.validate(&text)?;

        let mut fields = WhoisFields::new();
        for line in text.split('\n') {
            if Self::classify_line(line) == LineKind::Marker {
                continue;
            }
            if let Some((key, value)) = Self::split_field(line) {
                fields.entry(key).or_default().push(value);
            }
        }

        debug!("Parsed {} distinct fields", fields.len());
        Ok(fields)
    }

    /// Some failures look like a working response, e.g. a host that is not a
    /// registrable domain:
    ///
    /// ```text
    /// Domain: 1.f.ix.de
    /// Status: invalid
    /// ```
    ///
    /// A genuine record has at least `min_lines` lines.
    pub fn validate(&self, text: &str) -> Result<(), ExpiryError> {
        let lines = text.split('\n').count();
        if lines < self.min_lines {
            debug!("Rejecting response with {} lines", lines);
            return Err(ExpiryError::InvalidResponse { lines, min: self.min_lines });
        }
        Ok(())
    }

    pub fn classify_line(line: &str) -> LineKind {
        if MARKER_PREFIX.is_match(line) {
            LineKind::Marker
        } else {
            LineKind::Data
        }
    }

    /// Split a data line into a trimmed key and value. Lines with no
    /// delimiter, or with more than one, are skipped.
    pub fn split_field(line: &str) -> Option<(String, String)> {
        let mut parts = line.split(FIELD_DELIMITER);
        let key = parts.next()?;
        let value = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some((key.trim().to_string(), value.trim().to_string()))
    }
}
