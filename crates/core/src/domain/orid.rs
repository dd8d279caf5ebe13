//! ORID - tenant- and type-scoped resource identifier
//!
//! Encoding (version 1):
//!
//! ```text
//! orid:1:<provider>:<custom1>:<custom2>:<account>:<service>:<resource_id>[/<rider>]
//! ```
//!
//! The account id occupies the third custom slot. A rider (e.g. a message id
//! appended to a queue address) may be joined with `/` or `:` when parsing;
//! encoding always emits `/`.

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "orid";
const CURRENT_VERSION: u32 = 1;
const DELIMITER: char = ':';
const RIDER_DELIMITER: char = '/';

/// Number of `:` separated segments before an optional rider
const SEGMENT_COUNT: usize = 8;

/// Parsed identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Orid {
    pub version: u32,
    pub provider: String,
    pub custom1: String,
    pub custom2: String,
    pub account_id: String,
    pub service: String,
    pub resource_id: String,
    pub resource_rider: Option<String>,
}

impl Orid {
    /// Build a version 1 identifier from its parts
    pub fn generate(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource_id: impl Into<String>,
        account_id: impl Into<String>,
        resource_rider: Option<String>,
    ) -> Result<Self> {
        let orid = Self {
            version: CURRENT_VERSION,
            provider: provider.into(),
            custom1: String::new(),
            custom2: String::new(),
            account_id: account_id.into(),
            service: service.into(),
            resource_id: resource_id.into(),
            resource_rider,
        };
        orid.validate()?;
        Ok(orid)
    }

    /// Parse the textual form
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| DomainError::InvalidIdentifier(format!("{text}: {reason}"));

        let mut parts: Vec<&str> = text.splitn(SEGMENT_COUNT + 1, DELIMITER).collect();
        if parts.len() < SEGMENT_COUNT {
            return Err(invalid("too few segments"));
        }

        // A ':' joined rider shows up as a ninth segment
        let mut resource_rider = if parts.len() > SEGMENT_COUNT {
            parts.pop().map(str::to_string)
        } else {
            None
        };

        if parts[0] != PREFIX {
            return Err(invalid("missing orid prefix"));
        }
        let version: u32 = parts[1].parse().map_err(|_| invalid("bad version"))?;

        let mut resource_id = parts[7].to_string();
        if let Some((id, rider)) = parts[7].split_once(RIDER_DELIMITER) {
            if resource_rider.is_some() {
                return Err(invalid("ambiguous rider"));
            }
            resource_id = id.to_string();
            resource_rider = Some(rider.to_string());
        }

        let orid = Self {
            version,
            provider: parts[2].to_string(),
            custom1: parts[3].to_string(),
            custom2: parts[4].to_string(),
            account_id: parts[5].to_string(),
            service: parts[6].to_string(),
            resource_id,
            resource_rider,
        };
        orid.validate()?;
        Ok(orid)
    }

    /// True when `text` parses as an identifier
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    /// Same identifier with a rider attached
    pub fn with_rider(&self, rider: impl Into<String>) -> Result<Self> {
        let orid = Self {
            resource_rider: Some(rider.into()),
            ..self.clone()
        };
        orid.validate()?;
        Ok(orid)
    }

    /// Same identifier without its rider
    pub fn without_rider(&self) -> Self {
        Self {
            resource_rider: None,
            ..self.clone()
        }
    }

    fn validate(&self) -> Result<()> {
        let reject = |reason: String| Err(DomainError::InvalidIdentifier(reason));

        if self.version != CURRENT_VERSION {
            return reject(format!("unsupported version {}", self.version));
        }
        for (name, value) in [
            ("provider", &self.provider),
            ("service", &self.service),
            ("resource id", &self.resource_id),
        ] {
            if value.is_empty() {
                return reject(format!("{name} must not be empty"));
            }
        }

        for (name, value) in [
            ("provider", &self.provider),
            ("custom1", &self.custom1),
            ("custom2", &self.custom2),
            ("account", &self.account_id),
            ("service", &self.service),
            ("resource id", &self.resource_id),
        ] {
            if !is_segment(value) {
                return reject(format!("{name} contains invalid characters"));
            }
        }

        match &self.resource_rider {
            Some(rider) if rider.is_empty() || !is_segment(rider) => {
                reject("rider contains invalid characters".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Segment alphabet. `:`, `/` and `_` never appear inside a segment.
fn is_segment(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

impl fmt::Display for Orid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}:{}:{}:{}:{}:{}:{}:{}",
            self.version,
            self.provider,
            self.custom1,
            self.custom2,
            self.account_id,
            self.service,
            self.resource_id
        )?;
        if let Some(rider) = &self.resource_rider {
            write!(f, "{RIDER_DELIMITER}{rider}")?;
        }
        Ok(())
    }
}

impl FromStr for Orid {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Orid {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Orid> for String {
    fn from(value: Orid) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_encode() {
        let orid = Orid::generate("testIssuer", "qs", "testQueue", "1000", None).unwrap();
        assert_eq!(orid.to_string(), "orid:1:testIssuer:::1000:qs:testQueue");
        assert_eq!(orid.account_id, "1000");
        assert_eq!(orid.resource_id, "testQueue");
    }

    #[test]
    fn test_generate_rejects_empty_resource_id() {
        let err = Orid::generate("orid", "qs", "", "1000", None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_generate_rejects_delimiters_in_segments() {
        assert!(Orid::generate("orid", "qs", "a:b", "1000", None).is_err());
        assert!(Orid::generate("orid", "qs", "a/b", "1000", None).is_err());
        assert!(Orid::generate("orid", "qs", "a_b", "1000", None).is_err());
    }

    #[test]
    fn test_parse_round_trip_with_rider() {
        let orid = Orid::generate(
            "orid",
            "qs",
            "my-queue",
            "42",
            Some("0a1b2c".to_string()),
        )
        .unwrap();
        let text = orid.to_string();
        assert_eq!(text, "orid:1:orid:::42:qs:my-queue/0a1b2c");
        assert_eq!(Orid::parse(&text).unwrap(), orid);
    }

    #[test]
    fn test_parse_colon_rider() {
        let orid = Orid::parse("orid:1:orid:::42:qs:my-queue:msg-1").unwrap();
        assert_eq!(orid.resource_id, "my-queue");
        assert_eq!(orid.resource_rider.as_deref(), Some("msg-1"));
        assert_eq!(orid.to_string(), "orid:1:orid:::42:qs:my-queue/msg-1");
    }

    #[test]
    fn test_parse_keeps_custom_segments() {
        let orid = Orid::parse("orid:1:p:c1:c2:acct:sf:fn").unwrap();
        assert_eq!(orid.custom1, "c1");
        assert_eq!(orid.custom2, "c2");
        assert_eq!(orid.to_string(), "orid:1:p:c1:c2:acct:sf:fn");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for text in [
            "",
            "not-an-orid",
            "orid:1:p:::acct:qs",
            "urn:1:p:::acct:qs:name",
            "orid:x:p:::acct:qs:name",
            "orid:2:p:::acct:qs:name",
            "orid:1::::acct:qs:name",
            "orid:1:p:::acct::name",
            "orid:1:p:::acct:qs:",
            "orid:1:p:::acct:qs:name/",
            "orid:1:p:::acct:qs:name/a:b",
        ] {
            assert!(!Orid::is_valid(text), "{text} should be invalid");
        }
    }

    #[test]
    fn test_equality_by_value() {
        let a = Orid::parse("orid:1:orid:::1:sm:machine").unwrap();
        let b = Orid::generate("orid", "sm", "machine", "1", None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, b.with_rider("x").unwrap());
        assert_eq!(a, b.with_rider("x").unwrap().without_rider());
    }

    #[test]
    fn test_serde_as_string() {
        let orid = Orid::parse("orid:1:orid:::1:qs:q").unwrap();
        let json = serde_json::to_string(&orid).unwrap();
        assert_eq!(json, "\"orid:1:orid:::1:qs:q\"");
        let back: Orid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, orid);
        assert!(serde_json::from_str::<Orid>("\"bogus\"").is_err());
    }
}
