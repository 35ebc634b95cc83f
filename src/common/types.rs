use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Scan type
//------------------------------------------------------------------------------

/// Semantic category of a piece of decoded text.
///
/// `Generated` never comes out of the classifier. It tags history entries created
/// by the QR generation flow.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanType {
    Url,
    Email,
    Phone,
    Text,
    Generated,
}

impl ScanType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "URL",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Text => "TEXT",
            Self::Generated => "GENERATED",
        }
    }
}

impl Display for ScanType {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "URL" => Ok(Self::Url),
            "EMAIL" => Ok(Self::Email),
            "PHONE" => Ok(Self::Phone),
            "TEXT" => Ok(Self::Text),
            "GENERATED" => Ok(Self::Generated),
            other => Err(format!("unknown scan type: {other}")),
        }
    }
}

// Raw scan event
//------------------------------------------------------------------------------

/// One decode result, produced per detected code per frame or per gallery image.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RawScanEvent {
    pub value: String,
    pub timestamp_ms: i64,
}

impl RawScanEvent {
    pub fn new(value: impl Into<String>, timestamp_ms: i64) -> Self {
        Self { value: value.into(), timestamp_ms }
    }

    pub fn now(value: impl Into<String>) -> Self {
        Self::new(value, now_ms())
    }
}

/// Wall clock in milliseconds since the unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod types_tests {
    use test_case::test_case;

    use super::ScanType;

    #[test_case(ScanType::Url, "URL")]
    #[test_case(ScanType::Email, "EMAIL")]
    #[test_case(ScanType::Phone, "PHONE")]
    #[test_case(ScanType::Text, "TEXT")]
    #[test_case(ScanType::Generated, "GENERATED")]
    fn test_scan_type_names(kind: ScanType, name: &str) {
        assert_eq!(kind.to_string(), name);
        assert_eq!(name.parse::<ScanType>().unwrap(), kind);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{name}\""));
    }

    #[test]
    fn test_scan_type_parse_is_case_insensitive() {
        assert_eq!("url".parse::<ScanType>(), Ok(ScanType::Url));
        assert!("BARCODE".parse::<ScanType>().is_err());
    }
}
