//! Gulf-region regulatory jurisdictions a disclaimer can target

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Jurisdictions with their own disclaimer checklist.
///
/// Disclaimers addressed to everyone carry no jurisdiction; they are
/// rendered as "General" in user-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Jurisdiction {
    #[serde(rename = "UAE", alias = "uae")]
    Uae,
    #[serde(rename = "DIFC", alias = "difc")]
    Difc,
    #[serde(rename = "KSA", alias = "ksa")]
    Ksa,
    #[serde(alias = "kuwait")]
    Kuwait,
    #[serde(alias = "oman")]
    Oman,
    #[serde(alias = "qatar")]
    Qatar,
}

/// Label used for disclaimers without a specific jurisdiction.
pub const GENERAL_LABEL: &str = "General";

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 6] = [
        Jurisdiction::Uae,
        Jurisdiction::Difc,
        Jurisdiction::Ksa,
        Jurisdiction::Kuwait,
        Jurisdiction::Oman,
        Jurisdiction::Qatar,
    ];

    /// Short code as it appears in comments ("UAE", "KSA", ...)
    pub fn code(&self) -> &'static str {
        match self {
            Jurisdiction::Uae => "UAE",
            Jurisdiction::Difc => "DIFC",
            Jurisdiction::Ksa => "KSA",
            Jurisdiction::Kuwait => "Kuwait",
            Jurisdiction::Oman => "Oman",
            Jurisdiction::Qatar => "Qatar",
        }
    }

    /// Full name
    pub fn name(&self) -> &'static str {
        match self {
            Jurisdiction::Uae => "United Arab Emirates",
            Jurisdiction::Difc => "Dubai International Financial Centre",
            Jurisdiction::Ksa => "Kingdom of Saudi Arabia",
            Jurisdiction::Kuwait => "State of Kuwait",
            Jurisdiction::Oman => "Sultanate of Oman",
            Jurisdiction::Qatar => "State of Qatar",
        }
    }

    /// Lenient match of a free-form jurisdiction name.
    ///
    /// Returns `None` for general/unknown names, which callers treat as
    /// a disclaimer addressed to every reader.
    pub fn match_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        if lower.is_empty() || matches!(lower.as_str(), "general" | "unknown" | "all" | "common") {
            return None;
        }

        for j in Self::ALL {
            if lower == j.code().to_lowercase() || lower == j.name().to_lowercase() {
                return Some(j);
            }
        }

        // DIFC before UAE: "DIFC (Dubai, UAE)" should land on DIFC
        if lower.contains("difc") || lower.contains("dubai international financial") {
            Some(Jurisdiction::Difc)
        } else if lower.contains("uae") || lower.contains("united arab emirates") || lower.contains("emirates") {
            Some(Jurisdiction::Uae)
        } else if lower.contains("ksa") || lower.contains("saudi") {
            Some(Jurisdiction::Ksa)
        } else if lower.contains("kuwait") {
            Some(Jurisdiction::Kuwait)
        } else if lower.contains("oman") {
            Some(Jurisdiction::Oman)
        } else if lower.contains("qatar") {
            Some(Jurisdiction::Qatar)
        } else {
            None
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown jurisdiction: {0}")]
pub struct UnknownJurisdiction(pub String);

impl FromStr for Jurisdiction {
    type Err = UnknownJurisdiction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::match_name(s).ok_or_else(|| UnknownJurisdiction(s.to_string()))
    }
}
