//! UI technology domains.
//!
//! A domain names the technology stack hosting a candidate element. The
//! automation engine reports one entry per (domain, native identity) pair;
//! the same native window may be reported by a specific domain (e.g. `NET`)
//! and by the generic `WIN` domain at once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DomainName {
    Java,
    Html,
    Dojo,
    Sap,
    Net,
    Wpf,
    Win,
    Swt,
    Flex,
    #[serde(rename = "ACTIVEX")]
    ActiveX,
}

impl DomainName {
    pub const ALL: [DomainName; 10] = [
        DomainName::Java,
        DomainName::Html,
        DomainName::Dojo,
        DomainName::Sap,
        DomainName::Net,
        DomainName::Wpf,
        DomainName::Win,
        DomainName::Swt,
        DomainName::Flex,
        DomainName::ActiveX,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainName::Java => "JAVA",
            DomainName::Html => "HTML",
            DomainName::Dojo => "DOJO",
            DomainName::Sap => "SAP",
            DomainName::Net => "NET",
            DomainName::Wpf => "WPF",
            DomainName::Win => "WIN",
            DomainName::Swt => "SWT",
            DomainName::Flex => "FLEX",
            DomainName::ActiveX => "ACTIVEX",
        }
    }

    /// The native OS domain sees every window, including those owned by
    /// more specific technologies.
    pub fn is_generic(&self) -> bool {
        matches!(self, DomainName::Win)
    }

    /// Higher wins when two reports share a native identity.
    pub fn specificity(&self) -> u8 {
        if self.is_generic() { 0 } else { 1 }
    }

    /// Whether a failed window search restricted to this domain is worth
    /// repeating after surfaces are force-activated. Only the HTML, Java
    /// and Flex agents always report their windows.
    pub fn needs_surface_activation(&self) -> bool {
        !matches!(self, DomainName::Html | DomainName::Java | DomainName::Flex)
    }

    /// HTML dialects share one document model.
    pub fn is_html_family(&self) -> bool {
        matches!(self, DomainName::Html | DomainName::Dojo | DomainName::Sap)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for DomainName {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        DomainName::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == upper)
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("net".parse::<DomainName>().unwrap(), DomainName::Net);
        assert_eq!(" ActiveX ".parse::<DomainName>().unwrap(), DomainName::ActiveX);
        assert!("motif".parse::<DomainName>().is_err());
    }

    #[test]
    fn generic_domain_is_least_specific() {
        assert!(DomainName::Win.specificity() < DomainName::Net.specificity());
        assert_eq!(
            DomainName::Java.specificity(),
            DomainName::Html.specificity()
        );
    }

    #[test]
    fn activation_retry_skips_self_reporting_agents() {
        for domain in [DomainName::Html, DomainName::Java, DomainName::Flex] {
            assert!(!domain.needs_surface_activation(), "{}", domain);
        }
        for domain in [
            DomainName::Win,
            DomainName::Net,
            DomainName::Dojo,
            DomainName::Sap,
            DomainName::ActiveX,
        ] {
            assert!(domain.needs_surface_activation(), "{}", domain);
        }
    }

    #[test]
    fn serde_uses_uppercase_names() {
        let json = serde_json::to_string(&DomainName::Wpf).unwrap();
        assert_eq!(json, "\"WPF\"");
        let back: DomainName = serde_json::from_str("\"ACTIVEX\"").unwrap();
        assert_eq!(back, DomainName::ActiveX);
    }
}
