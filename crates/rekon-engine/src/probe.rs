//! Identifying attributes of a live handle.
//!
//! Each (domain, attribute) pair has an ordered list of engine property
//! names. The first non-empty value wins; a missing property is a normal
//! outcome and just moves on to the next name.

use crate::engine::{Engine, ObjectHandle};
use rekon_common::DomainName;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Caption,
    Name,
    Text,
    Id,
}

impl Attribute {
    /// Tried last for every domain.
    fn shared(&self) -> &'static str {
        match self {
            Attribute::Caption => "caption",
            Attribute::Name => "name",
            Attribute::Text => "text",
            Attribute::Id => "id",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shared())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "caption" => Ok(Attribute::Caption),
            "name" => Ok(Attribute::Name),
            "text" => Ok(Attribute::Text),
            "id" => Ok(Attribute::Id),
            other => Err(format!("unknown attribute: {}", other)),
        }
    }
}

/// Ordered property names for one attribute in one domain.
pub fn strategies(domain: Option<DomainName>, attribute: Attribute) -> &'static [&'static str] {
    use Attribute::*;
    use DomainName::*;

    let Some(domain) = domain else {
        return &[];
    };
    match (domain, attribute) {
        (Java, Caption) => &["title", "text", "label"],
        (Java, Name) => &["name", "accessibleContext.accessibleName"],
        (Java, Text) => &["text", "value"],

        (Html | Dojo | Sap, Caption) => &["Title", "document.title", "title", "url"],
        (Html | Dojo | Sap, Name) => &["name"],
        (Html | Dojo | Sap, Text) => &["innerText", "value", ".text"],
        (Html | Dojo | Sap, Id) => &["id", ".id"],

        (Net, Caption) => &["Text", "Title"],
        (Net, Name) => &["Name", "AccessibleName"],
        (Net, Text) => &["Text"],
        (Net, Id) => &["Name"],

        (Wpf, Caption) => &["Title", "Header"],
        (Wpf, Name) => &["Name", "AutomationProperties.Name"],
        (Wpf, Text) => &["Text", "Content"],
        (Wpf, Id) => &["AutomationId", "Uid"],

        (Win, Caption) => &["Caption", "WindowText"],
        (Win, Name) => &["Name"],
        (Win, Text) => &["Text", "WindowText"],
        (Win, Id) => &["ControlId"],

        (Swt, Caption) => &["text"],
        (Swt, Name) => &["data"],
        (Swt, Text) => &["text"],

        (Flex, Caption) => &["title", "label"],
        (Flex, Name) => &["name", "automationName"],
        (Flex, Text) => &["text", "label"],
        (Flex, Id) => &["id"],

        (ActiveX, Caption) => &["Caption"],
        (ActiveX, Name) => &["Name"],
        (ActiveX, Text) => &["Text", "Value"],

        _ => &[],
    }
}

/// Read one property, folding "absent" and engine failures into `None`.
pub async fn read_property<E: Engine + ?Sized>(
    engine: &E,
    handle: &ObjectHandle,
    name: &str,
) -> Option<String> {
    match engine.property(handle, name).await {
        Ok(value) => value,
        Err(e) => {
            debug!(id = handle.id, property = name, error = %e, "property unavailable");
            None
        }
    }
}

/// Domain of a handle: its tag, else asked from the engine.
pub async fn domain_of<E: Engine + ?Sized>(engine: &E, handle: &ObjectHandle) -> Option<DomainName> {
    if handle.domain.is_some() {
        return handle.domain;
    }
    engine.domain_of(handle).await.ok().flatten()
}

/// First non-empty value for `attribute`, or an empty string.
pub async fn probe<E: Engine + ?Sized>(
    engine: &E,
    handle: &ObjectHandle,
    attribute: Attribute,
) -> String {
    let domain = domain_of(engine, handle).await;
    let shared = attribute.shared();
    let names = strategies(domain, attribute)
        .iter()
        .copied()
        .chain(std::iter::once(shared));

    for name in names {
        if let Some(value) = read_property(engine, handle, name).await {
            if !value.is_empty() {
                return value;
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_caption_falls_back_to_url() {
        let names = strategies(Some(DomainName::Html), Attribute::Caption);
        let title = names.iter().position(|n| *n == "title").unwrap();
        let url = names.iter().position(|n| *n == "url").unwrap();
        assert!(title < url);
        assert_eq!(names[0], "Title");
    }

    #[test]
    fn unknown_domain_has_no_specific_strategy() {
        assert!(strategies(None, Attribute::Text).is_empty());
    }

    #[test]
    fn attribute_parsing() {
        assert_eq!("Caption".parse::<Attribute>().unwrap(), Attribute::Caption);
        assert!("colour".parse::<Attribute>().is_err());
    }
}
