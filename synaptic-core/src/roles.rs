//! Role/organization affiliations extracted from free text
//!
//! Recognizes the two structural forms extraction tends to produce:
//! - "CTO at Willow Education"
//! - "Director of Academics, Caliber Schools"
//!
//! A trailing parenthetical ("(2019-2021)", "(remote)") is ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::Entity;

/// Which structural form matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleForm {
    /// "<Role> at <Organization>"
    At,
    /// "<Role>, <Organization>"
    Comma,
}

impl RoleForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleForm::At => "role_at_organization",
            RoleForm::Comma => "role_comma_organization",
        }
    }
}

/// A role held at a named organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAffiliation {
    pub role: String,
    pub organization: String,
    pub form: RoleForm,
}

static ROLE_AT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<role>.+?)\s+at\s+(?P<org>[^()]+?)\s*(?:\(.*)?$").unwrap()
});

static ROLE_COMMA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<role>[^,]+?)\s*,\s*(?P<org>[^()]+?)\s*(?:\(.*)?$").unwrap()
});

/// Parse one role text; the "at" form takes precedence over the comma form
pub fn parse_role_affiliation(text: &str) -> Option<RoleAffiliation> {
    for (regex, form) in [(&*ROLE_AT_REGEX, RoleForm::At), (&*ROLE_COMMA_REGEX, RoleForm::Comma)] {
        if let Some(caps) = regex.captures(text) {
            let role = caps["role"].trim();
            let organization = caps["org"].trim();
            if !role.is_empty() && !organization.is_empty() {
                return Some(RoleAffiliation {
                    role: role.to_string(),
                    organization: organization.to_string(),
                    form,
                });
            }
        }
    }
    None
}

/// Case-insensitive containment in either direction
pub fn organization_matches(name_in_text: &str, organization_title: &str) -> bool {
    let a = name_in_text.trim().to_lowercase();
    let b = organization_title.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Role texts carried by an entity
///
/// Person entities keep them in metadata (`role`, `title`, `roles`), with
/// several roles separated by `;` or newlines. Role entities use their title.
pub fn role_texts(entity: &Entity) -> Vec<String> {
    let mut texts = Vec::new();

    if entity.is_type(crate::entity_types::ROLE) {
        texts.push(entity.title.clone());
    }

    for key in ["role", "title"] {
        if let Some(raw) = entity.metadata_str(key) {
            texts.extend(split_roles(raw));
        }
    }

    if let Some(Value::Array(items)) = entity.metadata.get("roles") {
        for item in items {
            if let Some(raw) = item.as_str() {
                texts.extend(split_roles(raw));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    texts.retain(|t| seen.insert(t.to_lowercase()));
    texts
}

fn split_roles(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split([';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
