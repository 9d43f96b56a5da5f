//! Key Space Module
//!
//! Stable prefixes that namespace every cache and limiter key, plus the
//! trailing-wildcard patterns used for bulk invalidation.

// == Prefixes ==
pub const USER_PREFIX: &str = "user:";
pub const WALLET_PREFIX: &str = "wallet:";
pub const PRODUCT_PREFIX: &str = "product:";
pub const SEARCH_PREFIX: &str = "search:";
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

pub fn user_key(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

pub fn wallet_key(user_id: &str) -> String {
    format!("{WALLET_PREFIX}{user_id}")
}

pub fn product_key(product_id: &str) -> String {
    format!("{PRODUCT_PREFIX}{product_id}")
}

/// Search keys are built from the trimmed, lowercased query so that
/// "Phone " and "phone" share an entry.
pub fn search_key(query: &str) -> String {
    format!("{SEARCH_PREFIX}{}", query.trim().to_lowercase())
}

pub fn rate_limit_key(category: &str, identifier: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}{category}:{identifier}")
}

// == Key Pattern ==
/// Invalidation pattern. A single trailing `*` matches any suffix; anything
/// else is an exact match (a `*` elsewhere is literal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    Exact(String),
    Prefix(String),
}

impl KeyPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => KeyPattern::Prefix(prefix.to_string()),
            None => KeyPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}
