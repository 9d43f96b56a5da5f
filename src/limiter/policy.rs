//! Rate-Limit Policy Module
//!
//! The fixed category table: window size, request ceiling and optional
//! block duration per category.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// == Category ==
/// Kind of traffic a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Unauthenticated traffic
    Public,
    Authenticated,
    /// Payments, transfers, escrow
    Financial,
    /// Login, OTP and password attempts
    Auth,
    Search,
    Upload,
    /// Outbound SMS / email / push
    Notification,
    /// Inbound provider callbacks
    Webhook,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Public,
        Category::Authenticated,
        Category::Financial,
        Category::Auth,
        Category::Search,
        Category::Upload,
        Category::Notification,
        Category::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Public => "public",
            Category::Authenticated => "authenticated",
            Category::Financial => "financial",
            Category::Auth => "auth",
            Category::Search => "search",
            Category::Upload => "upload",
            Category::Notification => "notification",
            Category::Webhook => "webhook",
        }
    }

    // == Default Policy ==
    pub fn default_policy(&self) -> Policy {
        const SECOND: u64 = 1_000;
        const MINUTE: u64 = 60 * SECOND;
        const HOUR: u64 = 60 * MINUTE;

        match self {
            Category::Public => Policy::blocking(MINUTE, 100, 5 * MINUTE),
            Category::Authenticated => Policy::new(MINUTE, 1000),
            Category::Financial => Policy::blocking(MINUTE, 10, 15 * MINUTE),
            Category::Auth => Policy::blocking(15 * MINUTE, 5, HOUR),
            Category::Search => Policy::new(MINUTE, 60),
            Category::Upload => Policy::new(HOUR, 50),
            Category::Notification => Policy::new(MINUTE, 20),
            Category::Webhook => Policy::new(500, 100),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rate-limit category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

// == Policy ==
/// Limits for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub window_ms: u64,
    pub max_requests: u32,
    /// Penalty once the ceiling is exceeded; `None` never blocks.
    pub block_duration_ms: Option<u64>,
}

impl Policy {
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
            block_duration_ms: None,
        }
    }

    pub const fn blocking(window_ms: u64, max_requests: u32, block_duration_ms: u64) -> Self {
        Self {
            window_ms,
            max_requests,
            block_duration_ms: Some(block_duration_ms),
        }
    }
}

// == Policy Table ==
/// Category table fixed at limiter construction.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<Category, Policy>,
}

impl PolicyTable {
    /// Table with `overrides` applied on top of the default policies.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (Category, Policy)>) -> Self {
        let mut table = Self::default();
        table.policies.extend(overrides);
        table
    }

    pub fn get(&self, category: Category) -> Policy {
        self.policies
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_policy())
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            policies: Category::ALL
                .into_iter()
                .map(|category| (category, category.default_policy()))
                .collect(),
        }
    }
}
