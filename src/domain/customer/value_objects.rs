use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Value Objects
// ============================================================================

static EMAIL_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+"));

/// Customer email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(pub String);

impl Email {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Loose `something@domain.tld` shape check
    pub fn is_valid(&self) -> bool {
        EMAIL_PATTERN
            .as_ref()
            .map(|re| re.is_match(&self.0))
            .unwrap_or(false)
    }
}

/// Customer phone number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber(pub String);

impl PhoneNumber {
    pub fn new(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
