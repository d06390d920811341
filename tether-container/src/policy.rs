//! Retention policies.
//!
//! A policy decides what the container keeps after a factory runs:
//! - [`RetentionPolicy::Singleton`]: the instance, strongly, until reset
//! - [`RetentionPolicy::Transient`]: nothing
//! - [`RetentionPolicy::Weak`]: a non-owning reference, live only while
//!   someone outside the container still holds the instance

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a registration's instances are retained by the container.
///
/// # Examples
/// ```
/// use tether_container::policy::RetentionPolicy;
///
/// assert!(RetentionPolicy::Singleton.is_cached());
/// assert!(!RetentionPolicy::Transient.is_cached());
/// assert_eq!(RetentionPolicy::default(), RetentionPolicy::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// One instance per container, built on first resolution.
    ///
    /// Concurrent first resolutions share a single factory call.
    Singleton,

    /// A fresh instance on every resolution. Never cached.
    #[default]
    Transient,

    /// A non-owning reference that is re-checked on every resolution.
    ///
    /// Only reference-counted products (`Arc<U>`) can be weakly retained.
    Weak,
}

impl RetentionPolicy {
    /// Returns `true` if resolutions may be served from a cache.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Self::Transient)
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "Singleton"),
            Self::Transient => write!(f, "Transient"),
            Self::Weak => write!(f, "Weak"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caching() {
        assert!(RetentionPolicy::Singleton.is_cached());
        assert!(RetentionPolicy::Weak.is_cached());
        assert!(!RetentionPolicy::Transient.is_cached());
    }

    #[test]
    fn display() {
        assert_eq!(RetentionPolicy::Weak.to_string(), "Weak");
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&RetentionPolicy::Singleton).unwrap();
        assert_eq!(json, "\"singleton\"");
        let back: RetentionPolicy = serde_json::from_str("\"weak\"").unwrap();
        assert_eq!(back, RetentionPolicy::Weak);
    }
}
