//! Error types for container operations.
//!
//! Every failure names the slot involved and, where the caller can fix it,
//! carries a recovery suggestion.

use tether_support::rendering::render_path;

use crate::key::TypeKey;

/// Boxed error returned by factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a factory returns. `?` works on both domain errors and nested
/// container errors; nested [`ContainerError`]s are propagated unchanged.
pub type FactoryResult<T> = std::result::Result<T, BoxError>;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// No registration exists for the requested slot.
    #[error("Dependency not registered: {key}{}", render_suggestions(.suggestions))]
    DependencyNotRegistered {
        key: TypeKey,
        /// Registered slots that look like a typo of `key`.
        suggestions: Vec<String>,
    },

    /// Resolution re-entered a slot that is already under construction.
    #[error("Circular dependency detected while resolving {key}. Resolution path: {}", render_keys(.path))]
    CircularDependency {
        key: TypeKey,
        /// From the root resolution to the repeated key, inclusive.
        path: Vec<TypeKey>,
    },

    /// No container is current in the scoped registry.
    #[error("Dependency container is no longer available: it was never set or has been cleared")]
    ContainerUnavailable,

    /// A named scope was looked up but never set, or already removed.
    #[error("Scope not found: {id}{}", render_scopes(.available_scopes))]
    ScopeNotFound {
        id: String,
        available_scopes: Vec<String>,
    },

    /// The produced value does not have the requested static type.
    #[error("Type cast failed for {key}. Expected: {expected}, Actual: {actual}")]
    TypeCastFailed {
        key: TypeKey,
        expected: &'static str,
        actual: &'static str,
    },

    /// The registered factory returned an error.
    #[error("Factory for {key} failed: {source}")]
    FactoryFailed {
        key: TypeKey,
        #[source]
        source: BoxError,
    },

    /// Weak retention was requested for a product that is not reference counted.
    #[error("Weak retention is not supported for {key}: only Arc products can be held weakly")]
    WeakUnsupported { key: TypeKey },
}

/// Underlying cause when a synchronous resolution cannot proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyncResolutionError {
    #[error("the registered factory is asynchronous; use the async resolve instead")]
    AsyncFactory,
    #[error("the singleton is being constructed by another task")]
    ConstructionInFlight,
}

impl ContainerError {
    /// Wraps a factory error, passing nested container errors through unchanged.
    pub fn from_factory(key: &TypeKey, error: BoxError) -> Self {
        match error.downcast::<ContainerError>() {
            Ok(inner) => *inner,
            Err(source) => Self::FactoryFailed {
                key: key.clone(),
                source,
            },
        }
    }

    /// Human-readable description, identical to `Display`.
    pub fn error_description(&self) -> String {
        self.to_string()
    }

    /// Actionable advice for user errors; `None` for everything else.
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::DependencyNotRegistered { key, .. } => Some(format!(
                "register {key} with `register::<{}>()` before resolving it",
                key.type_name()
            )),
            Self::TypeCastFailed { .. } => Some(
                "make sure the registered type matches the type being resolved".to_string(),
            ),
            Self::WeakUnsupported { .. } => Some(
                "use singleton or transient retention for value types, or wrap the product in Arc"
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Errors the caller can fix by changing their registrations.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::DependencyNotRegistered { .. }
                | Self::TypeCastFailed { .. }
                | Self::WeakUnsupported { .. }
        )
    }

    /// Errors caused by the environment rather than the registrations.
    pub fn is_system_error(&self) -> bool {
        matches!(self, Self::ContainerUnavailable)
    }

    /// The slot this error is about, if any.
    pub fn key(&self) -> Option<&TypeKey> {
        match self {
            Self::DependencyNotRegistered { key, .. }
            | Self::CircularDependency { key, .. }
            | Self::TypeCastFailed { key, .. }
            | Self::FactoryFailed { key, .. }
            | Self::WeakUnsupported { key } => Some(key),
            Self::ContainerUnavailable | Self::ScopeNotFound { .. } => None,
        }
    }
}

fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    format!(". Suggestions: {}", suggestions.join(", "))
}

fn render_keys(path: &[TypeKey]) -> String {
    let names: Vec<String> = path.iter().map(TypeKey::short_name).collect();
    render_path(&names)
}

fn render_scopes(scopes: &[String]) -> String {
    if scopes.is_empty() {
        return ". Available scopes: none".to_string();
    }
    format!(". Available scopes: {}", scopes.join(", "))
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
