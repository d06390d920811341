//! Registration slot identity.
//!
//! A [`TypeKey`] names one "(product type, optional name)" slot. It is the
//! identity used by the registry, both instance caches and the metrics
//! buckets.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tether_support::rendering::shorten_type_name;

/// Identifies a registration slot in a [`Container`](crate::container::Container).
///
/// Two keys are equal when both the product type and the name match. An
/// unnamed key and a key named `""` are different slots.
///
/// # Examples
/// ```
/// use tether_container::key::TypeKey;
///
/// let unnamed = TypeKey::of::<String>();
/// let named = TypeKey::named::<String>("api_base_url");
/// assert_ne!(unnamed, named);
/// assert_eq!(named.name(), Some("api_base_url"));
/// ```
#[derive(Clone)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<Arc<str>>,
}

impl TypeKey {
    /// Creates the unnamed key for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new::<T>(None)
    }

    /// Creates a named key for `T`.
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: Some(name.into()),
        }
    }

    /// Creates a key for `T` with an optional name.
    #[inline]
    pub fn new<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: name.map(Arc::from),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified product type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns `true` if this key's product type is `T`.
    #[inline]
    pub fn represents<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Short form used in error messages and reports, e.g. `ApiClient[sandbox]`.
    pub fn short_name(&self) -> String {
        let short = shorten_type_name(self.type_name);
        match &self.name {
            Some(name) => format!("{short}[{name}]"),
            None => short,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "TypeKey({}, name={:?})", self.type_name, name),
            None => write!(f, "TypeKey({})", self.type_name),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

impl Serialize for TypeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct PaymentSettings;

    #[test]
    fn key_of_type() {
        let key = TypeKey::of::<PaymentSettings>();
        assert!(key.type_name().contains("PaymentSettings"));
        assert_eq!(key.name(), None);
        assert!(key.represents::<PaymentSettings>());
        assert!(!key.represents::<String>());
    }

    #[test]
    fn different_types_differ() {
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<i32>());
        assert_ne!(TypeKey::named::<String>("x"), TypeKey::named::<i32>("x"));
    }

    #[test]
    fn unnamed_and_empty_name_differ() {
        assert_ne!(TypeKey::of::<String>(), TypeKey::named::<String>(""));
        assert_eq!(TypeKey::new::<String>(None), TypeKey::of::<String>());
        assert_eq!(TypeKey::new::<String>(Some("a")), TypeKey::named::<String>("a"));
    }

    #[test]
    fn keys_work_in_hashmap() {
        let mut map = HashMap::new();
        map.insert(TypeKey::of::<String>(), "plain");
        map.insert(TypeKey::named::<String>(String::from("sandbox")), "sandbox");
        assert_eq!(map.get(&TypeKey::named::<String>("sandbox")), Some(&"sandbox"));
        assert_eq!(map.get(&TypeKey::of::<String>()), Some(&"plain"));
        assert_eq!(map.get(&TypeKey::of::<bool>()), None);
    }

    #[test]
    fn display_is_short() {
        assert_eq!(TypeKey::of::<PaymentSettings>().to_string(), "PaymentSettings");
        assert_eq!(
            TypeKey::named::<Arc<String>>("live").to_string(),
            "Arc<String>[live]"
        );
    }

    #[test]
    fn unsized_keys() {
        trait Gateway {}
        let key = TypeKey::of::<dyn Gateway>();
        assert!(key.type_name().contains("Gateway"));
    }

    #[test]
    fn serializes_as_display() {
        let json = serde_json::to_string(&TypeKey::named::<PaymentSettings>("eu")).unwrap();
        assert_eq!(json, "\"PaymentSettings[eu]\"");
    }
}
