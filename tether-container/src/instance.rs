//! Type-erased instances and weak handles.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{ContainerError, Result};
use crate::key::TypeKey;

/// A produced value with its concrete type erased.
///
/// Cloning an `Instance` shares the stored value; typed access clones the
/// product out of it, so services are usually registered as `Arc<T>`.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the concrete type stored inside.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Clones the product out as `T`, or fails with
    /// [`ContainerError::TypeCastFailed`] for `key`.
    pub fn cast<T: Clone + 'static>(&self, key: &TypeKey) -> Result<T> {
        self.value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ContainerError::TypeCastFailed {
                key: key.clone(),
                expected: type_name::<T>(),
                actual: self.type_name,
            })
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

trait ErasedWeak: Send + Sync {
    fn upgrade(&self) -> Option<Instance>;
    fn is_alive(&self) -> bool;
}

struct ArcWeak<U: ?Sized>(Weak<U>);

impl<U: ?Sized + Send + Sync + 'static> ErasedWeak for ArcWeak<U> {
    fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance::new::<Arc<U>>)
    }

    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// A non-owning handle to an `Arc` product.
///
/// Holding it never keeps the product alive.
#[derive(Clone)]
pub struct WeakInstance {
    inner: Arc<dyn ErasedWeak>,
}

impl WeakInstance {
    pub fn new<U: ?Sized + Send + Sync + 'static>(product: &Arc<U>) -> Self {
        Self {
            inner: Arc::new(ArcWeak(Arc::downgrade(product))),
        }
    }

    /// Returns a strong instance if the product is still alive.
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakInstance")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Builds a weak handle from an erased instance holding `Arc<U>`.
/// Fails with the name of `Arc<U>` when the instance holds something else.
pub(crate) fn downgrade_arc<U: ?Sized + Send + Sync + 'static>(
    instance: &Instance,
) -> std::result::Result<WeakInstance, &'static str> {
    instance
        .downcast_ref::<Arc<U>>()
        .map(WeakInstance::new)
        .ok_or(type_name::<Arc<U>>())
}
