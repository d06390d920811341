//! Resolution context handed to factories.
//!
//! The path of keys under construction travels with the call chain as an
//! immutable value, so nested resolutions see their ancestors across
//! `.await` points and across tasks.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::capability::Resolver;
use crate::container::Container;
use crate::error::Result;
use crate::instance::Instance;
use crate::key::TypeKey;

struct PathNode {
    key: TypeKey,
    parent: Option<Arc<PathNode>>,
}

/// The keys being constructed on one logical call chain, root first.
///
/// Pushing shares the parent's nodes, so each nested factory gets its own
/// path without copying its ancestors.
#[derive(Clone, Default)]
pub struct ResolutionPath {
    head: Option<Arc<PathNode>>,
    depth: usize,
}

impl ResolutionPath {
    /// The empty path of a resolution that is not nested in another.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    /// The innermost key, i.e. the one currently being built.
    pub fn current(&self) -> Option<&TypeKey> {
        self.head.as_deref().map(|node| &node.key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.iter().any(|candidate| candidate == key)
    }

    #[must_use]
    pub fn push(&self, key: TypeKey) -> Self {
        Self {
            head: Some(Arc::new(PathNode {
                key,
                parent: self.head.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Keys from the root resolution to the innermost one.
    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.iter().cloned().collect();
        keys.reverse();
        keys
    }

    fn iter(&self) -> impl Iterator<Item = &TypeKey> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref())
            .map(|node| &node.key)
    }
}

impl fmt::Debug for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// What a factory receives: a [`Resolver`] that remembers which keys are
/// already under construction above it.
///
/// Factories must resolve their dependencies through this context. Going
/// through a captured container instead loses the path and with it cycle
/// detection.
#[derive(Clone)]
pub struct FactoryContext {
    container: Container,
    path: ResolutionPath,
}

impl FactoryContext {
    pub(crate) fn new(container: Container, path: ResolutionPath) -> Self {
        Self { container, path }
    }

    /// The key this factory is building.
    pub fn key(&self) -> Option<&TypeKey> {
        self.path.current()
    }

    pub fn path(&self) -> &ResolutionPath {
        &self.path
    }

    /// The container that invoked the factory.
    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl fmt::Debug for FactoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryContext")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl Resolver for FactoryContext {
    async fn resolve_key(&self, key: &TypeKey) -> Result<Instance> {
        let resolved = self.container.resolve_traced(key, &self.path).await?;
        Ok(resolved.instance)
    }

    fn resolve_key_sync(&self, key: &TypeKey) -> Result<Instance> {
        let resolved = self.container.resolve_traced_sync(key, &self.path)?;
        Ok(resolved.instance)
    }

    async fn resolve_all_of(&self, type_id: TypeId) -> Vec<Instance> {
        self.container.resolve_all_traced(type_id, &self.path).await
    }
}
