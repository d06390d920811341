//! Container introspection: cache diagnostics, health check and
//! maintenance cleanup.

use std::fmt;

use serde::Serialize;
use tether_support::rendering::{format_percent, render_path};
use tracing::{debug, info};

use crate::container::Container;
use crate::key::TypeKey;

/// Snapshot of registrations and cache occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerDiagnostics {
    pub total_registrations: usize,
    /// Singletons that have been built and are cached.
    pub singleton_instances: usize,
    /// Weak slots, dead ones included.
    pub weak_references: usize,
    pub active_weak_references: usize,
    pub registered_types: Vec<TypeKey>,
}

impl ContainerDiagnostics {
    /// Live weak slots over all weak slots. `1.0` when there are none.
    pub fn memory_efficiency(&self) -> f64 {
        if self.weak_references == 0 {
            1.0
        } else {
            self.active_weak_references as f64 / self.weak_references as f64
        }
    }
}

impl fmt::Display for ContainerDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Container Diagnostics")?;
        writeln!(f, "Total Registrations: {}", self.total_registrations)?;
        writeln!(f, "Singleton Instances: {}", self.singleton_instances)?;
        writeln!(
            f,
            "Weak References: {} ({} active)",
            self.weak_references, self.active_weak_references
        )?;
        writeln!(f, "Memory Efficiency: {}", format_percent(self.memory_efficiency()))?;
        if !self.registered_types.is_empty() {
            let names: Vec<String> = self.registered_types.iter().map(TypeKey::short_name).collect();
            writeln!(f, "Registered Types: {}", names.join(", "))?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Health check
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    HasIssues,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::HasIssues => write!(f, "has issues"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HealthIssue {
    /// Too many weak slots point at dropped instances.
    MemoryLeak(String),
    /// Number of registrations never resolved.
    OrphanedRegistrations(usize),
    /// The deepest resolution path seen, rendered.
    DeepResolutionStack(String),
    /// A cycle seen during resolution, rendered.
    CircularDependency(String),
}

impl HealthIssue {
    fn is_critical(&self) -> bool {
        matches!(self, Self::CircularDependency(_))
    }

    fn recommendation(&self) -> &'static str {
        match self {
            Self::MemoryLeak(_) => "Run perform_maintenance_cleanup() or prefer singleton retention for long-lived services",
            Self::OrphanedRegistrations(_) => "Remove registrations that are never resolved",
            Self::DeepResolutionStack(_) => "Flatten the dependency graph or group collaborators behind a facade",
            Self::CircularDependency(_) => "Break the cycle by resolving one side lazily or extracting a shared dependency",
        }
    }
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryLeak(detail) => write!(f, "Memory leak: {detail}"),
            Self::OrphanedRegistrations(count) => {
                write!(f, "{count} registrations have never been resolved")
            }
            Self::DeepResolutionStack(path) => write!(f, "Deep resolution stack: {path}"),
            Self::CircularDependency(path) => write!(f, "Circular dependency: {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerHealthReport {
    pub status: HealthStatus,
    pub issues: Vec<HealthIssue>,
    pub recommendations: Vec<String>,
    pub diagnostics: ContainerDiagnostics,
}

impl ContainerHealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

impl fmt::Display for ContainerHealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Container Health: {}", self.status)?;
        for issue in &self.issues {
            writeln!(f, "  - {issue}")?;
        }
        for recommendation in &self.recommendations {
            writeln!(f, "  * {recommendation}")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Container methods
// ═══════════════════════════════════════════

fn render_keys(keys: &[TypeKey]) -> String {
    let names: Vec<String> = keys.iter().map(TypeKey::short_name).collect();
    render_path(&names)
}

impl Container {
    /// Current registration and cache counts. Dead weak slots are counted,
    /// not removed.
    pub fn diagnostics(&self) -> ContainerDiagnostics {
        let registered_types = self.registered_keys();
        let (weak_references, active_weak_references) = self.inner.cache.weak_counts();
        ContainerDiagnostics {
            total_registrations: registered_types.len(),
            singleton_instances: self.inner.cache.built_singletons(),
            weak_references,
            active_weak_references,
            registered_types,
        }
    }

    /// Checks cache efficiency, unused registrations, resolution depth and
    /// cycles seen so far.
    pub fn health_check(&self) -> ContainerHealthReport {
        let diagnostics = self.diagnostics();
        let config = self.config();
        let stats = &self.inner.stats;
        let mut issues = Vec::new();

        let efficiency = diagnostics.memory_efficiency();
        if efficiency < config.weak_efficiency_threshold {
            issues.push(HealthIssue::MemoryLeak(format!(
                "only {} of weak references are alive",
                format_percent(efficiency)
            )));
        }

        let orphaned = diagnostics
            .registered_types
            .iter()
            .filter(|key| !stats.was_resolved(key))
            .count();
        if orphaned * 2 > diagnostics.total_registrations {
            issues.push(HealthIssue::OrphanedRegistrations(orphaned));
        }

        let deepest = stats.deepest_path();
        if deepest.len() > config.deep_resolution_threshold {
            issues.push(HealthIssue::DeepResolutionStack(render_keys(&deepest)));
        }

        for cycle in stats.cycles() {
            issues.push(HealthIssue::CircularDependency(render_keys(&cycle)));
        }

        let status = if issues.iter().any(HealthIssue::is_critical) {
            HealthStatus::Critical
        } else if issues.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::HasIssues
        };
        let mut recommendations: Vec<String> = Vec::new();
        for issue in &issues {
            let text = issue.recommendation().to_string();
            if !recommendations.contains(&text) {
                recommendations.push(text);
            }
        }

        debug!(status = %status, issues = issues.len(), "Health check complete");
        ContainerHealthReport {
            status,
            issues,
            recommendations,
            diagnostics,
        }
    }

    /// Drops weak slots whose instance is gone. Returns how many were removed.
    pub fn perform_maintenance_cleanup(&self) -> usize {
        let removed = self.inner.cache.purge_dead_weak();
        info!(removed, "Maintenance cleanup finished");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{RegistrarExt, ResolverExt};
    use crate::config::ContainerConfig;
    use std::sync::Arc;

    struct Session;
    struct Left;
    struct Right;

    #[tokio::test]
    async fn diagnostics_count_caches() {
        let container = Container::new();
        container.register::<Arc<Session>>().as_weak().with(|_| Ok(Arc::new(Session))).unwrap();
        container.register::<u8>().as_singleton().with_value(1).unwrap();
        container.register::<u16>().with_value(2).unwrap();

        let _byte: u8 = container.resolve().await.unwrap();
        let held: Arc<Session> = container.resolve().await.unwrap();

        let diagnostics = container.diagnostics();
        assert_eq!(diagnostics.total_registrations, 3);
        assert_eq!(diagnostics.singleton_instances, 1);
        assert_eq!(diagnostics.weak_references, 1);
        assert_eq!(diagnostics.active_weak_references, 1);
        assert!(diagnostics.to_string().contains("Memory Efficiency: 100.0%"));

        drop(held);
        let diagnostics = container.diagnostics();
        assert_eq!(diagnostics.active_weak_references, 0);
        assert!(diagnostics.to_string().contains("Memory Efficiency: 0.0%"));
    }

    #[tokio::test]
    async fn cleanup_drops_dead_weak_slots() {
        let container = Container::new();
        container.register::<Arc<Session>>().as_weak().with(|_| Ok(Arc::new(Session))).unwrap();
        let held: Arc<Session> = container.resolve().await.unwrap();

        assert_eq!(container.perform_maintenance_cleanup(), 0);
        drop(held);
        assert_eq!(container.perform_maintenance_cleanup(), 1);
        assert_eq!(container.diagnostics().weak_references, 0);
    }

    #[tokio::test]
    async fn healthy_when_everything_is_used() {
        let container = Container::new();
        container.register::<u8>().with_value(1).unwrap();
        let _: u8 = container.resolve().await.unwrap();

        let report = container.health_check();
        assert!(report.is_healthy(), "{report}");
        assert!(report.recommendations.is_empty());
    }

    #[tokio::test]
    async fn orphans_and_leaks_are_reported() {
        let container = Container::new();
        container.register::<Arc<Session>>().as_weak().with(|_| Ok(Arc::new(Session))).unwrap();
        container.register::<u8>().with_value(1).unwrap();
        container.register::<u16>().with_value(2).unwrap();
        let _: Arc<Session> = container.resolve().await.unwrap();

        let report = container.health_check();
        assert_eq!(report.status, HealthStatus::HasIssues);
        assert!(report.issues.contains(&HealthIssue::OrphanedRegistrations(2)));
        assert!(
            report
                .issues
                .iter()
                .any(|issue| matches!(issue, HealthIssue::MemoryLeak(_)))
        );
        assert_eq!(report.recommendations.len(), 2);
    }

    #[tokio::test]
    async fn cycles_make_the_container_critical() {
        let container = Container::new();
        container
            .register::<Arc<Left>>()
            .with(|ctx| {
                let _: Arc<Right> = ctx.resolve_sync()?;
                Ok(Arc::new(Left))
            })
            .unwrap();
        container
            .register::<Arc<Right>>()
            .with(|ctx| {
                let _: Arc<Left> = ctx.resolve_sync()?;
                Ok(Arc::new(Right))
            })
            .unwrap();
        assert!(container.resolve::<Arc<Left>>().await.is_err());

        let report = container.health_check();
        assert_eq!(report.status, HealthStatus::Critical);
        assert!(report.issues.contains(&HealthIssue::CircularDependency(
            "Arc<Left> → Arc<Right> → Arc<Left>".into()
        )));
    }

    #[tokio::test]
    async fn breaking_a_cycle_restores_health() {
        let container = Container::new();
        container
            .register::<Arc<Left>>()
            .with(|ctx| {
                let _: Arc<Right> = ctx.resolve_sync()?;
                Ok(Arc::new(Left))
            })
            .unwrap();
        container
            .register::<Arc<Right>>()
            .with(|ctx| {
                let _: Arc<Left> = ctx.resolve_sync()?;
                Ok(Arc::new(Right))
            })
            .unwrap();
        assert!(container.resolve::<Arc<Left>>().await.is_err());
        assert_eq!(container.health_check().status, HealthStatus::Critical);

        container
            .register::<Arc<Right>>()
            .with(|_| Ok(Arc::new(Right)))
            .unwrap();
        let _: Arc<Left> = container.resolve().await.unwrap();

        let report = container.health_check();
        assert_eq!(report.status, HealthStatus::Healthy, "{report}");
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn deep_paths_are_reported() {
        let config = ContainerConfig {
            deep_resolution_threshold: 1,
            ..ContainerConfig::default()
        };
        let container = Container::with_config(config);
        container.register::<u8>().with_value(1).unwrap();
        container
            .register::<u16>()
            .with(|ctx| Ok(u16::from(ctx.resolve_sync::<u8>()?)))
            .unwrap();
        let _: u16 = container.resolve().await.unwrap();

        let report = container.health_check();
        assert!(report.issues.contains(&HealthIssue::DeepResolutionStack("u16 → u8".into())));
    }
}
