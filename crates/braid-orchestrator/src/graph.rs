//! Graph compilation.
//!
//! A configuration document declares, per named graph, a list of services
//! and a list of dependency edges. Compilation normalizes the service
//! entries, builds forward and reverse adjacency, and validates that the
//! result is a DAG. The compiled graph is immutable and shared read-only
//! across every request routed through it.

use std::collections::{HashMap, HashSet};

use braid_common::config::GraphConfig;
use braid_common::{BraidError, Result};

use crate::host_pool::HostPool;

/// A logical downstream endpoint, resolved to concrete hosts through a
/// host group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    /// Host group to pick endpoints from; defaults to the service name.
    pub hosts_from: String,
    /// Target path override; when unset the client request path is used.
    pub path: Option<String>,
}

/// An immutable, validated service graph.
///
/// `forward[a]` holds the services `a` depends on (each must reply before
/// `a` is dispatched); `reverse[b]` holds the services depending on `b`.
/// `order` preserves the configuration order of services and is the
/// deterministic tie-break for readiness scans.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGraph {
    name: String,
    services: HashMap<String, Service>,
    forward: HashMap<String, HashSet<String>>,
    reverse: HashMap<String, HashSet<String>>,
    order: Vec<String>,
}

impl CompiledGraph {
    /// Compiles one named graph against the host pool.
    ///
    /// # Errors
    ///
    /// - `UnknownHostGroup` - a service references a host group the pool
    ///   does not know
    /// - `DuplicateService` - two services share a name
    /// - `SelfDependency` - a dependency edge with `a == b`
    /// - `UnknownService` - a dependency references an undeclared service
    /// - `DependencyCycle` - the dependency relation is not acyclic
    pub fn compile(name: &str, config: &GraphConfig, hosts: &HostPool) -> Result<Self> {
        let mut services = HashMap::new();
        let mut forward: HashMap<String, HashSet<String>> = HashMap::new();
        let mut reverse: HashMap<String, HashSet<String>> = HashMap::new();
        let mut order = Vec::with_capacity(config.services.len());

        for entry in &config.services {
            let service = Service {
                name: entry.name().to_string(),
                hosts_from: entry.hosts_from().to_string(),
                path: entry.path().map(str::to_string),
            };
            if !hosts.contains(&service.hosts_from) {
                return Err(BraidError::UnknownHostGroup {
                    graph: name.to_string(),
                    group: service.hosts_from,
                });
            }
            if services.contains_key(&service.name) {
                return Err(BraidError::DuplicateService {
                    graph: name.to_string(),
                    service: service.name,
                });
            }
            forward.insert(service.name.clone(), HashSet::new());
            reverse.insert(service.name.clone(), HashSet::new());
            order.push(service.name.clone());
            services.insert(service.name.clone(), service);
        }

        for dep in &config.deps {
            if dep.a == dep.b {
                return Err(BraidError::SelfDependency {
                    graph: name.to_string(),
                    service: dep.a.clone(),
                });
            }
            for service in [&dep.a, &dep.b] {
                if !services.contains_key(service) {
                    return Err(BraidError::UnknownService {
                        graph: name.to_string(),
                        service: service.clone(),
                    });
                }
            }
            forward.entry(dep.a.clone()).or_default().insert(dep.b.clone());
            reverse.entry(dep.b.clone()).or_default().insert(dep.a.clone());
        }

        let graph = Self {
            name: name.to_string(),
            services,
            forward,
            reverse,
            order,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Kahn's algorithm over scratch copies; the retained adjacency maps
    /// are never mutated.
    fn check_acyclic(&self) -> Result<()> {
        let mut tree = self.forward.clone();
        let mut reverse = self.reverse.clone();

        while !tree.is_empty() {
            let no_deps: Vec<&String> = self
                .order
                .iter()
                .filter(|name| tree.get(*name).is_some_and(HashSet::is_empty))
                .collect();

            if no_deps.is_empty() {
                return Err(BraidError::DependencyCycle(self.name.clone()));
            }

            for name in no_deps {
                if let Some(dependents) = reverse.remove(name) {
                    for dependent in dependents {
                        if let Some(deps) = tree.get_mut(&dependent) {
                            deps.remove(name);
                        }
                    }
                }
                tree.remove(name);
            }
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Services `name` depends on. Empty for unknown names.
    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = &String> {
        self.forward.get(name).into_iter().flatten()
    }

    /// Services depending on `name`. Empty for unknown names.
    pub fn dependents(&self, name: &str) -> impl Iterator<Item = &String> {
        self.reverse.get(name).into_iter().flatten()
    }

    /// Service names in configuration order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
