//! Hot-reload reinstancer
//!
//! Coordinates unload and reload of foreign modules in dependency order,
//! marks their descriptors structurally stale, rebuilds them in place, and
//! reinstances existing host objects onto the new layouts with fresh
//! foreign twins. A module the runtime cannot release lands in the terminal
//! `FailedToUnload` state and disables hot reload for the rest of the
//! session — that condition is surfaced as a blocking diagnostic, not a log
//! line.
//!
//! Reload is not reentrant: a request arriving mid-reload is queued (up to
//! a bounded depth) and drained when the in-flight batch completes.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tether_abi::meta::{PropertyKind, TypeKind};

use crate::builders;
use crate::context::BridgeContext;
use crate::descriptor::{DescriptorId, DescriptorState};
use crate::identity;
use crate::modules::ModuleState;
use crate::registry;
use crate::BridgeError;

/// Errors surfaced by a hot-reload batch.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// Hot reload was turned off in the context options.
    #[error("Hot reload is not enabled for this context")]
    NotEnabled,

    /// A previous failed unload disabled hot reload for the session.
    #[error("Hot reload is disabled for the rest of this session")]
    Disabled,

    /// The runtime could not release a module; the batch is aborted and
    /// hot reload is disabled.
    #[error("Module '{0}' failed to unload")]
    UnloadFailed(String),

    /// The runtime could not reload a module from its path.
    #[error("Module '{0}' failed to load")]
    LoadFailed(String),

    /// Rebuilding a stale descriptor failed.
    #[error("Rebuild after reload failed: {0}")]
    Rebuild(#[source] Box<BridgeError>),
}

/// Summary of one reload batch.
#[derive(Debug, Default, Clone)]
pub struct ReloadReport {
    /// Modules reloaded, in load order.
    pub reloaded: Vec<String>,
    /// Descriptors rebuilt in place.
    pub rebuilt: usize,
    /// Host objects moved onto new layouts and re-twinned.
    pub reinstanced: usize,
    /// The dependency sort hit a cycle and fell back to arbitrary order.
    pub cycle_warning: bool,
    /// The request was queued behind an in-flight reload.
    pub queued: bool,
}

impl ReloadReport {
    fn queued() -> Self {
        Self {
            queued: true,
            ..Default::default()
        }
    }
}

/// Reload state for one context.
#[derive(Debug, Default)]
pub struct HotReloader {
    in_flight: bool,
    queued: VecDeque<Vec<String>>,
    disabled: bool,
}

impl HotReloader {
    /// Create an idle reloader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a failed unload has disabled hot reload for the session.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether a batch is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

// ============================================================================
// Dependency Graph
// ============================================================================

/// Inter-module dependency graph for reload ordering.
///
/// Sorting tolerates cycles: modules that cannot be ordered are appended
/// after the ordered prefix and the caller is told a cycle was present.
/// Every module comes back exactly once either way.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: FxHashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module with no dependencies yet.
    pub fn add_module(&mut self, module: impl Into<String>) {
        self.edges.entry(module.into()).or_default();
    }

    /// Record that `module` depends on `depends_on`.
    pub fn add_dependency(&mut self, module: impl Into<String>, depends_on: impl Into<String>) {
        let depends_on = depends_on.into();
        self.edges.entry(module.into()).or_default().push(depends_on.clone());
        self.edges.entry(depends_on).or_default();
    }

    /// Number of modules in the graph.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Topological order, dependencies first.
    ///
    /// Kahn's algorithm over the reversed edges; when a cycle leaves nodes
    /// unordered they are appended (name order, for determinism) and the
    /// second return is `true`.
    pub fn sort_by_dependency_order(&self) -> (Vec<String>, bool) {
        let mut in_degree: FxHashMap<&str, usize> = FxHashMap::default();
        let mut dependents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();

        for module in self.edges.keys() {
            in_degree.entry(module).or_insert(0);
            dependents.entry(module).or_default();
        }
        for (module, deps) in &self.edges {
            for dep in deps {
                dependents.entry(dep).or_default().push(module);
                *in_degree.entry(module).or_insert(0) += 1;
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(m, _)| *m)
            .collect();
        ready.sort_unstable();

        let mut queue: VecDeque<&str> = ready.into();
        let mut order = Vec::with_capacity(self.edges.len());
        while let Some(module) = queue.pop_front() {
            order.push(module.to_string());
            if let Some(deps) = dependents.get(module) {
                for &dependent in deps {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        let cycle = order.len() != self.edges.len();
        if cycle {
            let mut leftover: Vec<String> = self
                .edges
                .keys()
                .filter(|m| !order.contains(*m))
                .cloned()
                .collect();
            leftover.sort_unstable();
            order.extend(leftover);
        }
        (order, cycle)
    }
}

// ============================================================================
// Reload Driver
// ============================================================================

/// Run a hot reload for the modules containing the changed source units.
pub fn trigger_reload(
    ctx: &mut BridgeContext,
    changed_units: &[String],
) -> Result<ReloadReport, ReloadError> {
    if !ctx.options.hot_reload_enabled {
        return Err(ReloadError::NotEnabled);
    }
    if ctx.reloader.disabled {
        return Err(ReloadError::Disabled);
    }
    if ctx.reloader.in_flight {
        if ctx.reloader.queued.len() >= ctx.options.max_queued_reloads {
            tracing::warn!(depth = ctx.reloader.queued.len(), "reload queue full, dropping request");
            ctx.diagnostics
                .warning("Hot reload request dropped: queue is full");
        } else {
            ctx.reloader.queued.push_back(changed_units.to_vec());
        }
        return Ok(ReloadReport::queued());
    }

    ctx.reloader.in_flight = true;
    let result = run_batch(ctx, changed_units);
    ctx.reloader.in_flight = false;

    while let Some(batch) = ctx.reloader.queued.pop_front() {
        if ctx.reloader.disabled {
            ctx.reloader.queued.clear();
            break;
        }
        ctx.reloader.in_flight = true;
        if let Err(err) = run_batch(ctx, &batch) {
            tracing::error!(error = %err, "queued reload batch failed");
            ctx.diagnostics.error(format!("Queued hot reload failed: {}", err));
        }
        ctx.reloader.in_flight = false;
    }

    result
}

/// Snapshot of a property's placement in the pre-reload layout.
struct OldProp {
    name: String,
    kind: PropertyKind,
    offset: usize,
    size: usize,
}

fn run_batch(ctx: &mut BridgeContext, changed_units: &[String]) -> Result<ReloadReport, ReloadError> {
    let affected = ctx.modules.affected_by_units(changed_units);
    if affected.is_empty() {
        return Ok(ReloadReport::default());
    }
    tracing::debug!(?affected, "hot reload batch");

    // Order the affected modules by their dependencies on each other.
    let mut graph = DependencyGraph::new();
    for name in &affected {
        graph.add_module(name.clone());
        if let Some(info) = ctx.modules.get(name) {
            for dep in &info.depends_on {
                if affected.contains(dep) {
                    graph.add_dependency(name.clone(), dep.clone());
                }
            }
        }
    }
    let (load_order, cycle_warning) = graph.sort_by_dependency_order();
    if cycle_warning {
        tracing::warn!(?load_order, "module dependency cycle, using arbitrary order");
        ctx.diagnostics.warning(
            "Hot reload: module dependencies form a cycle; reload order is arbitrary",
        );
    }

    // Pre-reload layouts, for moving live objects onto the new ones.
    let old_layouts = capture_layouts(ctx, &load_order);

    unload_phase(ctx, &load_order)?;
    let stale = reload_phase(ctx, &load_order)?;

    // Rebuild every descriptor still stale after pending replays.
    let mut rebuilt = 0;
    for id in &stale {
        if ctx.registry.descriptor(*id).state == DescriptorState::StructurallyStale {
            builders::build(ctx, *id).map_err(|e| ReloadError::Rebuild(Box::new(e)))?;
            rebuilt += 1;
        }
    }

    let reinstanced = reinstance_objects(ctx, &stale, &old_layouts)
        .map_err(|e| ReloadError::Rebuild(Box::new(e)))?;

    // Reclaim pass: anything the host collector reported mid-reload.
    identity::drain_destroyed(ctx);

    Ok(ReloadReport {
        reloaded: load_order,
        rebuilt,
        reinstanced,
        cycle_warning,
        queued: false,
    })
}

fn capture_layouts(
    ctx: &BridgeContext,
    modules: &[String],
) -> FxHashMap<DescriptorId, Vec<OldProp>> {
    let mut layouts = FxHashMap::default();
    for name in modules {
        for id in ctx.registry.ids_for_module(name) {
            let desc = ctx.registry.descriptor(id);
            if desc.state == DescriptorState::UpToDate {
                let props = desc
                    .properties()
                    .iter()
                    .map(|p| OldProp {
                        name: p.name.clone(),
                        kind: p.kind,
                        offset: p.offset,
                        size: p.size,
                    })
                    .collect();
                layouts.insert(id, props);
            }
        }
    }
    layouts
}

/// Unload affected modules, most-depended-upon last.
fn unload_phase(ctx: &mut BridgeContext, load_order: &[String]) -> Result<(), ReloadError> {
    let runtime = ctx.runtime.clone();
    for name in load_order.iter().rev() {
        if let Some(info) = ctx.modules.get_mut(name) {
            info.state = ModuleState::Unloading;
        }
        if !runtime.unload_module(name) {
            if let Some(info) = ctx.modules.get_mut(name) {
                info.state = ModuleState::FailedToUnload;
            }
            ctx.reloader.disabled = true;
            tracing::error!(module = %name, "unload failed, hot reload disabled");
            ctx.diagnostics.blocking(format!(
                "Module '{}' could not be unloaded; hot reload is disabled until the process restarts",
                name
            ));
            return Err(ReloadError::UnloadFailed(name.clone()));
        }
        if let Some(info) = ctx.modules.get_mut(name) {
            info.state = ModuleState::Unloaded;
            info.key = None;
        }
    }
    Ok(())
}

/// Reload modules in dependency order, re-ingesting retained metadata and
/// marking previously built descriptors stale.
fn reload_phase(
    ctx: &mut BridgeContext,
    load_order: &[String],
) -> Result<Vec<DescriptorId>, ReloadError> {
    let runtime = ctx.runtime.clone();
    let mut stale = Vec::new();
    for name in load_order {
        let (path, metadata) = match ctx.modules.get_mut(name) {
            Some(info) => {
                info.state = ModuleState::Loading;
                (info.path.clone(), info.metadata.clone())
            }
            None => continue,
        };

        let Some(key) = runtime.load_module(&path) else {
            if let Some(info) = ctx.modules.get_mut(name) {
                info.state = ModuleState::Unloaded;
            }
            ctx.diagnostics
                .error(format!("Module '{}' failed to load from '{}'", name, path));
            return Err(ReloadError::LoadFailed(name.clone()));
        };

        stale.extend(ctx.registry.mark_module_stale(name));
        for desc in metadata.descriptions() {
            ctx.registry.register_description(desc.clone());
        }
        if let Some(info) = ctx.modules.get_mut(name) {
            info.state = ModuleState::Loaded;
            info.key = Some(key);
        }
        registry::module_available(ctx, name).map_err(|e| ReloadError::Rebuild(Box::new(e)))?;
    }
    Ok(stale)
}

/// Move live host objects of rebuilt classes onto the new layouts.
///
/// Values are carried over for properties matching by name, kind, and size;
/// everything else resets to the default instance. Each affected object's
/// old twin is disposed and a new one created against the rebuilt type.
fn reinstance_objects(
    ctx: &mut BridgeContext,
    rebuilt: &[DescriptorId],
    old_layouts: &FxHashMap<DescriptorId, Vec<OldProp>>,
) -> Result<usize, BridgeError> {
    let classes: Vec<DescriptorId> = rebuilt
        .iter()
        .copied()
        .filter(|id| ctx.registry.descriptor(*id).kind == TypeKind::Class)
        .collect();
    let objects = ctx.heap.objects_of_classes(&classes);

    let mut count = 0;
    for host in objects {
        let Some(class) = ctx.heap.class_of(host) else {
            continue;
        };
        let Some(old_data) = ctx.heap.object(host).map(|o| o.data.clone()) else {
            continue;
        };

        let new_data = {
            let desc = ctx.registry.descriptor(class);
            let mut data = desc.defaults.clone();
            if let Some(old_props) = old_layouts.get(&class) {
                for prop in desc.properties() {
                    let matched = old_props
                        .iter()
                        .find(|o| o.name == prop.name && o.kind == prop.kind && o.size == prop.size);
                    if let Some(old) = matched {
                        if let Some(src) = old_data.get(old.offset..old.offset + old.size) {
                            data[prop.offset..prop.offset + prop.size].copy_from_slice(src);
                        }
                    }
                }
            }
            data
        };

        if let Some(obj) = ctx.heap.object_mut(host) {
            obj.data = new_data;
        }

        // Fresh twin against the rebuilt type; the old one is disposed
        // exactly once by removal.
        if ctx.identity.contains(host) {
            identity::remove_twin(ctx, host);
            identity::create_foreign_twin(ctx, host, class)?;
        }
        count += 1;
    }
    Ok(count)
}
