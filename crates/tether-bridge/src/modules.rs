//! Loaded-module bookkeeping
//!
//! Tracks every foreign module the bridge has seen: its runtime key, the
//! types it owns, the metadata blob retained for hot-reload re-ingestion,
//! and the inter-module dependency edges computed from type references in
//! its descriptions.

use rustc_hash::{FxHashMap, FxHashSet};
use tether_abi::meta::{FunctionDescription, InnerType, PropertyDescription, TypeDescription};
use tether_abi::{ModuleKey, ModuleMetadata};

/// Load state of a foreign module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Loaded and usable.
    Loaded,
    /// Unload requested, outcome pending.
    Unloading,
    /// Unloaded; descriptors for its types are stale.
    Unloaded,
    /// Reload in progress.
    Loading,
    /// The runtime could not release the module; hot reload is disabled
    /// for the rest of the session.
    FailedToUnload,
}

/// Bookkeeping for one foreign module.
#[derive(Debug)]
pub struct ModuleInfo {
    /// Module name.
    pub name: String,
    /// Path the module is (re)loaded from.
    pub path: String,
    /// Current load state.
    pub state: ModuleState,
    /// Runtime key while loaded.
    pub key: Option<ModuleKey>,
    /// Retained metadata, re-ingested on reload.
    pub metadata: ModuleMetadata,
    /// Names of modules this module's types reference.
    pub depends_on: FxHashSet<String>,
}

/// Registry of known foreign modules.
#[derive(Debug, Default)]
pub struct ModuleTracker {
    modules: FxHashMap<String, ModuleInfo>,
}

impl ModuleTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a loaded module.
    pub fn register(&mut self, metadata: ModuleMetadata, path: impl Into<String>, key: ModuleKey) {
        let name = metadata.module.clone();
        let depends_on = dependency_scan(&metadata, &name);
        self.modules.insert(
            name.clone(),
            ModuleInfo {
                name,
                path: path.into(),
                state: ModuleState::Loaded,
                key: Some(key),
                metadata,
                depends_on,
            },
        );
    }

    /// Replace a module's retained metadata ahead of a reload, recomputing
    /// its dependency edges.
    pub fn update_metadata(&mut self, metadata: ModuleMetadata) -> bool {
        let name = metadata.module.clone();
        let Some(info) = self.modules.get_mut(&name) else {
            return false;
        };
        info.depends_on = dependency_scan(&metadata, &name);
        info.metadata = metadata;
        true
    }

    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    /// Mutable lookup of a module by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModuleInfo> {
        self.modules.get_mut(name)
    }

    /// Runtime key of a loaded module.
    pub fn key_of(&self, name: &str) -> Option<ModuleKey> {
        self.modules.get(name).and_then(|m| m.key)
    }

    /// Names of modules containing any of the changed source units.
    pub fn affected_by_units(&self, changed: &[String]) -> Vec<String> {
        let mut affected: Vec<String> = self
            .modules
            .values()
            .filter(|m| m.metadata.units.iter().any(|u| changed.contains(u)))
            .map(|m| m.name.clone())
            .collect();
        affected.sort();
        affected
    }

    /// All tracked module names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of tracked modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no modules are tracked.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ============================================================================
// Dependency Scanning
// ============================================================================

/// Collect the names of foreign modules referenced by a metadata blob,
/// excluding the module itself and host-native types (empty module names).
fn dependency_scan(metadata: &ModuleMetadata, own_name: &str) -> FxHashSet<String> {
    let mut deps = FxHashSet::default();
    for desc in metadata.descriptions() {
        scan_type(desc, own_name, &mut deps);
    }
    deps
}

fn note(module: &str, own_name: &str, deps: &mut FxHashSet<String>) {
    if !module.is_empty() && module != own_name {
        deps.insert(module.to_string());
    }
}

fn scan_type(desc: &TypeDescription, own_name: &str, deps: &mut FxHashSet<String>) {
    if let Some(parent) = &desc.parent {
        note(&parent.module, own_name, deps);
    }
    for iface in &desc.interfaces {
        note(&iface.module, own_name, deps);
    }
    for prop in &desc.properties {
        scan_property(prop, own_name, deps);
    }
    for func in &desc.functions {
        scan_function(func, own_name, deps);
    }
}

fn scan_property(prop: &PropertyDescription, own_name: &str, deps: &mut FxHashSet<String>) {
    match &prop.inner {
        InnerType::None => {}
        InnerType::Object(r) | InnerType::Struct(r) | InnerType::Enum(r) | InnerType::Class(r) => {
            note(&r.module, own_name, deps);
        }
        InnerType::Element(e) => scan_property(e, own_name, deps),
        InnerType::Pair(k, v) => {
            scan_property(k, own_name, deps);
            scan_property(v, own_name, deps);
        }
        InnerType::Signature(f) => scan_function(f, own_name, deps),
    }
}

fn scan_function(func: &FunctionDescription, own_name: &str, deps: &mut FxHashSet<String>) {
    for param in &func.params {
        scan_property(param, own_name, deps);
    }
    if let Some(ret) = &func.ret {
        scan_property(ret, own_name, deps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_abi::meta::{TypeKind, TypeRef};

    fn blob(name: &str, units: &[&str]) -> ModuleMetadata {
        ModuleMetadata {
            module: name.to_string(),
            units: units.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut tracker = ModuleTracker::new();
        tracker.register(blob("game_mod", &["a.src"]), "game_mod.bin", ModuleKey(1));

        assert_eq!(tracker.len(), 1);
        let info = tracker.get("game_mod").unwrap();
        assert_eq!(info.state, ModuleState::Loaded);
        assert_eq!(info.key, Some(ModuleKey(1)));
        assert_eq!(tracker.key_of("game_mod"), Some(ModuleKey(1)));
    }

    #[test]
    fn test_affected_by_units() {
        let mut tracker = ModuleTracker::new();
        tracker.register(blob("a", &["x.src", "y.src"]), "a.bin", ModuleKey(1));
        tracker.register(blob("b", &["z.src"]), "b.bin", ModuleKey(2));

        let changed = vec!["y.src".to_string()];
        assert_eq!(tracker.affected_by_units(&changed), vec!["a"]);

        let changed = vec!["y.src".to_string(), "z.src".to_string()];
        assert_eq!(tracker.affected_by_units(&changed), vec!["a", "b"]);
    }

    #[test]
    fn test_dependency_scan_covers_nested_references() {
        let mut meta = blob("child_mod", &[]);
        meta.classes.push(
            TypeDescription::new("Child", "child_mod", TypeKind::Class)
                .with_parent(TypeRef::new("Base", "", "base_mod"))
                .with_property(PropertyDescription::array(
                    "others",
                    PropertyDescription::object("e", TypeRef::new("Other", "", "other_mod")),
                )),
        );

        let mut tracker = ModuleTracker::new();
        tracker.register(meta, "child.bin", ModuleKey(3));

        let deps = &tracker.get("child_mod").unwrap().depends_on;
        assert!(deps.contains("base_mod"));
        assert!(deps.contains("other_mod"));
        // Host-native references (empty module) and self-references are skipped.
        assert!(!deps.contains(""));
        assert!(!deps.contains("child_mod"));
    }

    #[test]
    fn test_update_metadata_recomputes_dependencies() {
        let mut tracker = ModuleTracker::new();
        tracker.register(blob("m", &[]), "m.bin", ModuleKey(1));
        assert!(tracker.get("m").unwrap().depends_on.is_empty());

        let mut updated = blob("m", &[]);
        updated.classes.push(
            TypeDescription::new("T", "m", TypeKind::Class)
                .with_parent(TypeRef::new("B", "", "dep")),
        );
        assert!(tracker.update_metadata(updated));
        assert!(tracker.get("m").unwrap().depends_on.contains("dep"));

        assert!(!tracker.update_metadata(blob("unknown", &[])));
    }
}
