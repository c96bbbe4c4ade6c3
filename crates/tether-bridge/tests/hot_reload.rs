//! Hot-reload behavior: rebuild idempotence, dependency ordering, cycle
//! tolerance, object reinstancing, and the terminal failed-unload state.

mod common;

use std::sync::Arc;

use common::ScriptedRuntime;
use tether_abi::meta::{
    FunctionDescription, PropertyDescription, PropertyKind, TypeDescription, TypeKind, TypeRef,
};
use tether_abi::{ModuleKey, ModuleMetadata};
use tether_bridge::descriptor::DescriptorState;
use tether_bridge::{BridgeContext, BridgeOptions, ReloadError};

fn game_module() -> ModuleMetadata {
    ModuleMetadata {
        module: "game_mod".to_string(),
        units: vec!["Enemy.src".to_string()],
        classes: vec![TypeDescription::new("Enemy", "game_mod", TypeKind::Class)
            .with_property(PropertyDescription::new("health", PropertyKind::Float32))
            .with_property(PropertyDescription::new("armor", PropertyKind::Int32))
            .with_function(FunctionDescription::new("Tick"))],
        ..Default::default()
    }
}

fn ctx_with(runtime: ScriptedRuntime) -> (BridgeContext, Arc<ScriptedRuntime>) {
    let runtime = Arc::new(runtime);
    (BridgeContext::new(runtime.clone()), runtime)
}

fn changed(units: &[&str]) -> Vec<String> {
    units.iter().map(|u| u.to_string()).collect()
}

#[test]
fn rebuild_of_unchanged_description_is_idempotent() {
    let (mut ctx, _rt) = ctx_with(ScriptedRuntime::new());
    ctx.ingest(game_module(), "game_mod.bin", ModuleKey(1)).unwrap();

    let class = ctx.resolve_type(&TypeRef::new("Enemy", "", "game_mod")).unwrap();
    let (names_before, offsets_before, functions_before) = {
        let desc = ctx.registry.descriptor(class);
        (
            desc.properties().iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
            desc.properties().iter().map(|p| p.offset).collect::<Vec<_>>(),
            desc.functions.len(),
        )
    };

    let report = ctx.trigger_hot_reload(&changed(&["Enemy.src"])).unwrap();
    assert_eq!(report.reloaded, vec!["game_mod"]);
    assert_eq!(report.rebuilt, 1);
    assert!(!report.cycle_warning);

    let desc = ctx.registry.descriptor(class);
    assert_eq!(desc.state, DescriptorState::UpToDate);
    let names_after: Vec<_> = desc.properties().iter().map(|p| p.name.clone()).collect();
    let offsets_after: Vec<_> = desc.properties().iter().map(|p| p.offset).collect();
    assert_eq!(names_after, names_before);
    assert_eq!(offsets_after, offsets_before);
    assert_eq!(desc.functions.len(), functions_before);
}

#[test]
fn reload_reinstances_objects_and_recreates_twins() {
    let (mut ctx, rt) = ctx_with(ScriptedRuntime::new());
    ctx.ingest(game_module(), "game_mod.bin", ModuleKey(1)).unwrap();

    let class = ctx.resolve_type(&TypeRef::new("Enemy", "", "game_mod")).unwrap();
    let host = ctx.construct(class).unwrap();
    let old_twin = ctx.find_or_create_twin(host).unwrap();

    let health_offset = ctx.registry.descriptor(class).find_property("health").unwrap().offset;
    assert!(ctx.heap.write_bytes(host, health_offset, &12.5f32.to_le_bytes()));

    let report = ctx.trigger_hot_reload(&changed(&["Enemy.src"])).unwrap();
    assert_eq!(report.reinstanced, 1);

    // Matching properties keep their values across the new layout.
    let new_offset = ctx.registry.descriptor(class).find_property("health").unwrap().offset;
    let bytes = ctx.heap.read_bytes(host, new_offset, 4).unwrap();
    assert_eq!(f32::from_le_bytes(bytes.try_into().unwrap()), 12.5);

    // The old twin was disposed exactly once and a fresh one created.
    assert_eq!(rt.dispose_count(old_twin.foreign), 1);
    assert_eq!(rt.created_count(), 2);
    let new_twin = ctx.find_or_create_twin(host).unwrap();
    assert_ne!(new_twin.foreign, old_twin.foreign);
}

#[test]
fn modules_unload_dependents_first_and_reload_in_reverse() {
    let base = ModuleMetadata {
        module: "base_mod".to_string(),
        units: vec!["Base.src".to_string()],
        classes: vec![TypeDescription::new("Base", "base_mod", TypeKind::Class)],
        ..Default::default()
    };
    let child = ModuleMetadata {
        module: "child_mod".to_string(),
        units: vec!["Child.src".to_string()],
        classes: vec![TypeDescription::new("Child", "child_mod", TypeKind::Class)
            .with_parent(TypeRef::new("Base", "", "base_mod"))],
        ..Default::default()
    };

    let (mut ctx, rt) = ctx_with(ScriptedRuntime::new());
    ctx.ingest(base, "base_mod.bin", ModuleKey(1)).unwrap();
    ctx.ingest(child, "child_mod.bin", ModuleKey(2)).unwrap();
    ctx.resolve_type(&TypeRef::new("Child", "", "child_mod")).unwrap();

    let report = ctx
        .trigger_hot_reload(&changed(&["Base.src", "Child.src"]))
        .unwrap();
    assert_eq!(report.reloaded, vec!["base_mod", "child_mod"]);

    // Unload order: dependent first, most-depended-upon last.
    assert_eq!(rt.unloaded(), vec!["child_mod", "base_mod"]);
    // Load order is the reverse.
    assert_eq!(rt.loaded(), vec!["base_mod.bin", "child_mod.bin"]);
}

#[test]
fn dependency_cycle_reloads_all_modules_with_warning() {
    let module_a = ModuleMetadata {
        module: "mod_a".to_string(),
        units: vec!["A.src".to_string()],
        classes: vec![TypeDescription::new("A", "mod_a", TypeKind::Class).with_property(
            PropertyDescription::object("other", TypeRef::new("B", "", "mod_b")),
        )],
        ..Default::default()
    };
    let module_b = ModuleMetadata {
        module: "mod_b".to_string(),
        units: vec!["B.src".to_string()],
        classes: vec![TypeDescription::new("B", "mod_b", TypeKind::Class).with_property(
            PropertyDescription::object("other", TypeRef::new("A", "", "mod_a")),
        )],
        ..Default::default()
    };

    let (mut ctx, _rt) = ctx_with(ScriptedRuntime::new());
    ctx.ingest(module_a, "mod_a.bin", ModuleKey(1)).unwrap();
    ctx.ingest(module_b, "mod_b.bin", ModuleKey(2)).unwrap();
    ctx.resolve_type(&TypeRef::new("A", "", "mod_a")).unwrap();
    ctx.resolve_type(&TypeRef::new("B", "", "mod_b")).unwrap();

    let report = ctx
        .trigger_hot_reload(&changed(&["A.src", "B.src"]))
        .unwrap();

    assert!(report.cycle_warning);
    assert_eq!(report.reloaded.len(), 2);
    assert!(report.reloaded.contains(&"mod_a".to_string()));
    assert!(report.reloaded.contains(&"mod_b".to_string()));
    assert!(!ctx.diagnostics.is_empty());
}

#[test]
fn failed_unload_disables_hot_reload_for_the_session() {
    let (mut ctx, _rt) = ctx_with(ScriptedRuntime::new().refusing_unload("game_mod"));
    ctx.ingest(game_module(), "game_mod.bin", ModuleKey(1)).unwrap();

    let err = ctx.trigger_hot_reload(&changed(&["Enemy.src"])).unwrap_err();
    assert!(matches!(err, ReloadError::UnloadFailed(name) if name == "game_mod"));
    assert!(ctx.reloader.is_disabled());
    assert!(ctx.diagnostics.has_blocking());

    // Further requests are rejected outright.
    let err = ctx.trigger_hot_reload(&changed(&["Enemy.src"])).unwrap_err();
    assert!(matches!(err, ReloadError::Disabled));
}

#[test]
fn failed_load_surfaces_without_disabling_the_session() {
    let (mut ctx, _rt) = ctx_with(ScriptedRuntime::new().failing_load("game_mod.bin"));
    ctx.ingest(game_module(), "game_mod.bin", ModuleKey(1)).unwrap();

    let err = ctx.trigger_hot_reload(&changed(&["Enemy.src"])).unwrap_err();
    assert!(matches!(err, ReloadError::LoadFailed(name) if name == "game_mod"));
    assert!(!ctx.reloader.is_disabled());
}

#[test]
fn reload_without_affected_modules_is_a_no_op() {
    let (mut ctx, rt) = ctx_with(ScriptedRuntime::new());
    ctx.ingest(game_module(), "game_mod.bin", ModuleKey(1)).unwrap();

    let report = ctx.trigger_hot_reload(&changed(&["Unknown.src"])).unwrap();
    assert!(report.reloaded.is_empty());
    assert!(rt.unloaded().is_empty());
}

#[test]
fn reload_respects_the_enable_option() {
    let runtime = Arc::new(ScriptedRuntime::new());
    let options = BridgeOptions {
        hot_reload_enabled: false,
        ..Default::default()
    };
    let mut ctx = BridgeContext::with_options(runtime, options);
    ctx.ingest(game_module(), "game_mod.bin", ModuleKey(1)).unwrap();

    let err = ctx.trigger_hot_reload(&changed(&["Enemy.src"])).unwrap_err();
    assert!(matches!(err, ReloadError::NotEnabled));
}
