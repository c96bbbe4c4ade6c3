//! Scripted foreign runtime shared by the integration suites.

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tether_abi::{CallStatus, ForeignRef, ForeignRuntime, MethodKey, ModuleKey, TypeKey};

type Responder = Box<dyn Fn(&str, &[u8], &mut [u8]) -> CallStatus + Send + Sync>;

#[derive(Default)]
struct State {
    next_ref: u64,
    created: Vec<(u64, TypeKey)>,
    disposed: FxHashMap<u64, u32>,
    methods: FxHashMap<u64, String>,
    loaded: Vec<String>,
    unloaded: Vec<String>,
}

/// Foreign runtime stub with deterministic lookups and a per-call
/// responder keyed by method name.
#[derive(Default)]
pub struct ScriptedRuntime {
    state: Mutex<State>,
    responder: Option<Responder>,
    fail_create: bool,
    refuse_unload: FxHashSet<String>,
    fail_load: FxHashSet<String>,
}

#[allow(dead_code)]
impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder(
        responder: impl Fn(&str, &[u8], &mut [u8]) -> CallStatus + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Default::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn refusing_unload(mut self, module: &str) -> Self {
        self.refuse_unload.insert(module.to_string());
        self
    }

    pub fn failing_load(mut self, path: &str) -> Self {
        self.fail_load.insert(path.to_string());
        self
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().created.len()
    }

    pub fn dispose_count(&self, obj: ForeignRef) -> u32 {
        self.state.lock().disposed.get(&obj.0).copied().unwrap_or(0)
    }

    pub fn total_disposed(&self) -> u32 {
        self.state.lock().disposed.values().sum()
    }

    pub fn loaded(&self) -> Vec<String> {
        self.state.lock().loaded.clone()
    }

    pub fn unloaded(&self) -> Vec<String> {
        self.state.lock().unloaded.clone()
    }
}

fn name_key(parts: &[&str]) -> u64 {
    let mut hash: u64 = 5381;
    for part in parts {
        for byte in part.bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
        }
        hash = hash.wrapping_mul(33).wrapping_add(b'.' as u64);
    }
    hash | 1
}

impl ForeignRuntime for ScriptedRuntime {
    fn create_object(&self, host: u64, type_key: TypeKey) -> ForeignRef {
        if self.fail_create {
            return ForeignRef::NULL;
        }
        let mut state = self.state.lock();
        state.next_ref += 1;
        let obj = ForeignRef(0x1000 + state.next_ref);
        state.created.push((host, type_key));
        obj
    }

    fn invoke_method(
        &self,
        _obj: ForeignRef,
        method: MethodKey,
        args: &[u8],
        out: &mut [u8],
    ) -> CallStatus {
        let name = self
            .state
            .lock()
            .methods
            .get(&method.0)
            .cloned()
            .unwrap_or_default();
        match &self.responder {
            Some(responder) => responder(&name, args, out),
            None => CallStatus::Ok,
        }
    }

    fn lookup_method(&self, type_key: TypeKey, name: &str) -> Option<MethodKey> {
        let key = name_key(&[&type_key.0.to_string(), name]);
        self.state.lock().methods.insert(key, name.to_string());
        Some(MethodKey(key))
    }

    fn lookup_type(&self, _module: ModuleKey, namespace: &str, name: &str) -> Option<TypeKey> {
        Some(TypeKey(name_key(&[namespace, name])))
    }

    fn dispose(&self, obj: ForeignRef) {
        *self.state.lock().disposed.entry(obj.0).or_insert(0) += 1;
    }

    fn load_module(&self, path: &str) -> Option<ModuleKey> {
        if self.fail_load.contains(path) {
            return None;
        }
        self.state.lock().loaded.push(path.to_string());
        Some(ModuleKey(name_key(&[path])))
    }

    fn unload_module(&self, name: &str) -> bool {
        if self.refuse_unload.contains(name) {
            return false;
        }
        self.state.lock().unloaded.push(name.to_string());
        true
    }
}
