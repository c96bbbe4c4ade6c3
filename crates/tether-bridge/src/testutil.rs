//! Scripted foreign runtime for unit tests.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tether_abi::{CallStatus, ForeignRef, ForeignRuntime, MethodKey, ModuleKey, TypeKey};

type Responder = Box<dyn Fn(&[u8], &mut [u8]) -> CallStatus + Send + Sync>;

#[derive(Default)]
struct State {
    next_ref: u64,
    created: Vec<(u64, TypeKey)>,
    disposed: FxHashMap<u64, u32>,
}

/// Foreign runtime stub: allocates sequential references, resolves every
/// lookup deterministically from the name, and answers invocations through
/// an optional scripted responder.
#[derive(Default)]
pub(crate) struct NullRuntime {
    state: Mutex<State>,
    responder: Option<Responder>,
    fail_create: bool,
}

impl NullRuntime {
    pub fn with_responder(
        responder: impl Fn(&[u8], &mut [u8]) -> CallStatus + Send + Sync + 'static,
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

    pub fn created_count(&self) -> usize {
        self.state.lock().created.len()
    }

    pub fn dispose_count(&self, obj: ForeignRef) -> u32 {
        self.state.lock().disposed.get(&obj.0).copied().unwrap_or(0)
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

impl ForeignRuntime for NullRuntime {
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
        _method: MethodKey,
        args: &[u8],
        out: &mut [u8],
    ) -> CallStatus {
        match &self.responder {
            Some(responder) => responder(args, out),
            None => CallStatus::Ok,
        }
    }

    fn lookup_method(&self, type_key: TypeKey, name: &str) -> Option<MethodKey> {
        Some(MethodKey(name_key(&[&type_key.0.to_string(), name])))
    }

    fn lookup_type(&self, _module: ModuleKey, namespace: &str, name: &str) -> Option<TypeKey> {
        Some(TypeKey(name_key(&[namespace, name])))
    }

    fn dispose(&self, obj: ForeignRef) {
        *self.state.lock().disposed.entry(obj.0).or_insert(0) += 1;
    }

    fn load_module(&self, path: &str) -> Option<ModuleKey> {
        Some(ModuleKey(name_key(&[path])))
    }

    fn unload_module(&self, _name: &str) -> bool {
        true
    }
}
