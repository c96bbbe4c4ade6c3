//! Foreign runtime interface
//!
//! The bridge drives the foreign runtime exclusively through the
//! [`ForeignRuntime`] trait. In production the trait is backed by a
//! [`CallbackTable`] — a C-compatible table of function pointers installed
//! once at process start by the external runtime host. Tests substitute a
//! scripted implementation.

use std::ffi::CString;
use std::os::raw::c_char;

use crate::{CallStatus, ForeignRef, MethodKey, ModuleKey, TypeKey};

/// Narrow contract over the foreign managed runtime.
///
/// All calls are synchronous call-and-return; the bridge never blocks on
/// foreign I/O through this interface. Implementations may use interior
/// threads, but results must be complete when a method returns.
pub trait ForeignRuntime: Send + Sync {
    /// Allocate a foreign object of the given type, associated with the
    /// host object identified by `host`.
    ///
    /// Returns [`ForeignRef::NULL`] if the type cannot be instantiated.
    fn create_object(&self, host: u64, type_key: TypeKey) -> ForeignRef;

    /// Invoke a method on a foreign object.
    ///
    /// `args` is the flat outgoing argument buffer; `out` is the
    /// caller-sized return buffer (output-parameter slots in declaration
    /// order, then the return slot).
    fn invoke_method(
        &self,
        obj: ForeignRef,
        method: MethodKey,
        args: &[u8],
        out: &mut [u8],
    ) -> CallStatus;

    /// Resolve a method by name on a foreign type.
    fn lookup_method(&self, type_key: TypeKey, name: &str) -> Option<MethodKey>;

    /// Resolve a type by namespace and name within a loaded module.
    fn lookup_type(&self, module: ModuleKey, namespace: &str, name: &str) -> Option<TypeKey>;

    /// Release the foreign object behind a reference.
    ///
    /// Callers guarantee at most one dispose per reference.
    fn dispose(&self, obj: ForeignRef);

    /// Load a foreign module from a path.
    fn load_module(&self, path: &str) -> Option<ModuleKey>;

    /// Ask the runtime to unload a module by name.
    ///
    /// Returns `false` when the runtime still holds references it cannot
    /// break; the caller treats that as terminal for hot reload.
    fn unload_module(&self, name: &str) -> bool;
}

// ============================================================================
// C Callback Table
// ============================================================================

/// C-compatible callback table installed by the external runtime host.
///
/// String parameters are caller-owned null-terminated buffers, valid only
/// for the duration of the call. A zero return from the lookup and load
/// entries means failure.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallbackTable {
    /// `CreateObject(hostObjectPtr, typeHandle) -> foreignHandle`
    pub create_object: unsafe extern "C" fn(host: u64, type_key: u64) -> u64,
    /// `InvokeMethod(foreignHandle, methodHandle, argBuffer, outResultBuffer) -> status`
    pub invoke_method: unsafe extern "C" fn(
        obj: u64,
        method: u64,
        args: *const u8,
        args_len: usize,
        out: *mut u8,
        out_len: usize,
    ) -> i32,
    /// `LookupMethod(typeHandle, methodName) -> methodHandle`
    pub lookup_method: unsafe extern "C" fn(type_key: u64, name: *const c_char) -> u64,
    /// `LookupType(moduleHandle, namespaceStr, typeNameStr) -> typeHandle`
    pub lookup_type: unsafe extern "C" fn(
        module: u64,
        namespace: *const c_char,
        name: *const c_char,
    ) -> u64,
    /// `Dispose(foreignHandle)`
    pub dispose: unsafe extern "C" fn(obj: u64),
    /// `LoadModule(path) -> moduleHandle | 0`
    pub load_module: unsafe extern "C" fn(path: *const c_char) -> u64,
    /// `UnloadModule(name) -> bool success`
    pub unload_module: unsafe extern "C" fn(name: *const c_char) -> i32,
}

/// [`ForeignRuntime`] implementation backed by an installed [`CallbackTable`].
///
/// The table is assumed stable for the process lifetime; the adapter owns
/// no state beyond a copy of the table.
pub struct CallbackRuntime {
    table: CallbackTable,
}

impl CallbackRuntime {
    /// Wrap an installed callback table.
    ///
    /// # Safety
    ///
    /// Every function pointer in `table` must be valid for the lifetime of
    /// the returned runtime and must follow the contracts documented on
    /// [`CallbackTable`].
    pub unsafe fn new(table: CallbackTable) -> Self {
        Self { table }
    }
}

/// Convert a Rust string to a temporary C string, mapping interior NULs to
/// a lookup miss rather than a panic.
fn to_c_string(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

impl ForeignRuntime for CallbackRuntime {
    fn create_object(&self, host: u64, type_key: TypeKey) -> ForeignRef {
        let raw = unsafe { (self.table.create_object)(host, type_key.0) };
        ForeignRef(raw)
    }

    fn invoke_method(
        &self,
        obj: ForeignRef,
        method: MethodKey,
        args: &[u8],
        out: &mut [u8],
    ) -> CallStatus {
        let raw = unsafe {
            (self.table.invoke_method)(
                obj.0,
                method.0,
                args.as_ptr(),
                args.len(),
                out.as_mut_ptr(),
                out.len(),
            )
        };
        CallStatus::from_raw(raw)
    }

    fn lookup_method(&self, type_key: TypeKey, name: &str) -> Option<MethodKey> {
        let c_name = to_c_string(name)?;
        let raw = unsafe { (self.table.lookup_method)(type_key.0, c_name.as_ptr()) };
        if raw == 0 {
            None
        } else {
            Some(MethodKey(raw))
        }
    }

    fn lookup_type(&self, module: ModuleKey, namespace: &str, name: &str) -> Option<TypeKey> {
        let c_ns = to_c_string(namespace)?;
        let c_name = to_c_string(name)?;
        let raw = unsafe { (self.table.lookup_type)(module.0, c_ns.as_ptr(), c_name.as_ptr()) };
        if raw == 0 {
            None
        } else {
            Some(TypeKey(raw))
        }
    }

    fn dispose(&self, obj: ForeignRef) {
        unsafe { (self.table.dispose)(obj.0) }
    }

    fn load_module(&self, path: &str) -> Option<ModuleKey> {
        let c_path = to_c_string(path)?;
        let raw = unsafe { (self.table.load_module)(c_path.as_ptr()) };
        if raw == 0 {
            None
        } else {
            Some(ModuleKey(raw))
        }
    }

    fn unload_module(&self, name: &str) -> bool {
        let Some(c_name) = to_c_string(name) else {
            return false;
        };
        unsafe { (self.table.unload_module)(c_name.as_ptr()) != 0 }
    }
}

// CallbackTable holds plain function pointers.
unsafe impl Send for CallbackRuntime {}
unsafe impl Sync for CallbackRuntime {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    unsafe extern "C" fn stub_create(host: u64, type_key: u64) -> u64 {
        host.wrapping_add(type_key)
    }

    unsafe extern "C" fn stub_invoke(
        _obj: u64,
        _method: u64,
        args: *const u8,
        args_len: usize,
        out: *mut u8,
        out_len: usize,
    ) -> i32 {
        // Echo the argument buffer into the return buffer.
        let n = args_len.min(out_len);
        std::ptr::copy_nonoverlapping(args, out, n);
        0
    }

    unsafe extern "C" fn stub_lookup_method(_type_key: u64, name: *const c_char) -> u64 {
        let name = CStr::from_ptr(name).to_string_lossy();
        if name == "Known" {
            7
        } else {
            0
        }
    }

    unsafe extern "C" fn stub_lookup_type(
        module: u64,
        _ns: *const c_char,
        _name: *const c_char,
    ) -> u64 {
        module
    }

    unsafe extern "C" fn stub_dispose(_obj: u64) {}

    unsafe extern "C" fn stub_load(_path: *const c_char) -> u64 {
        3
    }

    unsafe extern "C" fn stub_unload(_name: *const c_char) -> i32 {
        1
    }

    fn stub_table() -> CallbackTable {
        CallbackTable {
            create_object: stub_create,
            invoke_method: stub_invoke,
            lookup_method: stub_lookup_method,
            lookup_type: stub_lookup_type,
            dispose: stub_dispose,
            load_module: stub_load,
            unload_module: stub_unload,
        }
    }

    #[test]
    fn test_callback_adapter_roundtrip() {
        let rt = unsafe { CallbackRuntime::new(stub_table()) };

        assert_eq!(rt.create_object(40, TypeKey(2)), ForeignRef(42));
        assert_eq!(rt.lookup_method(TypeKey(1), "Known"), Some(MethodKey(7)));
        assert_eq!(rt.lookup_method(TypeKey(1), "Unknown"), None);
        assert_eq!(rt.load_module("a.dll"), Some(ModuleKey(3)));
        assert!(rt.unload_module("a"));

        let args = [1u8, 2, 3, 4];
        let mut out = [0u8; 4];
        let status = rt.invoke_method(ForeignRef(1), MethodKey(7), &args, &mut out);
        assert_eq!(status, CallStatus::Ok);
        assert_eq!(out, args);
    }

    #[test]
    fn test_interior_nul_is_a_miss() {
        let rt = unsafe { CallbackRuntime::new(stub_table()) };
        assert_eq!(rt.lookup_method(TypeKey(1), "bad\0name"), None);
    }
}
