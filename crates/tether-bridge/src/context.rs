//! Bridge context
//!
//! One [`BridgeContext`] per process in production, as many as needed in
//! tests. The context owns every process-wide structure — type registry,
//! identity map, host heap, module tracker, reload state, diagnostics —
//! and is threaded explicitly through all operations; there are no static
//! singletons. All mutation of shared state goes through the narrow
//! contracts on these fields from a single logical owning thread.

use std::sync::Arc;

use tether_abi::meta::TypeRef;
use tether_abi::{ForeignRuntime, ModuleKey, ModuleMetadata};

use crate::descriptor::{DescriptorId, DescriptorState};
use crate::diag::Diagnostics;
use crate::handle::Handle;
use crate::host::{HostHeap, HostObjectId};
use crate::identity::{self, IdentityBridge};
use crate::invoke;
use crate::modules::ModuleTracker;
use crate::registry::{self, TypeRegistry};
use crate::reload::{self, HotReloader, ReloadError, ReloadReport};
use crate::{BridgeError, BridgeResult};

/// Tunables for one bridge context.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Whether hot reload is available at all.
    pub hot_reload_enabled: bool,
    /// Promote a missing declared interface from a warning to a build
    /// error.
    pub strict_interfaces: bool,
    /// How many reload batches may queue behind an in-flight reload before
    /// further requests are dropped.
    pub max_queued_reloads: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            hot_reload_enabled: true,
            strict_interfaces: false,
            max_queued_reloads: 4,
        }
    }
}

fn zero_init(_data: &mut [u8]) {}

/// Process context owning all bridge state.
pub struct BridgeContext {
    /// The foreign runtime behind the boundary.
    pub runtime: Arc<dyn ForeignRuntime>,
    /// Owner of all type descriptors.
    pub registry: TypeRegistry,
    /// Host-identity to foreign-twin mapping.
    pub identity: IdentityBridge,
    /// Host object storage.
    pub heap: HostHeap,
    /// Loaded-module bookkeeping.
    pub modules: ModuleTracker,
    /// Hot-reload state machine.
    pub reloader: HotReloader,
    /// User-surfaced diagnostics.
    pub diagnostics: Diagnostics,
    /// Context tunables.
    pub options: BridgeOptions,
    object_root: DescriptorId,
    interface_root: DescriptorId,
}

impl BridgeContext {
    /// Create a context with default options.
    pub fn new(runtime: Arc<dyn ForeignRuntime>) -> Self {
        Self::with_options(runtime, BridgeOptions::default())
    }

    /// Create a context, seeding the native roots every synthesized chain
    /// terminates on.
    pub fn with_options(runtime: Arc<dyn ForeignRuntime>, options: BridgeOptions) -> Self {
        let mut registry = TypeRegistry::new();
        let object_root = registry.register_native_class("Object", "core", None, 0, zero_init);
        let interface_root = registry.register_native_interface("Interface", "core");
        Self {
            runtime,
            registry,
            identity: IdentityBridge::new(),
            heap: HostHeap::new(),
            modules: ModuleTracker::new(),
            reloader: HotReloader::new(),
            diagnostics: Diagnostics::new(),
            options,
            object_root,
            interface_root,
        }
    }

    /// The native root class all synthesized classes ultimately inherit.
    pub fn object_root(&self) -> DescriptorId {
        self.object_root
    }

    /// The abstract base all synthesized interfaces parent to.
    pub fn interface_root(&self) -> DescriptorId {
        self.interface_root
    }

    // ========================================================================
    // Public Surface
    // ========================================================================

    /// Register a loaded module's metadata and replay any builds that were
    /// waiting on its types.
    pub fn ingest(
        &mut self,
        metadata: ModuleMetadata,
        path: impl Into<String>,
        key: ModuleKey,
    ) -> BridgeResult<()> {
        for desc in metadata.descriptions() {
            self.registry.register_description(desc.clone());
        }
        let module = metadata.module.clone();
        self.modules.register(metadata, path, key);
        registry::module_available(self, &module)
    }

    /// Resolve a type reference to a built descriptor.
    pub fn resolve_type(&mut self, tref: &TypeRef) -> BridgeResult<DescriptorId> {
        registry::resolve(self, tref)
    }

    /// Find the foreign twin for a host object, creating one on first use.
    pub fn find_or_create_twin(&mut self, host: HostObjectId) -> BridgeResult<Handle> {
        identity::find_or_create_twin(self, host)
    }

    /// Invoke a named function on a host object through the bridge.
    pub fn invoke(
        &mut self,
        host: HostObjectId,
        function: &str,
        frame: &mut [u8],
    ) -> BridgeResult<()> {
        invoke::invoke(self, host, function, frame)
    }

    /// Tear down and rebuild the modules containing the changed source
    /// units, in dependency order.
    pub fn trigger_hot_reload(&mut self, changed_units: &[String]) -> Result<ReloadReport, ReloadError> {
        reload::trigger_reload(self, changed_units)
    }

    // ========================================================================
    // Host Object Lifecycle
    // ========================================================================

    /// Construct a host object through the normal construction path.
    ///
    /// For synthesized classes the constructor hook runs: the nearest
    /// native ancestor's initializer first, then foreign twin creation.
    pub fn construct(&mut self, class: DescriptorId) -> BridgeResult<HostObjectId> {
        let (instantiable, defaults) = {
            let desc = self.registry.descriptor(class);
            let instantiable = desc.kind == tether_abi::meta::TypeKind::Class
                && desc.state == DescriptorState::UpToDate
                && !desc.flags.contains(tether_abi::meta::TypeFlags::ABSTRACT);
            (instantiable, desc.defaults.clone())
        };
        if !instantiable {
            return Err(BridgeError::NotInstantiable(
                self.registry.descriptor(class).qualified_name(),
            ));
        }

        let host = self.heap.allocate(class, defaults);
        match self.registry.descriptor(class).ctor {
            Some(hook) => {
                if let Some(init) = self.registry.descriptor(hook.native_ancestor).native_init {
                    if let Some(obj) = self.heap.object_mut(host) {
                        init(&mut obj.data);
                    }
                }
                identity::create_foreign_twin(self, host, class)?;
            }
            None => {
                // Native class: its own initializer, no twin.
                if let Some(init) = self.registry.descriptor(class).native_init {
                    if let Some(obj) = self.heap.object_mut(host) {
                        init(&mut obj.data);
                    }
                }
            }
        }
        Ok(host)
    }

    /// Destroy a host object: the twin mapping is removed and disposed,
    /// then storage is released.
    pub fn destroy(&mut self, host: HostObjectId) {
        identity::remove_twin(self, host);
        self.heap.release(host);
    }

    /// Drain queued off-thread deletion notifications.
    pub fn drain_destroyed(&mut self) -> usize {
        identity::drain_destroyed(self)
    }
}
