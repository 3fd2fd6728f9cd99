//! Extension identity registry.
//!
//! # Responsibility
//! - Map extension names to live extensions (filled at construction).
//! - Map host module handles to extensions, reconciled lazily by name.
//!
//! # Invariants
//! - `by_handle` may lag the host; a miss triggers one module-table rescan
//!   before the handle is reported unresolved.
//! - Entries are weak: the registry never keeps an extension alive.
//! - The host is never called while the registry lock is held.

use crate::abi::ModuleHandle;
use crate::extension::Extension;
use crate::host::Host;
use log::{debug, info};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

static GLOBAL_REGISTRY: Lazy<Arc<ExtensionRegistry>> =
    Lazy::new(|| Arc::new(ExtensionRegistry::new()));

#[derive(Default)]
struct RegistryMaps {
    by_name: BTreeMap<String, Weak<Extension>>,
    by_handle: BTreeMap<ModuleHandle, Weak<Extension>>,
}

/// Process-wide name/handle index of extensions.
#[derive(Default)]
pub struct ExtensionRegistry {
    maps: Mutex<RegistryMaps>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every extension built with `Extension::new`.
    pub fn global() -> Arc<ExtensionRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Records `extension` under `name`; a later registration wins.
    pub fn register_by_name(&self, name: &str, extension: &Arc<Extension>) {
        let replaced = self
            .lock_maps()
            .by_name
            .insert(name.to_string(), Arc::downgrade(extension))
            .is_some_and(|previous| previous.strong_count() > 0);
        info!(
            "event=extension_registered module=registry status=ok name={} replaced={}",
            name, replaced
        );
    }

    pub fn unregister_by_name(&self, name: &str) {
        if self.lock_maps().by_name.remove(name).is_some() {
            info!(
                "event=extension_unregistered module=registry status=ok name={}",
                name
            );
        }
    }

    /// Removes `name` only while it still maps to `extension`.
    ///
    /// Keeps a newer re-registration under the same name intact when an older
    /// extension is torn down.
    pub(crate) fn unregister_if_current(&self, name: &str, extension: *const Extension) {
        let mut maps = self.lock_maps();
        let is_current = maps
            .by_name
            .get(name)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), extension));
        if is_current {
            maps.by_name.remove(name);
            drop(maps);
            info!(
                "event=extension_unregistered module=registry status=ok name={}",
                name
            );
        }
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<Arc<Extension>> {
        self.lock_maps().by_name.get(name).and_then(Weak::upgrade)
    }

    /// Resolves the extension owning `handle`.
    ///
    /// Looks up the handle map first; on a miss scans `host`'s live module
    /// table, associates every module whose name is registered, then looks
    /// the handle up again.
    pub fn resolve_by_handle(
        &self,
        handle: ModuleHandle,
        host: &dyn Host,
    ) -> Option<Arc<Extension>> {
        if let Some(extension) = self.lookup_handle(handle) {
            return Some(extension);
        }

        let modules = host.loaded_modules();
        let mut matched = 0usize;
        {
            let mut maps = self.lock_maps();
            for module in &modules {
                if let Some(weak) = maps.by_name.get(module.name.as_str()).cloned() {
                    maps.by_handle.insert(module.handle, weak);
                    matched += 1;
                }
            }
        }
        debug!(
            "event=handle_rescan module=registry status=ok handle={} scanned={} matched={}",
            handle,
            modules.len(),
            matched
        );

        self.lookup_handle(handle)
    }

    /// Handles currently associated with a live extension.
    pub fn known_handles(&self) -> Vec<ModuleHandle> {
        self.lock_maps()
            .by_handle
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Count of live extensions registered by name.
    pub fn len(&self) -> usize {
        self.lock_maps()
            .by_name
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup_handle(&self, handle: ModuleHandle) -> Option<Arc<Extension>> {
        self.lock_maps().by_handle.get(&handle).and_then(Weak::upgrade)
    }

    fn lock_maps(&self) -> MutexGuard<'_, RegistryMaps> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ExtensionRegistry;
    use crate::abi::{ModuleHandle, BRIDGE_API_VERSION};
    use crate::extension::Extension;
    use crate::host::SimulatedHost;
    use std::sync::Arc;

    fn registry() -> Arc<ExtensionRegistry> {
        Arc::new(ExtensionRegistry::new())
    }

    #[test]
    fn construction_registers_by_name() {
        let registry = registry();
        let extension = Extension::with_registry(&registry, "sample", "1.0", BRIDGE_API_VERSION);

        let resolved = registry.resolve_by_name("sample").expect("registered by name");
        assert!(Arc::ptr_eq(&resolved, &extension));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_by_handle_rescans_once_then_uses_cache() {
        let registry = registry();
        let host = SimulatedHost::new();
        let extension = Extension::with_registry(&registry, "sample", "1.0", BRIDGE_API_VERSION);
        host.load_module("sample", ModuleHandle(7));

        let first = registry
            .resolve_by_handle(ModuleHandle(7), &host)
            .expect("resolved after rescan");
        assert!(Arc::ptr_eq(&first, &extension));
        assert_eq!(host.scan_count(), 1);

        let second = registry
            .resolve_by_handle(ModuleHandle(7), &host)
            .expect("resolved from handle map");
        assert!(Arc::ptr_eq(&second, &extension));
        assert_eq!(host.scan_count(), 1);
    }

    #[test]
    fn unknown_handle_stays_unresolved_after_rescan() {
        let registry = registry();
        let host = SimulatedHost::new();
        let _extension = Extension::with_registry(&registry, "sample", "1.0", BRIDGE_API_VERSION);
        host.load_module("other", ModuleHandle(4));

        assert!(registry.resolve_by_handle(ModuleHandle(4), &host).is_none());
        assert!(registry.resolve_by_handle(ModuleHandle(9), &host).is_none());
        assert_eq!(host.scan_count(), 2);
    }

    #[test]
    fn rescan_associates_every_registered_module() {
        let registry = registry();
        let host = SimulatedHost::new();
        let _math = Extension::with_registry(&registry, "math", "1.0", BRIDGE_API_VERSION);
        let _text = Extension::with_registry(&registry, "text", "1.0", BRIDGE_API_VERSION);
        host.load_module("math", ModuleHandle(3));
        host.load_module("text", ModuleHandle(5));

        registry
            .resolve_by_handle(ModuleHandle(3), &host)
            .expect("math resolves");
        assert_eq!(
            registry.known_handles(),
            vec![ModuleHandle(3), ModuleHandle(5)]
        );
    }

    #[test]
    fn later_registration_under_same_name_wins() {
        let registry = registry();
        let first = Extension::with_registry(&registry, "sample", "1.0", BRIDGE_API_VERSION);
        let second = Extension::with_registry(&registry, "sample", "2.0", BRIDGE_API_VERSION);

        let resolved = registry.resolve_by_name("sample").expect("registered");
        assert!(Arc::ptr_eq(&resolved, &second));

        drop(first);
        let resolved = registry
            .resolve_by_name("sample")
            .expect("older teardown keeps newer entry");
        assert_eq!(resolved.version(), "2.0");
    }

    #[test]
    fn dropping_extension_unregisters_name() {
        let registry = registry();
        let extension = Extension::with_registry(&registry, "sample", "1.0", BRIDGE_API_VERSION);
        drop(extension);

        assert!(registry.resolve_by_name("sample").is_none());
        assert!(registry.is_empty());
    }
}
