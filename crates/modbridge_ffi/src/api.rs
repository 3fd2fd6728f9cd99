//! C-facing bridge API.
//!
//! # Responsibility
//! - Install the native host's callbacks as the process-wide host.
//! - Hand out stable module-entry pointers for registered extensions.
//! - Expose logging bootstrap and version probes.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - A module-entry pointer, once returned, stays valid for the process
//!   lifetime, even if the descriptor is later rebuilt.
//! - Extensions must live in the process-wide registry; the thunks resolve
//!   handles there.

use crate::host::{CallbackHost, HostCallbacks};
use crate::raw::{RawModule, RawModuleEntry};
use crate::thunks;
use log::{error, info};
use modbridge_core::{
    core_version as core_version_inner, init_logging, Extension, ExtensionRegistry, HostContext,
    LoggingConfig,
};
use std::collections::BTreeMap;
use std::ffi::{c_char, c_int, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static MODULE_CACHE: Mutex<ModuleCache> = Mutex::new(ModuleCache::new());
static CORE_VERSION: OnceLock<CString> = OnceLock::new();

struct ModuleCache {
    current: BTreeMap<String, Box<RawModule>>,
    retired: Vec<Box<RawModule>>,
}

impl ModuleCache {
    const fn new() -> Self {
        Self {
            current: BTreeMap::new(),
            retired: Vec::new(),
        }
    }
}

/// Installs `callbacks` as the host for every lifecycle thunk.
///
/// # FFI contract
/// - Must run before the host calls any module startup.
/// - Only the first installation wins; later calls return an error.
pub fn install_host(callbacks: HostCallbacks) -> Result<(), String> {
    let ctx = HostContext::with_global_registry(Arc::new(CallbackHost::new(callbacks)));
    thunks::install_context(ctx).map_err(|_| "host callbacks already installed".to_string())?;
    info!("event=host_installed module=ffi status=ok");
    Ok(())
}

/// C entry for `install_host`. Returns `0` on success, `-1` otherwise.
///
/// # Safety
/// `callbacks` must be null or point to a valid `HostCallbacks`.
#[no_mangle]
pub unsafe extern "C" fn modbridge_install_host(callbacks: *const HostCallbacks) -> c_int {
    if callbacks.is_null() {
        return -1;
    }
    let callbacks = *callbacks;
    let outcome = panic::catch_unwind(|| install_host(callbacks));
    match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            error!("event=host_installed module=ffi status=error error={err}");
            -1
        }
        Err(_) => -1,
    }
}

/// Whether `install_host` has succeeded in this process.
pub fn host_installed() -> bool {
    thunks::host_installed()
}

/// Returns the module entry for `extension`, building it on first use.
///
/// # FFI contract
/// - Returns null when a name cannot be passed to the host.
/// - Repeated calls return the same pointer while the descriptor is unchanged.
pub fn module_entry(extension: &Extension) -> *const RawModuleEntry {
    let descriptor = extension.descriptor();
    let mut cache = lock_cache();
    if let Some(module) = cache.current.get(extension.name()) {
        if Arc::ptr_eq(module.descriptor(), &descriptor) {
            return module.entry();
        }
    }

    let module = match RawModule::build(descriptor) {
        Ok(module) => Box::new(module),
        Err(err) => {
            error!(
                "event=descriptor_built module=ffi status=error name={} error={}",
                extension.name(),
                err
            );
            return ptr::null();
        }
    };
    let pointer: *const RawModuleEntry = module.entry();
    if let Some(previous) = cache.current.insert(extension.name().to_string(), module) {
        cache.retired.push(previous);
    }
    pointer
}

/// C entry resolving an extension by name in the process-wide registry.
///
/// # Safety
/// `name` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn modbridge_module_entry(name: *const c_char) -> *const RawModuleEntry {
    if name.is_null() {
        return ptr::null();
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return ptr::null();
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        ExtensionRegistry::global()
            .resolve_by_name(name)
            .map_or(ptr::null(), |extension| module_entry(&extension))
    }));
    outcome.unwrap_or(ptr::null())
}

/// Initializes logging from `MODBRIDGE_LOG_LEVEL` and `MODBRIDGE_LOG_DIR`.
///
/// # FFI contract
/// - Safe to call repeatedly with an unchanged environment.
/// - Never panics; returns empty string on success and error message on failure.
pub fn init_logging_from_env() -> String {
    match LoggingConfig::from_env().and_then(|config| init_logging(&config)) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// C entry for `init_logging_from_env`. Returns `0` on success, `-1` otherwise.
#[no_mangle]
pub extern "C" fn modbridge_init_logging() -> c_int {
    match panic::catch_unwind(init_logging_from_env) {
        Ok(message) if message.is_empty() => 0,
        _ => -1,
    }
}

/// Expose core crate version.
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// C entry for `core_version`; the returned string is static.
#[no_mangle]
pub extern "C" fn modbridge_core_version() -> *const c_char {
    CORE_VERSION
        .get_or_init(|| CString::new(core_version_inner()).unwrap_or_default())
        .as_ptr()
}

fn lock_cache() -> MutexGuard<'static, ModuleCache> {
    MODULE_CACHE.lock().unwrap_or_else(PoisonError::into_inner)
}
