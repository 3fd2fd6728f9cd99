use modbridge_core::{Extension, ModuleType, BRIDGE_API_VERSION};
use modbridge_ffi::thunks::{
    bridge_module_shutdown, bridge_module_startup, bridge_request_shutdown, bridge_request_startup,
};
use modbridge_ffi::{host_installed, module_entry};

#[test]
fn thunks_without_host_fail_startup_and_skip_the_rest() {
    assert!(!host_installed());
    let ext = Extension::new("orphan", "1.0", BRIDGE_API_VERSION);
    let entry = module_entry(&ext);
    assert!(!entry.is_null());

    assert_eq!(bridge_module_startup(ModuleType::PERSISTENT.0, 1), -1);
    assert_eq!(bridge_request_startup(ModuleType::PERSISTENT.0, 1), 0);
    assert_eq!(bridge_request_shutdown(ModuleType::PERSISTENT.0, 1), 0);
    assert_eq!(bridge_module_shutdown(ModuleType::PERSISTENT.0, 1), 0);
    assert!(!ext.is_locked());
}
