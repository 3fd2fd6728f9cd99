//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `modbridge_core` linkage.
//! - Drive one extension through a simulated host and print what the host saw.
//! - Keep output deterministic for quick local sanity checks.

use modbridge_core::{
    init_logging, ArgumentKind, ArgumentSpec, Arguments, ConfigEntry, Extension,
    ExtensionRegistry, HostContext, LoggingConfig, ModuleHandle, ModuleType, SimulatedHost,
    BRIDGE_API_VERSION,
};
use std::ffi::c_void;
use std::process::ExitCode;
use std::sync::Arc;

const MATH_HANDLE: ModuleHandle = ModuleHandle(1);

unsafe extern "C" fn math_add(_execute_data: *mut c_void, _return_value: *mut c_void) {}
unsafe extern "C" fn math_sub(_execute_data: *mut c_void, _return_value: *mut c_void) {}

fn main() -> ExitCode {
    if let Err(err) = LoggingConfig::from_env().and_then(|config| init_logging(&config)) {
        eprintln!("logging disabled: {err}");
    }

    println!("modbridge_core version={}", modbridge_core::core_version());
    match run_math_lifecycle() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("smoke probe failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_math_lifecycle() -> Result<(), String> {
    let host = Arc::new(SimulatedHost::new());
    let ctx = HostContext::new(Arc::new(ExtensionRegistry::new()), host.clone());

    let binary = || {
        Arguments::new(vec![
            ArgumentSpec::required("a", ArgumentKind::Long),
            ArgumentSpec::required("b", ArgumentKind::Long),
        ])
    };
    let math = Extension::with_registry(&ctx.registry, "math", "1.0", BRIDGE_API_VERSION);
    math.register_function("add", math_add, binary())
        .register_function("sub", math_sub, binary())
        .register_config_entry(ConfigEntry::int("math.precision", 14));
    host.load_module("math", MATH_HANDLE);

    let entry_points = math.descriptor().entry_points;
    let lifecycle = [
        ("startup", entry_points.startup),
        ("request_activate", entry_points.request_activate),
        ("request_deactivate", entry_points.request_deactivate),
        ("shutdown", entry_points.shutdown),
    ];
    for (label, entry) in lifecycle {
        let Some(entry) = entry else {
            return Err(format!("{label} entry point missing"));
        };
        let status = entry.invoke(&ctx, ModuleType::PERSISTENT, MATH_HANDLE);
        println!("lifecycle {label} status={}", status.as_raw());
        if !status.is_success() {
            return Err(format!("{label} reported failure"));
        }
    }

    println!("math locked={} scans={}", math.is_locked(), host.scan_count());
    let snapshot = math.descriptor().snapshot();
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|err| format!("descriptor snapshot serialization failed: {err}"))?;
    println!("{json}");
    Ok(())
}
