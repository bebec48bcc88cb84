//! Dynamic plugin loading
//!
//! Loads a plugin shared library built from `tracecompass-plugin` (or any
//! library with the same exports) and registers it through the C ABI.

use anyhow::{Context, Result};
use libloading::Library;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use tracecompass_plugin::ffi::{symbols, PluginVersionFn, RegisterWithFn};
use tracecompass_plugin::CallbackTable;

/// A plugin library kept loaded for as long as its callbacks may run
pub struct LoadedPlugin {
    path: PathBuf,
    version: Option<String>,
    register_with: RegisterWithFn,
    // Must outlive every callback the plugin registered
    _library: Library,
}

impl LoadedPlugin {
    /// Load a plugin library and resolve its registration entry point
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading plugin library: {:?}", path);

        let library = unsafe { Library::new(path) }
            .with_context(|| format!("Failed to load plugin library: {:?}", path))?;

        let register_with: RegisterWithFn = unsafe {
            *library
                .get::<RegisterWithFn>(symbols::REGISTER_WITH)
                .with_context(|| {
                    format!("Plugin {:?} does not export tracecompass_register_with", path)
                })?
        };

        let version = unsafe { library.get::<PluginVersionFn>(symbols::PLUGIN_VERSION) }
            .ok()
            .map(|version_fn| read_version(*version_fn));

        match &version {
            Some(v) => log::info!("Plugin loaded (version {})", v),
            None => log::info!("Plugin loaded (no version export)"),
        }

        Ok(Self {
            path: path.to_path_buf(),
            version,
            register_with,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Register the plugin's callbacks into `table`
    pub fn register(&self, table: &CallbackTable) {
        let api = CallbackTable::c_api();
        unsafe { (self.register_with)(table.session().as_ptr(), &api) }
    }
}

fn read_version(version_fn: PluginVersionFn) -> String {
    let ptr = version_fn();
    if ptr.is_null() {
        return String::from("unknown");
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracecompass_plugin::ffi::tracecompass_plugin_version;

    #[test]
    fn test_load_missing_library() {
        let result = LoadedPlugin::load(Path::new("/nonexistent/libtracecompass_plugin.so"));
        let err = result.err().unwrap();
        assert!(err.to_string().contains("Failed to load plugin library"));
    }

    #[test]
    fn test_read_version_from_linked_plugin() {
        assert_eq!(
            read_version(tracecompass_plugin_version),
            tracecompass_plugin::VERSION
        );
    }
}
