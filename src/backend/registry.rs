//! Dynamic plugin discovery: locate a shared
//! object by canonical filename, read its ops-table symbol, and hand back
//! a [`PluginInfo`] plus the constructor it exposes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use thiserror::Error;

use crate::backend::plugin::{Capability, PluginInfo, Version};
use crate::backend::Backend;

/// Errors encountered while discovering or loading a plugin.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No shared object matching the plugin's canonical filename was
    /// found under any registered search directory.
    #[error("no plugin named {0:?} found")]
    NotFound(String),
    /// The shared object exists but could not be loaded.
    #[error("failed to load plugin {name:?} from {path:?}: {source}")]
    Load {
        name: String,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    /// The shared object loaded but was missing its entry-point symbol.
    #[error("plugin {name:?} does not export the required entry point: {source}")]
    MissingSymbol {
        name: String,
        #[source]
        source: libloading::Error,
    },
}

/// The canonical per-plugin entry point: a `register` function returning
/// the plugin's static identity plus a constructor for a fresh backend
/// instance. Plugins export this under the symbol name
/// [`ENTRY_POINT_SYMBOL`].
pub type RegisterFn = unsafe extern "C" fn() -> (PluginInfo, fn() -> Box<dyn Backend>);

/// The symbol every plugin shared object must export.
pub const ENTRY_POINT_SYMBOL: &[u8] = b"rbh_plugin_register\0";

/// A loaded plugin: its identity plus the library keeping its code
/// mapped and a constructor for new backend instances.
pub struct LoadedPlugin {
    info: PluginInfo,
    constructor: fn() -> Box<dyn Backend>,
    _library: Library,
}

impl LoadedPlugin {
    /// This plugin's identity.
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Construct a fresh backend instance from this plugin.
    pub fn construct(&self) -> Box<dyn Backend> {
        (self.constructor)()
    }
}

/// Discovers and caches plugins by canonical filename across a set of
/// search directories, in registration order (earlier directories shadow
/// later ones, the way a `PATH`-style search works).
#[derive(Default)]
pub struct PluginRegistry {
    search_dirs: Vec<PathBuf>,
    loaded: HashMap<String, LoadedPlugin>,
}

impl PluginRegistry {
    /// A registry with no search directories.
    pub fn new() -> Self {
        Self {
            search_dirs: Vec::new(),
            loaded: HashMap::new(),
        }
    }

    /// Append a directory to search for plugin shared objects.
    pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
        self.search_dirs.push(dir.into());
    }

    /// The canonical filename for a plugin named `name` (e.g.
    /// `librbh-posix.so` on Linux).
    fn canonical_filename(name: &str) -> String {
        format!(
            "{}rbh-{}{}",
            std::env::consts::DLL_PREFIX,
            name,
            std::env::consts::DLL_SUFFIX
        )
    }

    /// Load (or return the cached) plugin named `name`.
    pub fn load(&mut self, name: &str) -> std::result::Result<&LoadedPlugin, RegistryError> {
        if !self.loaded.contains_key(name) {
            let loaded = self.load_uncached(name)?;
            self.loaded.insert(name.to_string(), loaded);
        }
        Ok(self.loaded.get(name).expect("just inserted"))
    }

    fn load_uncached(&self, name: &str) -> std::result::Result<LoadedPlugin, RegistryError> {
        let filename = Self::canonical_filename(name);
        let path = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(&filename))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        self.load_from_path(name, &path)
    }

    fn load_from_path(
        &self,
        name: &str,
        path: &Path,
    ) -> std::result::Result<LoadedPlugin, RegistryError> {
        // SAFETY: the framework trusts operator-configured search
        // directories to contain well-formed rbh plugins; this mirrors
        // every other dlopen-based plugin loader in the ecosystem.
        let library = unsafe { Library::new(path) }.map_err(|source| RegistryError::Load {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        let register: Symbol<RegisterFn> = unsafe { library.get(ENTRY_POINT_SYMBOL) }
            .map_err(|source| RegistryError::MissingSymbol {
                name: name.to_string(),
                source,
            })?;
        let (info, constructor) = unsafe { register() };
        Ok(LoadedPlugin {
            info,
            constructor,
            _library: library,
        })
    }

    /// Every plugin currently loaded, by name.
    pub fn loaded(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.loaded.values()
    }
}

/// A statically-linked plugin, registered directly rather than discovered
/// through `dlopen` — used for the built-in POSIX and memory-target
/// backends, which ship with the framework instead of as `.so` files.
pub struct StaticPlugin {
    pub info: PluginInfo,
    pub constructor: fn() -> Box<dyn Backend>,
}

pub fn builtin_info(name: &str, capabilities: Capability) -> PluginInfo {
    PluginInfo {
        name: name.to_string(),
        version: Version::new(4, 0, 0),
        capabilities,
        info_mask: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_filename_uses_platform_affixes() {
        let filename = PluginRegistry::canonical_filename("posix");
        assert!(filename.contains("rbh-posix"));
    }

    #[test]
    fn missing_plugin_reports_not_found() {
        let mut registry = PluginRegistry::new();
        registry.add_search_dir("/nonexistent/does/not/exist");
        let err = registry.load("posix").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(name) if name == "posix"));
    }
}
