//! Resolving `--require` identifiers to setup modules
//!
//! An identifier is first looked up in the in-process [`ModuleRegistry`]; otherwise it is treated as a path to a
//! `.pf` module file, relative to the loader's base directory (the working directory by default).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::LoadError;
use super::module::{ScriptModule, SetupModule};
use crate::frontend::parse_module;

/// Turns a required-module identifier into a runnable module.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, id: &str) -> Result<Arc<dyn SetupModule>, LoadError>;
}

/// Named in-process modules.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn SetupModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its own name, replacing any previous module of that name.
    pub fn register(&mut self, module: impl SetupModule + 'static) -> &mut Self {
        let module: Arc<dyn SetupModule> = Arc::new(module);
        self.modules.insert(module.name().to_string(), module);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&self, id: &str) -> Result<Arc<dyn SetupModule>, LoadError> {
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::ModuleNotFound(id.to_string()))
    }
}

/// Loads `.pf` module files from disk.
#[derive(Debug, Default, Clone)]
pub struct ScriptLoader {
    base_dir: Option<PathBuf>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identifiers against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, id: &str) -> PathBuf {
        let path = Path::new(id);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ModuleLoader for ScriptLoader {
    #[tracing::instrument(skip(self))]
    fn load(&self, id: &str) -> Result<Arc<dyn SetupModule>, LoadError> {
        let path = self.resolve(id);
        if !path.is_file() {
            return Err(LoadError::ModuleNotFound(id.to_string()));
        }

        let source_text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let script = parse_module(&source_text).map_err(|errors| LoadError::Script {
            path: path.clone(),
            source_text: source_text.clone(),
            errors,
        })?;

        tracing::debug!(
            path = %path.display(),
            setup_steps = script.setup.len(),
            teardown_steps = script.teardown.len(),
            "parsed module file"
        );
        Ok(Arc::new(ScriptModule::new(id, script)))
    }
}

/// Registry first, then module files. This is what the CLI uses.
#[derive(Default)]
pub struct ChainLoader {
    registry: ModuleRegistry,
    scripts: ScriptLoader,
}

impl ChainLoader {
    pub fn new(registry: ModuleRegistry, scripts: ScriptLoader) -> Self {
        Self { registry, scripts }
    }
}

impl ModuleLoader for ChainLoader {
    fn load(&self, id: &str) -> Result<Arc<dyn SetupModule>, LoadError> {
        if self.registry.contains(id) {
            return self.registry.load(id);
        }
        self.scripts.load(id)
    }
}
