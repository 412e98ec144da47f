//! Loading module files from disk.
//!
//! Only regular files directly inside the directory whose names end in
//! `.json` are read; subdirectories are skipped. Files load in name order
//! and the first failure aborts the whole load.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::LoadError;
use crate::module::Module;
use crate::parser::parse_module;

/// Read and parse one module file.
pub fn load_module(path: &Path) -> Result<Module, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let module = parse_module(&bytes).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    for (state, target) in module.dangling_targets() {
        warn!(
            module = module.name(),
            state,
            target,
            "Transition target is not a state of this module"
        );
    }
    info!(
        module = module.name(),
        states = module.len(),
        path = %path.display(),
        "Loaded module"
    );
    Ok(module)
}

/// Load every module in `dir`.
pub fn load_modules(dir: &Path) -> Result<Vec<Module>, LoadError> {
    let paths = module_paths(dir)?;
    let mut modules = Vec::with_capacity(paths.len());
    for path in paths {
        modules.push(load_module(&path)?);
    }
    info!(count = modules.len(), dir = %dir.display(), "Module load complete");
    Ok(modules)
}

/// Sorted paths of the module files directly inside `dir`.
fn module_paths(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
