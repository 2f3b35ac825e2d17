//! `_getOrLoadModule` glue (§4.6): canonicalises the import path, checks
//! the module cache, and runs a module's main prototype at most once,
//! inserting into the cache before execution so a cyclic re-import sees a
//! partially-executed module instead of recursing forever.

use crate::engine::Engine;
use crate::error::VmResult;
use crate::heap::{Handle, Object};
use crate::objects::ModuleObj;
use crate::value::Value;
use std::path::{Path, PathBuf};

fn canonicalize(path: &str, importer_path: Option<&str>) -> String {
    let candidate = Path::new(path);
    let joined: PathBuf = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        match importer_path.and_then(|p| Path::new(p).parent()) {
            Some(dir) => dir.join(candidate),
            None => candidate.to_path_buf(),
        }
    };
    joined.to_string_lossy().into_owned()
}

/// Loads (if not already cached) and runs (if not already executed or
/// currently executing) the module at `path`, returning its handle and the
/// value its main prototype returned on this call (`Null` if this call
/// found it already executed or mid-execution — a cycle break).
pub fn get_or_load_module(
    engine: &mut Engine,
    path: &str,
    importer_path: Option<&str>,
    is_binary: bool,
) -> VmResult<(Handle, Value)> {
    let canonical = canonicalize(path, importer_path);

    let handle = match engine.modules().get(&canonical).copied() {
        Some(handle) => handle,
        None => {
            if is_binary {
                return Err(crate::error::VmError::load_error(
                    "binary bytecode format is not implemented by the text loader",
                ));
            }
            let source = std::fs::read_to_string(&canonical)?;
            let (main_proto, module_name) =
                crate::loader::text_format::parse_module(engine.heap_mut(), &source, &canonical)?;
            let handle = engine
                .heap_mut()
                .register(Object::Module(ModuleObj::new(module_name, canonical.clone(), main_proto)));
            engine.modules_mut().insert(canonical.clone(), handle);
            handle
        }
    };

    {
        let module = engine.heap().module(handle)?;
        if module.is_executed || module.is_executing {
            return Ok((handle, Value::Null));
        }
    }

    engine.heap_mut().module_mut(handle)?.is_executing = true;
    let result = engine.run_module_main(handle)?;
    let module = engine.heap_mut().module_mut(handle)?;
    module.is_executing = false;
    module.is_executed = true;
    Ok((handle, result))
}
