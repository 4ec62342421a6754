//! The C ABI exported by the native physics module.

use std::{ffi::{OsStr, c_int}, sync::Arc};

use libloading::Library;

use crate::error::{AdapterInitError, InitResult};

pub type SizeFn = unsafe extern "C" fn() -> c_int;
pub type RangesFn = unsafe extern "C" fn(*mut f32, *mut f32, *mut f32, *mut f32);
pub type ResetFn = unsafe extern "C" fn(*mut f32);
pub type UpdateFn = unsafe extern "C" fn(*const f32, *mut f32, *mut f32) -> c_int;

const SYM_STATE_SIZE: &str = "getPhysicsStateSize";
const SYM_ACTION_SIZE: &str = "getPhysicsActionSize";
const SYM_RANGES: &str = "getPhysicsRanges";
const SYM_RESET: &str = "resetPhysics";
const SYM_UPDATE: &str = "updatePhysics";

/// The function table of a native simulation.
///
/// Buffer contract for every entry point:
/// * `ranges` writes `state_size` floats to each state buffer and `action_size` floats to
///   each action buffer.
/// * `reset` writes `state_size` floats.
/// * `update` reads `action_size` floats, writes `state_size` floats and one reward, and
///   returns `0` while running, a positive value when the episode is done and a negative
///   value on an unrecoverable fault.
///
/// Pointers are only valid for the duration of the call, the native side must not keep them.
#[derive(Clone)]
pub struct SimulationAbi {
    pub(crate) state_size: SizeFn,
    pub(crate) action_size: SizeFn,
    pub(crate) ranges: RangesFn,
    pub(crate) reset: ResetFn,
    pub(crate) update: UpdateFn,
    // Keeps the symbols above alive.
    _library: Option<Arc<Library>>,
}

impl SimulationAbi {
    /// Creates a table out of plain function pointers.
    ///
    /// # Safety
    /// Every function must honor the buffer contract documented on `SimulationAbi`.
    pub unsafe fn from_fns(
        state_size: SizeFn,
        action_size: SizeFn,
        ranges: RangesFn,
        reset: ResetFn,
        update: UpdateFn,
    ) -> Self {
        Self {
            state_size,
            action_size,
            ranges,
            reset,
            update,
            _library: None,
        }
    }

    /// Opens a dynamic library and resolves the five simulation entry points.
    ///
    /// # Arguments
    /// * `path` - The path of the shared library (`.so`, `.dll`, `.dylib`).
    ///
    /// # Returns
    /// The function table or an error if the library or one of its symbols is missing.
    ///
    /// # Safety
    /// Loading runs the library's initialization code, and the exported functions must
    /// honor the buffer contract documented on `SimulationAbi`.
    pub unsafe fn load<P: AsRef<OsStr>>(path: P) -> InitResult<Self> {
        let library = unsafe { Library::new(path) }.map_err(AdapterInitError::Library)?;

        let abi = unsafe {
            Self {
                state_size: symbol(&library, SYM_STATE_SIZE)?,
                action_size: symbol(&library, SYM_ACTION_SIZE)?,
                ranges: symbol(&library, SYM_RANGES)?,
                reset: symbol(&library, SYM_RESET)?,
                update: symbol(&library, SYM_UPDATE)?,
                _library: None,
            }
        };

        Ok(Self {
            _library: Some(Arc::new(library)),
            ..abi
        })
    }
}

/// Resolves `name` in `library` as a function pointer of type `T`.
///
/// # Safety
/// `T` must be the actual signature of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> InitResult<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|source| AdapterInitError::Symbol { name, source })?;

    Ok(*symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_library_error() {
        let abi = unsafe { SimulationAbi::load("/nonexistent/libphysics.so") };
        assert!(matches!(abi, Err(AdapterInitError::Library(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_without_physics_symbols_is_a_symbol_error() {
        let abi = unsafe { SimulationAbi::load("libc.so.6") };
        match abi {
            Err(AdapterInitError::Symbol { name, .. }) => assert_eq!(name, SYM_STATE_SIZE),
            Err(e) => panic!("expected a missing symbol, got {e}"),
            Ok(_) => panic!("libc does not export a physics simulation"),
        }
    }
}
