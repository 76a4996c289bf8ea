use crate::Core::error::BridgeError;
use crate::Core::local::LocalRuntime;
use crate::Msg::{BufLock, Data, Env, PayloadMsg};
use lazy_static::lazy_static;
use std::ffi::{c_char, CStr};
use std::ptr;

// Error codes
pub const AXIS_SUCCESS: i32 = 0;
pub const AXIS_ERROR_NULL_POINTER: i32 = -1;
pub const AXIS_ERROR_INVALID_ARG: i32 = -2;
pub const AXIS_ERROR_ALREADY_LOCKED: i32 = -3;
pub const AXIS_ERROR_NOT_LOCKED: i32 = -4;
pub const AXIS_ERROR_TOKEN_MISMATCH: i32 = -5;
pub const AXIS_ERROR_BUFFER_TOO_SMALL: i32 = -6;
pub const AXIS_ERROR_INTERNAL: i32 = -7;

lazy_static! {
    // Every FFI message lives in this env, backed by an in-process runtime.
    static ref DEFAULT_ENV: crate::Core::error::Result<Env> = Env::new(LocalRuntime::with_defaults());
}

fn error_code(e: &BridgeError) -> i32 {
    match e {
        BridgeError::InvalidArgument(_) => AXIS_ERROR_INVALID_ARG,
        BridgeError::AlreadyLocked => AXIS_ERROR_ALREADY_LOCKED,
        BridgeError::NotLocked => AXIS_ERROR_NOT_LOCKED,
        BridgeError::TokenMismatch => AXIS_ERROR_TOKEN_MISMATCH,
        _ => AXIS_ERROR_INTERNAL,
    }
}

/// Handle to a data message (opaque pointer)
///
/// Owns the outstanding buffer lock, if any, so the C side only ever sees
/// the raw region and the lock generation.
pub struct AxisMsgHandle {
    inner: Data,
    lock: Option<BufLock>,
}

/// Create a new data message on the default env.
///
/// # Arguments
/// * `name` - NUL-terminated, non-empty UTF-8 name.
///
/// # Returns
/// * Pointer to `AxisMsgHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn axis_bridge_data_new(name: *const c_char) -> *mut AxisMsgHandle {
    if name.is_null() {
        return ptr::null_mut();
    }
    let name = match unsafe { CStr::from_ptr(name) }.to_str() {
        Ok(name) => name,
        Err(_) => {
            log::error!("FFI: data name is not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let env = match DEFAULT_ENV.as_ref() {
        Ok(env) => env,
        Err(e) => {
            log::error!("FFI: default env unavailable: {}", e);
            return ptr::null_mut();
        }
    };

    match Data::create(env, name) {
        Ok(data) => Box::into_raw(Box::new(AxisMsgHandle {
            inner: data,
            lock: None,
        })),
        Err(e) => {
            log::error!("FFI: failed to create data '{}': {}", name, e);
            ptr::null_mut()
        }
    }
}

/// Allocate (or reallocate) a zeroed buffer of `size` bytes.
#[no_mangle]
pub extern "C" fn axis_bridge_msg_alloc_buf(handle: *mut AxisMsgHandle, size: usize) -> i32 {
    if handle.is_null() {
        return AXIS_ERROR_NULL_POINTER;
    }
    let h = unsafe { &*handle };
    match h.inner.alloc_buf(size) {
        Ok(()) => AXIS_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Lock the buffer for writing.
///
/// # Arguments
/// * `out_ptr` - Receives the start of the writable region.
/// * `out_len` - Receives its length.
/// * `out_token` - Receives the lock token to pass to `axis_bridge_msg_unlock_buf`.
///
/// # Returns
/// * 0 on success, negative error code otherwise.
#[no_mangle]
pub extern "C" fn axis_bridge_msg_lock_buf(
    handle: *mut AxisMsgHandle,
    out_ptr: *mut *mut u8,
    out_len: *mut usize,
    out_token: *mut u64,
) -> i32 {
    if handle.is_null() || out_ptr.is_null() || out_len.is_null() || out_token.is_null() {
        return AXIS_ERROR_NULL_POINTER;
    }
    let h = unsafe { &mut *handle };
    if h.lock.is_some() {
        return AXIS_ERROR_ALREADY_LOCKED;
    }

    match h.inner.lock_buf() {
        Ok(mut lock) => {
            unsafe {
                *out_ptr = lock.as_mut_ptr();
                *out_len = lock.len();
                *out_token = lock.generation();
            }
            h.lock = Some(lock);
            AXIS_SUCCESS
        }
        Err(e) => error_code(&e),
    }
}

/// Release the lock identified by `token`.
#[no_mangle]
pub extern "C" fn axis_bridge_msg_unlock_buf(handle: *mut AxisMsgHandle, token: u64) -> i32 {
    if handle.is_null() {
        return AXIS_ERROR_NULL_POINTER;
    }
    let h = unsafe { &mut *handle };
    match h.lock.as_ref() {
        None => return AXIS_ERROR_NOT_LOCKED,
        Some(lock) if lock.generation() != token => return AXIS_ERROR_TOKEN_MISMATCH,
        Some(_) => {}
    }

    match h.lock.take().map(|lock| h.inner.unlock_buf(lock)) {
        Some(Ok(())) => AXIS_SUCCESS,
        Some(Err(e)) => error_code(&e),
        None => AXIS_ERROR_NOT_LOCKED,
    }
}

/// Copy the buffer into `out_buf`.
///
/// # Arguments
/// * `out_buf` - Destination, at least `*in_out_len` bytes.
/// * `in_out_len` - Capacity on entry; bytes written (or needed) on exit.
///
/// # Returns
/// * 0 on success, `AXIS_ERROR_BUFFER_TOO_SMALL` with the needed size in
///   `*in_out_len`, or another negative error code.
#[no_mangle]
pub extern "C" fn axis_bridge_msg_get_buf(
    handle: *mut AxisMsgHandle,
    out_buf: *mut u8,
    in_out_len: *mut usize,
) -> i32 {
    if handle.is_null() || in_out_len.is_null() {
        return AXIS_ERROR_NULL_POINTER;
    }
    let h = unsafe { &*handle };
    let bytes = match h.inner.get_buf() {
        Ok(bytes) => bytes,
        Err(e) => return error_code(&e),
    };

    let capacity = unsafe { *in_out_len };
    unsafe { *in_out_len = bytes.len() };
    if bytes.len() > capacity {
        return AXIS_ERROR_BUFFER_TOO_SMALL;
    }
    if bytes.is_empty() {
        return AXIS_SUCCESS;
    }
    if out_buf.is_null() {
        return AXIS_ERROR_NULL_POINTER;
    }
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), out_buf, bytes.len()) };
    AXIS_SUCCESS
}

/// Free a message handle. An outstanding lock is released with it.
#[no_mangle]
pub extern "C" fn axis_bridge_msg_free(handle: *mut AxisMsgHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}
