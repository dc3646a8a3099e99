use std::ffi::{c_char, c_int, c_void, CStr, OsStr};
use std::os::unix::ffi::OsStrExt as _;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use svlib_contracts::{STATUS_INTERNAL, STATUS_OK};

use crate::error::{BridgeError, Result};

/// Simulator-owned open array (`svOpenArrayHandle` in `svdpi.h`).
pub type svOpenArrayHandle = *mut c_void;

// Provided by the simulator's DPI runtime.
extern "C" {
    fn svDimensions(h: svOpenArrayHandle) -> c_int;
    fn svSize(h: svOpenArrayHandle, d: c_int) -> c_int;
    fn svLow(h: svOpenArrayHandle, d: c_int) -> c_int;
    fn svGetArrElemPtr1(h: svOpenArrayHandle, indx1: c_int) -> *mut c_void;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenArrayShape {
    pub dims: c_int,
    pub size: c_int,
    pub low: c_int,
}

pub(crate) unsafe fn open_array_shape(h: svOpenArrayHandle) -> OpenArrayShape {
    let dims = svDimensions(h);
    if dims != 1 {
        return OpenArrayShape {
            dims,
            size: 0,
            low: 0,
        };
    }
    OpenArrayShape {
        dims,
        size: svSize(h, 1),
        low: svLow(h, 1),
    }
}

pub(crate) unsafe fn open_array_elem(h: svOpenArrayHandle, index: c_int) -> *mut c_void {
    svGetArrElemPtr1(h, index)
}

pub(crate) const EMPTY_CSTR: *const c_char = b"\0".as_ptr() as *const c_char;

#[inline]
pub(crate) unsafe fn put<T>(dst: *mut T, v: T) {
    if !dst.is_null() {
        *dst = v;
    }
}

pub(crate) unsafe fn cstr_bytes<'a>(p: *const c_char, what: &str) -> Result<&'a [u8]> {
    if p.is_null() {
        return Err(BridgeError::InvalidArgument(format!("{what} is null")));
    }
    Ok(CStr::from_ptr(p).to_bytes())
}

pub(crate) unsafe fn cstr_str<'a>(p: *const c_char, what: &str) -> Result<&'a str> {
    std::str::from_utf8(cstr_bytes(p, what)?)
        .map_err(|_| BridgeError::InvalidArgument(format!("{what} is not valid UTF-8")))
}

pub(crate) unsafe fn cstr_path<'a>(p: *const c_char, what: &str) -> Result<&'a Path> {
    let b = cstr_bytes(p, what)?;
    if b.is_empty() {
        return Err(BridgeError::io(
            format!("{what} is empty"),
            std::io::Error::from_raw_os_error(libc::ENOENT),
        ));
    }
    Ok(Path::new(OsStr::from_bytes(b)))
}

pub(crate) fn clamp_c_int(n: usize) -> c_int {
    n.min(c_int::MAX as usize) as c_int
}

/// Runs one export body, turning errors into status codes and keeping panics
/// from unwinding into the simulator.
pub(crate) fn catch_status(name: &'static str, f: impl FnOnce() -> Result<()>) -> c_int {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => STATUS_OK,
        Ok(Err(e)) => {
            log::debug!("svlib: {name}: {e}");
            e.status()
        }
        Err(_) => {
            log::error!("svlib: panic in {name}");
            STATUS_INTERNAL
        }
    }
}
