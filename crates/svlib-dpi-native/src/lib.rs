#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

//! Native half of the svlib DPI bridge.
//!
//! Every export returns a status code (`0` on success, a host errno or one of
//! the bridge codes from `svlib_contracts` otherwise). Returned strings live in
//! a per-thread scratch buffer, or in sequence storage for `svlib_seq_next_v1`,
//! and stay valid until the next call into the library on the same thread.

use std::ffi::{c_char, c_int};

pub mod abi;
pub mod config;
pub mod error;
pub mod errors;
pub mod fs;
pub mod out_array;
pub mod producers;
pub mod regex;
pub mod scratch;
pub mod seq;
pub mod time;

#[cfg(test)]
mod svdpi_mock;

use abi::{catch_status, clamp_c_int, cstr_bytes, cstr_path, cstr_str, put, svOpenArrayHandle, EMPTY_CSTR};
use error::{BridgeError, Result};
use out_array::OutArray;
use producers::Payload;
use scratch::stage_message;
use seq::{Next, NO_HANDLE};

fn stage_result(out: *mut *const c_char, r: Result<*const c_char>) -> Result<()> {
    match r {
        Ok(p) => {
            unsafe { put(out, p) };
            Ok(())
        }
        Err(e) => {
            unsafe { put(out, stage_message(&e.to_string())) };
            Err(e)
        }
    }
}

fn start_sequence(payload: Result<Payload>, hnd: *mut i64, count: *mut c_int) -> Result<()> {
    let (h, n) = seq::begin(payload?)?;
    unsafe {
        put(hnd, h);
        put(count, clamp_c_int(n));
    }
    Ok(())
}

// -------------------------
// Sequences
// -------------------------

#[no_mangle]
pub unsafe extern "C" fn svlib_glob_start_v1(
    pattern: *const c_char,
    hnd: *mut i64,
    count: *mut c_int,
) -> c_int {
    put(hnd, NO_HANDLE);
    put(count, 0);
    catch_status("svlib_glob_start_v1", || {
        let pattern = cstr_str(pattern, "glob pattern")?;
        let payload = producers::expand_glob(pattern, config::config())
            .map(|paths| Payload::glob(pattern, paths));
        start_sequence(payload, hnd, count)
    })
}

#[no_mangle]
pub unsafe extern "C" fn svlib_dir_list_start_v1(
    path: *const c_char,
    hnd: *mut i64,
    count: *mut c_int,
) -> c_int {
    put(hnd, NO_HANDLE);
    put(count, 0);
    catch_status("svlib_dir_list_start_v1", || {
        let dir = cstr_path(path, "directory path")?;
        let payload =
            producers::list_dir(dir, config::config()).map(|names| Payload::dir_list(dir, names));
        start_sequence(payload, hnd, count)
    })
}

/// Yields the next item of `*hnd`. After the last item the following call
/// releases the sequence, sets `*hnd` to `0` and returns an empty item with
/// `*remaining == 0`.
#[no_mangle]
pub unsafe extern "C" fn svlib_seq_next_v1(
    hnd: *mut i64,
    remaining: *mut c_int,
    item: *mut *const c_char,
) -> c_int {
    put(remaining, 0);
    put(item, EMPTY_CSTR);
    catch_status("svlib_seq_next_v1", || {
        if hnd.is_null() {
            return Err(BridgeError::InvalidArgument("handle pointer is null".into()));
        }
        match seq::next(&mut *hnd)? {
            Next::Item { item: p, remaining: r } => {
                put(item, p);
                put(remaining, clamp_c_int(r));
            }
            Next::Terminal => {}
        }
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn svlib_seq_drop_v1(hnd: *mut i64) -> c_int {
    catch_status("svlib_seq_drop_v1", || {
        if hnd.is_null() {
            return Err(BridgeError::InvalidArgument("handle pointer is null".into()));
        }
        seq::drop_handle(&mut *hnd)
    })
}

// -------------------------
// Regex
// -------------------------

/// `matches` receives `(start, end)` pairs for the whole match and each
/// group, as many as it has room for. `*match_count` is the number of groups
/// the pattern defines (whole match included), or `0` when nothing matched.
#[no_mangle]
pub unsafe extern "C" fn svlib_regex_run_v1(
    pattern: *const c_char,
    subject: *const c_char,
    options: c_int,
    start: c_int,
    match_count: *mut c_int,
    matches: svOpenArrayHandle,
    diagnostic: *mut *const c_char,
) -> c_int {
    put(match_count, 0);
    put(diagnostic, EMPTY_CSTR);
    catch_status("svlib_regex_run_v1", || {
        let run = || -> Result<usize> {
            let mut out = OutArray::<i32>::open(matches)?;
            let pattern = std::str::from_utf8(cstr_bytes(pattern, "pattern")?).map_err(|e| {
                BridgeError::PatternCompile(format!(
                    "pattern is not valid UTF-8 at offset {}",
                    e.valid_up_to()
                ))
            })?;
            let subject = cstr_bytes(subject, "subject")?;
            regex::run_match(pattern, subject, options as u32, start, &mut out)
        };
        match run() {
            Ok(n) => {
                put(match_count, clamp_c_int(n));
                Ok(())
            }
            Err(e) => {
                put(diagnostic, stage_message(&e.to_string()));
                Err(e)
            }
        }
    })
}

// -------------------------
// Host wrappers
// -------------------------

/// Never null. Unknown codes get generic text.
#[no_mangle]
pub extern "C" fn svlib_strerror_v1(code: c_int) -> *const c_char {
    std::panic::catch_unwind(|| errors::format_error(code)).unwrap_or_else(|_| {
        log::error!("svlib: panic in svlib_strerror_v1");
        EMPTY_CSTR
    })
}

#[no_mangle]
pub unsafe extern "C" fn svlib_getcwd_v1(result: *mut *const c_char) -> c_int {
    put(result, EMPTY_CSTR);
    catch_status("svlib_getcwd_v1", || stage_result(result, fs::getcwd()))
}

#[no_mangle]
pub unsafe extern "C" fn svlib_time_format_v1(
    epoch_s: i64,
    format: *const c_char,
    result: *mut *const c_char,
) -> c_int {
    put(result, EMPTY_CSTR);
    catch_status("svlib_time_format_v1", || {
        let r = cstr_str(format, "time format").and_then(|f| time::format_timestamp(epoch_s, f));
        stage_result(result, r)
    })
}

#[no_mangle]
pub unsafe extern "C" fn svlib_file_stat_v1(
    path: *const c_char,
    follow_symlink: c_int,
    fields: svOpenArrayHandle,
) -> c_int {
    catch_status("svlib_file_stat_v1", || {
        let mut out = OutArray::<i64>::open(fields)?;
        let path = cstr_path(path, "path")?;
        fs::stat(path, follow_symlink != 0, &mut out)
    })
}

#[no_mangle]
pub unsafe extern "C" fn svlib_mtime_v1(path: *const c_char, mtime: *mut i64) -> c_int {
    put(mtime, 0);
    catch_status("svlib_mtime_v1", || {
        let t = fs::mtime(cstr_path(path, "path")?)?;
        put(mtime, t);
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn svlib_now_v1() -> i64 {
    std::panic::catch_unwind(time::now).unwrap_or_else(|_| {
        log::error!("svlib: panic in svlib_now_v1");
        0
    })
}
