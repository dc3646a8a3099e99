use std::ffi::{c_char, c_int};

use svlib_contracts::bridge_status;

use crate::config::config;
use crate::error::Result;
use crate::scratch::{with_scratch, write_fmt_into, Attempt};

fn strerror_into(code: c_int, buf: &mut [u8]) -> Result<Attempt> {
    let rc = unsafe { libc::strerror_r(code, buf.as_mut_ptr() as *mut c_char, buf.len()) };
    let rc = if rc == -1 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EINVAL)
    } else {
        rc
    };
    match rc {
        0 => {
            let n = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            Ok(Attempt::Done(n))
        }
        libc::ERANGE => Ok(Attempt::Grow),
        _ => Ok(write_fmt_into(buf, format_args!("unknown error {code}"))),
    }
}

fn stage_error_text(code: c_int) -> Result<*const c_char> {
    let cfg = config();
    with_scratch(|s| {
        s.fill(
            cfg.scratch_start_size,
            cfg.scratch_longest,
            "error message",
            |buf| {
                if let Some(st) = bridge_status(code) {
                    return Ok(write_fmt_into(buf, format_args!("{}", st.text)));
                }
                strerror_into(code, buf)
            },
        )
        .map(|b| b.as_ptr() as *const c_char)
    })
}

/// Text for a status code returned by any bridge function. Bridge-specific
/// codes use their own wording, everything else is the host's `strerror`.
pub fn format_error(code: c_int) -> *const c_char {
    match stage_error_text(code) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("svlib: no text for status {code}: {e}");
            crate::scratch::stage_message(&format!("error {code}"))
        }
    }
}
