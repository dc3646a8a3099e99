//! Growable scratch buffer used to hand strings back to the caller.
//!
//! Each thread owns one buffer. Its capacity only ever grows, and every staged
//! string lives in it until the next call on the same thread reuses or grows
//! it, so callers must copy results out before calling in again.

use std::cell::RefCell;
use std::ffi::c_char;
use std::fmt;

use crate::abi::EMPTY_CSTR;
use crate::config::config;
use crate::error::{BridgeError, Result};

pub struct ScratchBuffer {
    buf: Vec<u8>,
    start_size: usize,
}

/// Outcome of one attempt to write into the buffer.
pub enum Attempt {
    /// Wrote `n` bytes, not counting any terminator.
    Done(usize),
    /// The buffer was too small; grow and try again.
    Grow,
}

impl ScratchBuffer {
    pub fn new(start_size: usize) -> Self {
        ScratchBuffer {
            buf: Vec::new(),
            start_size: start_size.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// `0` returns the current buffer (creating it at the start size if there
    /// is none), a negative size doubles it, and a positive size grows it to at
    /// least that many bytes. Allocation failure is logged and leaves the
    /// previous buffer in place, so callers must re-check `capacity()`.
    pub fn acquire(&mut self, requested: i32) -> &mut [u8] {
        let target = if self.buf.is_empty() && requested <= 0 {
            self.start_size
        } else if requested == 0 {
            return &mut self.buf;
        } else if requested < 0 {
            self.buf.len().saturating_mul(2)
        } else {
            requested as usize
        };
        if self.buf.len() < target {
            self.replace(target);
        }
        &mut self.buf
    }

    fn replace(&mut self, size: usize) {
        let mut next: Vec<u8> = Vec::new();
        if let Err(e) = next.try_reserve_exact(size) {
            log::error!(
                "svlib: cannot grow scratch buffer to {size} bytes ({e}); keeping {} bytes",
                self.buf.len()
            );
            return;
        }
        next.resize(size, 0);
        log::trace!("svlib: scratch buffer {} -> {size} bytes", self.buf.len());
        self.buf = next;
    }

    /// Runs `attempt` against the whole buffer, doubling it whenever the
    /// attempt reports it ran out of room. Gives up with `Overflow` once the
    /// buffer has reached `longest` bytes. The result is NUL-terminated in the
    /// buffer; the returned slice excludes the terminator.
    pub fn fill(
        &mut self,
        start: usize,
        longest: usize,
        what: &'static str,
        mut attempt: impl FnMut(&mut [u8]) -> Result<Attempt>,
    ) -> Result<&[u8]> {
        let longest = longest.max(1);
        let mut want = start.clamp(1, longest);
        loop {
            let req = want.min(i32::MAX as usize) as i32;
            // An earlier, larger request may have left more room than allowed.
            let cap = self.acquire(req).len().min(longest);
            let done = match attempt(&mut self.buf[..cap])? {
                Attempt::Done(n) if n < cap => Some(n),
                _ => None,
            };
            if let Some(n) = done {
                self.buf[n] = 0;
                return Ok(&self.buf[..n]);
            }
            if cap >= longest {
                return Err(BridgeError::Overflow {
                    what,
                    limit: longest,
                });
            }
            if cap < want {
                return Err(BridgeError::OutOfMemory);
            }
            want = cap.saturating_mul(2).min(longest);
        }
    }

    /// Stages `text` as a C string, truncating it when it does not fit within
    /// `longest` bytes.
    pub fn stage_lossy(&mut self, text: &str, longest: usize) -> *const c_char {
        let start = self.start_size;
        let staged = self
            .fill(start, longest, "message", |buf| {
                Ok(write_fmt_into(buf, format_args!("{text}")))
            })
            .map(|s| s.as_ptr() as *const c_char);
        if let Ok(p) = staged {
            return p;
        }
        let buf = self.acquire(0);
        let room = buf.len().min(longest);
        if room == 0 {
            return EMPTY_CSTR;
        }
        let n = text.len().min(room - 1);
        buf[..n].copy_from_slice(&text.as_bytes()[..n]);
        buf[n] = 0;
        buf.as_ptr() as *const c_char
    }
}

/// `fmt::Write` over a fixed slice that always leaves room for a terminator.
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> SliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        SliceWriter { buf, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end >= self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Formats into `buf`, asking for a bigger buffer if the text does not fit.
pub fn write_fmt_into(buf: &mut [u8], args: fmt::Arguments<'_>) -> Attempt {
    let mut w = SliceWriter::new(buf);
    match fmt::Write::write_fmt(&mut w, args) {
        Ok(()) => Attempt::Done(w.len()),
        Err(_) => Attempt::Grow,
    }
}

thread_local! {
    static SCRATCH: RefCell<ScratchBuffer> =
        RefCell::new(ScratchBuffer::new(config().scratch_start_size));
}

pub fn with_scratch<R>(f: impl FnOnce(&mut ScratchBuffer) -> R) -> R {
    SCRATCH.with(|s| f(&mut s.borrow_mut()))
}

/// Stages an error or informational message for a string out-parameter.
pub fn stage_message(text: &str) -> *const c_char {
    let longest = config().scratch_longest;
    with_scratch(|s| s.stage_lossy(text, longest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_follows_growth_policy() {
        let mut s = ScratchBuffer::new(1024);
        assert_eq!(s.capacity(), 0);

        assert_eq!(s.acquire(0).len(), 1024);
        assert_eq!(s.acquire(0).len(), 1024);
        assert_eq!(s.acquire(100).len(), 1024);

        assert_eq!(s.acquire(-1).len(), 2048);
        assert_eq!(s.acquire(3000).len(), 3000);
        assert_eq!(s.acquire(10).len(), 3000);
        assert_eq!(s.capacity(), 3000);
    }

    #[test]
    fn negative_request_without_buffer_uses_start_size() {
        let mut s = ScratchBuffer::new(64);
        assert_eq!(s.acquire(-5).len(), 64);
        assert_eq!(s.acquire(-5).len(), 128);
    }

    #[test]
    fn positive_request_is_honoured_from_nothing() {
        let mut s = ScratchBuffer::new(64);
        assert!(s.acquire(5000).len() >= 5000);
        let before = s.capacity();
        s.acquire(0);
        assert_eq!(s.capacity(), before);
    }

    #[test]
    fn fill_grows_until_the_text_fits() {
        let mut s = ScratchBuffer::new(16);
        let text = "x".repeat(100);
        let mut attempts = 0;
        let out = s
            .fill(16, 1024, "test", |buf| {
                attempts += 1;
                Ok(write_fmt_into(buf, format_args!("{text}")))
            })
            .expect("fits");
        assert_eq!(out, text.as_bytes());
        // 16, 32, 64, 128
        assert_eq!(attempts, 4);
        assert_eq!(s.capacity(), 128);
        assert_eq!(s.acquire(0)[100], 0);
    }

    #[test]
    fn fill_reports_overflow_at_the_ceiling() {
        let mut s = ScratchBuffer::new(16);
        let err = s
            .fill(16, 64, "pathname", |_| Ok(Attempt::Grow))
            .expect_err("never fits");
        match err {
            BridgeError::Overflow { what, limit } => {
                assert_eq!(what, "pathname");
                assert_eq!(limit, 64);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.capacity(), 64);
    }

    #[test]
    fn fill_never_exceeds_a_ceiling_between_powers_of_two() {
        let mut s = ScratchBuffer::new(1024);
        let long = "z".repeat(3500);
        let err = s
            .fill(1024, 3000, "result", |buf| {
                Ok(write_fmt_into(buf, format_args!("{long}")))
            })
            .expect_err("over the ceiling");
        assert!(matches!(err, BridgeError::Overflow { limit: 3000, .. }));
        assert_eq!(s.capacity(), 3000);

        let fits = "z".repeat(2999);
        let out = s
            .fill(1024, 3000, "result", |buf| {
                Ok(write_fmt_into(buf, format_args!("{fits}")))
            })
            .expect("largest allowed");
        assert_eq!(out.len(), 2999);
    }

    #[test]
    fn fill_ignores_room_beyond_the_ceiling() {
        let mut s = ScratchBuffer::new(16);
        s.acquire(8192);
        let text = "q".repeat(100);
        let err = s
            .fill(16, 64, "result", |buf| {
                assert!(buf.len() <= 64);
                Ok(write_fmt_into(buf, format_args!("{text}")))
            })
            .expect_err("capped");
        assert!(matches!(err, BridgeError::Overflow { limit: 64, .. }));
    }

    #[test]
    fn fill_propagates_attempt_errors() {
        let mut s = ScratchBuffer::new(16);
        let err = s
            .fill(16, 64, "x", |_| Err(BridgeError::OutOfRange("nope".into())))
            .expect_err("error");
        assert_eq!(err.status(), libc::ERANGE);
    }

    #[test]
    fn stage_lossy_truncates_past_the_ceiling() {
        let mut s = ScratchBuffer::new(8);
        let long = "abcdefghijklmnopqrstuvwxyz".repeat(4);
        let p = s.stage_lossy(&long, 32);
        let got = unsafe { std::ffi::CStr::from_ptr(p) }.to_bytes().to_vec();
        assert_eq!(got.len(), 31);
        assert_eq!(&got[..], &long.as_bytes()[..31]);

        let p = s.stage_lossy("short", 32);
        let got = unsafe { std::ffi::CStr::from_ptr(p) };
        assert_eq!(got.to_str().unwrap(), "short");
    }

    #[test]
    fn slice_writer_keeps_room_for_terminator() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            write_fmt_into(&mut buf, format_args!("abc")),
            Attempt::Done(3)
        ));
        assert!(matches!(
            write_fmt_into(&mut buf, format_args!("abcd")),
            Attempt::Grow
        ));
    }
}
