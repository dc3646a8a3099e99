#![no_main]

use std::ffi::{c_char, c_int, CString};

use libfuzzer_sys::fuzz_target;

#[path = "../../crates/svlib-dpi-native/src/svdpi_mock.rs"]
#[allow(dead_code)]
mod svdpi_mock;

// Input layout: options byte, start byte, then pattern NUL subject.
fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 4 * 1024 {
        &data[..4 * 1024]
    } else {
        data
    };
    let [options, start, rest @ ..] = data else {
        return;
    };
    let mut parts = rest.splitn(2, |&b| b == 0);
    let pattern = parts.next().unwrap_or_default();
    let subject = parts.next().unwrap_or_default();
    let (Ok(pattern), Ok(subject)) = (CString::new(pattern), CString::new(subject)) else {
        return;
    };

    let mut arr = svdpi_mock::MockOpenArray::ints(&[i32::MIN; 8]);
    let mut match_count: c_int = 0;
    let mut diagnostic: *const c_char = std::ptr::null();
    let rc = unsafe {
        svlib_dpi::svlib_regex_run_v1(
            pattern.as_ptr(),
            subject.as_ptr(),
            (*options & 3) as c_int,
            *start as i8 as c_int,
            &mut match_count,
            arr.handle(),
            &mut diagnostic,
        )
    };
    assert!(!diagnostic.is_null());
    if rc != 0 {
        assert_eq!(match_count, 0);
        return;
    }

    let len = subject.as_bytes().len() as i32;
    let pairs = (match_count as usize).min(4);
    for pair in arr.as_ints()[..pairs * 2].chunks(2) {
        let (s, e) = (pair[0], pair[1]);
        assert!((s == -1 && e == -1) || (0 <= s && s <= e && e <= len), "{s}..{e}");
    }
});
