use std::ffi::{c_char, CStr, CString};
use std::os::unix::fs::MetadataExt as _;

use svlib_contracts::{StatField, STATUS_CONTRACT_VIOLATION, STATUS_INVALID_HANDLE};
use svlib_dpi::{
    svlib_file_stat_v1, svlib_getcwd_v1, svlib_mtime_v1, svlib_now_v1, svlib_strerror_v1,
    svlib_time_format_v1,
};

#[path = "../src/svdpi_mock.rs"]
#[allow(dead_code)]
mod svdpi_mock;

use svdpi_mock::MockOpenArray;

fn owned(p: *const c_char) -> String {
    assert!(!p.is_null());
    unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
}

#[test]
fn getcwd_returns_the_process_directory() {
    let mut out: *const c_char = std::ptr::null();
    assert_eq!(unsafe { svlib_getcwd_v1(&mut out) }, 0);
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(owned(out), cwd.display().to_string());
}

#[test]
fn time_format_success_and_failure() {
    let fmt = CString::new("[%s]").expect("fmt");
    let mut out: *const c_char = std::ptr::null();
    let rc = unsafe { svlib_time_format_v1(86_400, fmt.as_ptr(), &mut out) };
    assert_eq!(rc, 0);
    assert_eq!(owned(out), "[86400]");

    let bad = CString::new("%").expect("fmt");
    let rc = unsafe { svlib_time_format_v1(0, bad.as_ptr(), &mut out) };
    assert_eq!(rc, libc::EINVAL);
    assert!(!owned(out).is_empty());
}

#[test]
fn stat_and_mtime_agree_with_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("f.txt");
    std::fs::write(&file, b"hello").expect("write");
    let md = std::fs::metadata(&file).expect("md");
    let path = CString::new(file.display().to_string()).expect("path");

    let mut arr = MockOpenArray::longints(&[0; StatField::COUNT]);
    let rc = unsafe { svlib_file_stat_v1(path.as_ptr(), 1, arr.handle()) };
    assert_eq!(rc, 0);
    assert_eq!(arr.as_longints()[StatField::Size.index()], 5);
    assert_eq!(arr.as_longints()[StatField::Gid.index()], md.gid() as i64);

    let mut mtime = 0i64;
    assert_eq!(unsafe { svlib_mtime_v1(path.as_ptr(), &mut mtime) }, 0);
    assert_eq!(mtime, md.mtime());
    assert_eq!(arr.as_longints()[StatField::Mtime.index()], mtime);

    let mut short = MockOpenArray::longints(&[0; 6]);
    let rc = unsafe { svlib_file_stat_v1(path.as_ptr(), 1, short.handle()) };
    assert_eq!(rc, STATUS_CONTRACT_VIOLATION);

    let empty = CString::new("").expect("path");
    let rc = unsafe { svlib_mtime_v1(empty.as_ptr(), &mut mtime) };
    assert_eq!(rc, libc::ENOENT);
}

#[test]
fn strerror_covers_host_and_bridge_codes() {
    assert!(owned(svlib_strerror_v1(libc::EACCES))
        .to_lowercase()
        .contains("permission"));
    assert_eq!(
        owned(svlib_strerror_v1(STATUS_INVALID_HANDLE)),
        "stale or invalid svlib handle"
    );
}

#[test]
fn now_tracks_the_system_clock() {
    let sys = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_secs() as i64;
    assert!((svlib_now_v1() - sys).abs() <= 2);
}
