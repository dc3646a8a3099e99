use std::ffi::c_char;
use std::io;
use std::os::unix::fs::MetadataExt as _;
use std::path::Path;

use svlib_contracts::StatField;

use crate::config::config;
use crate::error::{BridgeError, Result};
use crate::out_array::OutArray;
use crate::scratch::{with_scratch, Attempt};

/// Stages the current working directory in the scratch buffer.
pub fn getcwd() -> Result<*const c_char> {
    let cfg = config();
    with_scratch(|s| {
        s.fill(
            cfg.scratch_start_size,
            cfg.scratch_longest,
            "working directory pathname",
            |buf| {
                let p = unsafe { libc::getcwd(buf.as_mut_ptr() as *mut c_char, buf.len()) };
                if !p.is_null() {
                    let n = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                    return Ok(Attempt::Done(n));
                }
                let e = io::Error::last_os_error();
                if e.raw_os_error() == Some(libc::ERANGE) {
                    Ok(Attempt::Grow)
                } else {
                    Err(BridgeError::io("getcwd", e))
                }
            },
        )
        .map(|b| b.as_ptr() as *const c_char)
    })
}

fn metadata(path: &Path, follow: bool) -> Result<std::fs::Metadata> {
    let md = if follow {
        std::fs::metadata(path)
    } else {
        std::fs::symlink_metadata(path)
    };
    md.map_err(|e| BridgeError::io(format!("stat {}", path.display()), e))
}

fn field_value(md: &std::fs::Metadata, f: StatField) -> i64 {
    match f {
        StatField::Mtime => md.mtime(),
        StatField::Atime => md.atime(),
        StatField::Ctime => md.ctime(),
        StatField::Uid => md.uid() as i64,
        StatField::Gid => md.gid() as i64,
        StatField::Size => md.size().min(i64::MAX as u64) as i64,
        StatField::Mode => md.mode() as i64,
    }
}

/// Fills `out` with the stat fields of `path` in `StatField` order. The array
/// must hold exactly `StatField::COUNT` elements.
pub fn stat(path: &Path, follow: bool, out: &mut OutArray<i64>) -> Result<()> {
    if out.capacity() != StatField::COUNT {
        return Err(BridgeError::ContractViolation(format!(
            "stat array has {} elements, expected {}",
            out.capacity(),
            StatField::COUNT
        )));
    }
    let md = metadata(path, follow)?;
    out.write(StatField::ALL.iter().map(|&f| field_value(&md, f)))?;
    Ok(())
}

pub fn mtime(path: &Path) -> Result<i64> {
    let md = metadata(path, true)?;
    Ok(field_value(&md, StatField::Mtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svdpi_mock::MockOpenArray;
    use std::ffi::CStr;

    #[test]
    fn getcwd_matches_std() {
        let p = getcwd().expect("getcwd");
        let got = unsafe { CStr::from_ptr(p) }.to_str().expect("utf8").to_string();
        let want = std::env::current_dir().expect("cwd");
        assert_eq!(Path::new(&got), want.as_path());
    }

    #[test]
    fn stat_fills_fields_in_layout_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let f = dir.path().join("data.bin");
        std::fs::write(&f, vec![0u8; 1234]).expect("write");

        let mut arr = MockOpenArray::longints(&[0; StatField::COUNT]);
        let mut out = unsafe { OutArray::<i64>::open(arr.handle()) }.expect("open");
        stat(&f, true, &mut out).expect("stat");

        let md = std::fs::metadata(&f).expect("md");
        let v = arr.as_longints();
        assert_eq!(v[StatField::Size.index()], 1234);
        assert_eq!(v[StatField::Mtime.index()], md.mtime());
        assert_eq!(v[StatField::Uid.index()], md.uid() as i64);
        assert_eq!(v[StatField::Mode.index()] & libc::S_IFMT as i64, libc::S_IFREG as i64);
        assert_eq!(mtime(&f).expect("mtime"), md.mtime());
    }

    #[test]
    fn stat_without_follow_sees_the_link() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("target");
        std::fs::create_dir(&target).expect("mkdir");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).expect("symlink");

        let mut arr = MockOpenArray::longints(&[0; StatField::COUNT]);
        let mut out = unsafe { OutArray::<i64>::open(arr.handle()) }.expect("open");
        stat(&link, false, &mut out).expect("lstat");
        let mode = arr.as_longints()[StatField::Mode.index()];
        assert_eq!(mode & libc::S_IFMT as i64, libc::S_IFLNK as i64);

        let mut out = unsafe { OutArray::<i64>::open(arr.handle()) }.expect("open");
        stat(&link, true, &mut out).expect("stat");
        let mode = arr.as_longints()[StatField::Mode.index()];
        assert_eq!(mode & libc::S_IFMT as i64, libc::S_IFDIR as i64);
    }

    #[test]
    fn stat_rejects_wrong_sized_array_and_reports_errno() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut short = MockOpenArray::longints(&[0; 5]);
        let mut out = unsafe { OutArray::<i64>::open(short.handle()) }.expect("open");
        let err = stat(dir.path(), true, &mut out).expect_err("short");
        assert_eq!(err.status(), svlib_contracts::STATUS_CONTRACT_VIOLATION);
        assert_eq!(short.as_longints(), &[0; 5]);

        let mut arr = MockOpenArray::longints(&[0; StatField::COUNT]);
        let mut out = unsafe { OutArray::<i64>::open(arr.handle()) }.expect("open");
        let err = stat(&dir.path().join("missing"), true, &mut out).expect_err("missing");
        assert_eq!(err.status(), libc::ENOENT);
    }
}
