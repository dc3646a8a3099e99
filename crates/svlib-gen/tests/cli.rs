use std::process::Command;

use svlib_contracts::{render_dpi_package, render_shared_header, SHARED_HEADER_NAME};

fn svlib_gen() -> Command {
    Command::new(env!("CARGO_BIN_EXE_svlib-gen"))
}

#[test]
fn header_is_written_then_checked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("inc").join(SHARED_HEADER_NAME);

    let st = svlib_gen()
        .args(["header", "--out"])
        .arg(&out)
        .status()
        .expect("run svlib-gen");
    assert!(st.success());
    let got = std::fs::read_to_string(&out).expect("read header");
    assert_eq!(got, render_shared_header());

    let st = svlib_gen()
        .args(["header", "--check", "--out"])
        .arg(&out)
        .status()
        .expect("run svlib-gen");
    assert!(st.success());
}

#[test]
fn check_fails_on_drift() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("svlib_dpi_pkg.sv");
    std::fs::write(&out, "package stale; endpackage\n").expect("seed");

    let res = svlib_gen()
        .args(["dpi", "--check", "--out"])
        .arg(&out)
        .output()
        .expect("run svlib-gen");
    assert!(!res.status.success());
    let stderr = String::from_utf8_lossy(&res.stderr);
    assert!(stderr.contains("generated output differs"), "{stderr}");
    assert_eq!(
        std::fs::read_to_string(&out).expect("read"),
        "package stale; endpackage\n"
    );
}

#[test]
fn all_writes_both_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let st = svlib_gen()
        .args(["all", "--package", "my_svlib", "--out-dir"])
        .arg(dir.path())
        .status()
        .expect("run svlib-gen");
    assert!(st.success());

    let pkg = std::fs::read_to_string(dir.path().join("my_svlib.sv")).expect("pkg");
    assert_eq!(pkg, render_dpi_package("my_svlib", SHARED_HEADER_NAME));
    assert!(dir.path().join(SHARED_HEADER_NAME).is_file());
}

#[test]
fn rejects_bad_package_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let res = svlib_gen()
        .args(["dpi", "--package", "9lives", "--out"])
        .arg(dir.path().join("x.sv"))
        .output()
        .expect("run svlib-gen");
    assert!(!res.status.success());
    assert!(!dir.path().join("x.sv").exists());
}
