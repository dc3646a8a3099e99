#![no_main]

use libfuzzer_sys::fuzz_target;
use svlib_dpi::config::Config;

// Relative patterns only; rooted in the fuzzer's working directory.
fuzz_target!(|data: &[u8]| {
    let Ok(pattern) = std::str::from_utf8(data) else {
        return;
    };
    if pattern.len() > 256 || pattern.starts_with('/') || pattern.contains("..") {
        return;
    }
    let cfg = Config {
        glob_max_entries: 64,
        ..Config::default()
    };
    if let Ok(paths) = svlib_dpi::producers::expand_glob(pattern, &cfg) {
        assert!(paths.len() <= cfg.glob_max_entries);
        assert!(paths.windows(2).all(|w| w[0] <= w[1]));
    }
});
