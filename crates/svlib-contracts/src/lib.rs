//! Shared, version-pinned layout of the DPI boundary.
//!
//! These tables are the single source of truth for everything the
//! SystemVerilog caller and the native bridge must agree on: which `stat` field
//! lands in which array slot, which option bits the matcher understands, and the
//! bridge-specific status codes. The C/SV header and the DPI import package are
//! rendered from here instead of being maintained by hand on both sides.

use std::fmt::Write as _;

pub const SVLIB_DPI_CONTRACT_VERSION: &str = "svlib.dpi@0.1.0";

pub const SHARED_HEADER_NAME: &str = "svlib_shared_c_sv.h";

// -------------------------
// stat field layout
// -------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatField {
    Mtime,
    Atime,
    Ctime,
    Uid,
    Gid,
    Size,
    Mode,
}

impl StatField {
    pub const ALL: [StatField; 7] = [
        StatField::Mtime,
        StatField::Atime,
        StatField::Ctime,
        StatField::Uid,
        StatField::Gid,
        StatField::Size,
        StatField::Mode,
    ];

    /// Number of elements the caller's field array must have.
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn enum_name(self) -> &'static str {
        match self {
            StatField::Mtime => "statMTIME",
            StatField::Atime => "statATIME",
            StatField::Ctime => "statCTIME",
            StatField::Uid => "statUID",
            StatField::Gid => "statGID",
            StatField::Size => "statSIZE",
            StatField::Mode => "statMODE",
        }
    }
}

// -------------------------
// regex option bits
// -------------------------

pub const REGEX_OPT_NOCASE: u32 = 1 << 0;
/// `^`/`$` match at line boundaries and `.` does not match a newline.
pub const REGEX_OPT_LINE: u32 = 1 << 1;

pub const REGEX_OPTIONS: &[(&str, u32)] = &[
    ("regexNOCASE", REGEX_OPT_NOCASE),
    ("regexLINE", REGEX_OPT_LINE),
];

/// Maximum number of explicit capture groups a pattern may define.
pub const REGEX_MAX_CAPTURES: usize = 32;

// -------------------------
// status codes
// -------------------------
//
// Zero is success and host errno values are passed through unchanged. The
// bridge-specific codes live above any errno a supported host produces.

pub const STATUS_OK: i32 = 0;
pub const STATUS_INTERNAL: i32 = 61000;
pub const STATUS_INVALID_HANDLE: i32 = 61001;
pub const STATUS_CONTRACT_VIOLATION: i32 = 61002;
pub const STATUS_PATTERN_COMPILE: i32 = 61003;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeStatus {
    pub enum_name: &'static str,
    pub code: i32,
    pub text: &'static str,
}

pub const BRIDGE_STATUSES: &[BridgeStatus] = &[
    BridgeStatus {
        enum_name: "svlibINTERNAL",
        code: STATUS_INTERNAL,
        text: "internal error in svlib DPI bridge",
    },
    BridgeStatus {
        enum_name: "svlibINVALID_HANDLE",
        code: STATUS_INVALID_HANDLE,
        text: "stale or invalid svlib handle",
    },
    BridgeStatus {
        enum_name: "svlibCONTRACT_VIOLATION",
        code: STATUS_CONTRACT_VIOLATION,
        text: "array argument has the wrong shape or size",
    },
    BridgeStatus {
        enum_name: "svlibPATTERN_COMPILE",
        code: STATUS_PATTERN_COMPILE,
        text: "regular expression failed to compile",
    },
];

pub fn bridge_status(code: i32) -> Option<&'static BridgeStatus> {
    BRIDGE_STATUSES.iter().find(|s| s.code == code)
}

// -------------------------
// DPI imports
// -------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DpiImport {
    pub symbol: &'static str,
    /// SystemVerilog prototype, without the `import "DPI-C"` prefix.
    pub sv_prototype: &'static str,
}

pub const DPI_IMPORTS: &[DpiImport] = &[
    DpiImport {
        symbol: "svlib_glob_start_v1",
        sv_prototype: "function int svlib_glob_start_v1(input string pattern, output longint hnd, output int count)",
    },
    DpiImport {
        symbol: "svlib_dir_list_start_v1",
        sv_prototype: "function int svlib_dir_list_start_v1(input string path, output longint hnd, output int count)",
    },
    DpiImport {
        symbol: "svlib_seq_next_v1",
        sv_prototype: "function int svlib_seq_next_v1(inout longint hnd, output int remaining, output string item)",
    },
    DpiImport {
        symbol: "svlib_seq_drop_v1",
        sv_prototype: "function int svlib_seq_drop_v1(inout longint hnd)",
    },
    DpiImport {
        symbol: "svlib_regex_run_v1",
        sv_prototype: "function int svlib_regex_run_v1(input string pattern, input string subject, input int options, input int start_pos, output int match_count, inout int matches[], output string diagnostic)",
    },
    DpiImport {
        symbol: "svlib_strerror_v1",
        sv_prototype: "function string svlib_strerror_v1(input int code)",
    },
    DpiImport {
        symbol: "svlib_getcwd_v1",
        sv_prototype: "function int svlib_getcwd_v1(output string result)",
    },
    DpiImport {
        symbol: "svlib_time_format_v1",
        sv_prototype: "function int svlib_time_format_v1(input longint epoch_s, input string format, output string result)",
    },
    DpiImport {
        symbol: "svlib_file_stat_v1",
        sv_prototype: "function int svlib_file_stat_v1(input string path, input int follow_symlink, inout longint fields[])",
    },
    DpiImport {
        symbol: "svlib_mtime_v1",
        sv_prototype: "function int svlib_mtime_v1(input string path, output longint mtime)",
    },
    DpiImport {
        symbol: "svlib_now_v1",
        sv_prototype: "function longint svlib_now_v1()",
    },
];

// -------------------------
// Rendering
// -------------------------

fn push_enum<'a>(out: &mut String, type_name: &str, items: impl Iterator<Item = (&'a str, Option<i64>)>) {
    out.push_str("typedef enum {\n");
    let items: Vec<_> = items.collect();
    for (i, (name, value)) in items.iter().enumerate() {
        let sep = if i + 1 == items.len() { "" } else { "," };
        match value {
            Some(v) => {
                let _ = writeln!(out, "  {name} = {v}{sep}");
            }
            None => {
                let _ = writeln!(out, "  {name}{sep}");
            }
        }
    }
    let _ = writeln!(out, "}} {type_name};");
}

/// Header text that is valid syntax in both C and SystemVerilog.
pub fn render_shared_header() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "/*\n *  Generated from {SVLIB_DPI_CONTRACT_VERSION} by svlib-gen. Do not edit.\n *\n *  Valid syntax in both C and SystemVerilog; included by the native bridge\n *  and by the SV package so both sides share one layout.\n */"
    );
    out.push('\n');

    let stat_items = StatField::ALL
        .iter()
        .map(|f| (f.enum_name(), None))
        .chain(std::iter::once(("statARRAYSIZE", None)));
    push_enum(&mut out, "STAT_INDEX_E", stat_items);
    out.push('\n');

    push_enum(
        &mut out,
        "REGEX_OPTION_E",
        REGEX_OPTIONS.iter().map(|(n, v)| (*n, Some(*v as i64))),
    );
    out.push('\n');

    push_enum(
        &mut out,
        "SVLIB_STATUS_E",
        BRIDGE_STATUSES
            .iter()
            .map(|s| (s.enum_name, Some(s.code as i64))),
    );
    out
}

/// SystemVerilog package declaring every exported bridge function.
pub fn render_dpi_package(package_name: &str, header_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// Generated from {SVLIB_DPI_CONTRACT_VERSION} by svlib-gen. Do not edit."
    );
    let _ = writeln!(out, "package {package_name};");
    out.push('\n');
    let _ = writeln!(out, "  `include \"{header_name}\"");
    out.push('\n');
    for imp in DPI_IMPORTS {
        let _ = writeln!(out, "  import \"DPI-C\" {};", imp.sv_prototype);
    }
    out.push('\n');
    let _ = writeln!(out, "endpackage : {package_name}");
    out
}
