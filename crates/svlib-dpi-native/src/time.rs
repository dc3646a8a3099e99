use std::ffi::c_char;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, TimeZone as _, Utc};

use crate::config::config;
use crate::error::{BridgeError, Result};
use crate::scratch::{with_scratch, write_fmt_into};

/// Seconds since the Unix epoch.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn parse_format(fmt: &str) -> Result<Vec<Item<'_>>> {
    let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return Err(BridgeError::InvalidArgument(format!(
            "unsupported time format {fmt:?}"
        )));
    }
    Ok(items)
}

/// Formats `epoch_s` in local time using strftime-style conversions and stages
/// the result in the scratch buffer.
pub fn format_timestamp(epoch_s: i64, fmt: &str) -> Result<*const c_char> {
    let items = parse_format(fmt)?;
    let dt = Local
        .timestamp_opt(epoch_s, 0)
        .single()
        .ok_or_else(|| BridgeError::OutOfRange(format!("timestamp {epoch_s}")))?;

    let cfg = config();
    with_scratch(|s| {
        s.fill(
            cfg.scratch_start_size,
            cfg.scratch_longest,
            "formatted time",
            |buf| {
                let shown = dt.format_with_items(items.iter());
                Ok(write_fmt_into(buf, format_args!("{shown}")))
            },
        )
        .map(|b| b.as_ptr() as *const c_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn formatted(epoch_s: i64, fmt: &str) -> Result<String> {
        let p = format_timestamp(epoch_s, fmt)?;
        Ok(unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
    }

    #[test]
    fn epoch_seconds_round_trip_through_percent_s() {
        assert_eq!(formatted(1_700_000_000, "%s").expect("fmt"), "1700000000");
        assert_eq!(formatted(0, "t=%s%%").expect("fmt"), "t=0%");
        assert_eq!(formatted(5, "").expect("fmt"), "");
    }

    #[test]
    fn long_output_grows_the_buffer() {
        let fmt = "x".repeat(3000) + "%s";
        let out = formatted(42, &fmt).expect("fmt");
        assert_eq!(out.len(), 3002);
        assert!(out.ends_with("x42"));
    }

    #[test]
    fn output_past_the_ceiling_overflows() {
        let fmt = "y".repeat(config().scratch_longest + 10);
        let err = formatted(0, &fmt).expect_err("too long");
        assert_eq!(err.status(), libc::ERANGE);
        assert!(matches!(err, BridgeError::Overflow { .. }));
    }

    #[test]
    fn bad_format_and_range() {
        let err = formatted(0, "%Y-%").expect_err("dangling %");
        assert_eq!(err.status(), libc::EINVAL);
        let err = formatted(i64::MAX, "%s").expect_err("range");
        assert_eq!(err.status(), libc::ERANGE);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now() > 1_577_836_800);
    }
}
