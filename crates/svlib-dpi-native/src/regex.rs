use core::cmp::min;
use std::cell::Cell;

use regex_automata::meta::Regex;
use regex_automata::util::captures::Captures;
use regex_automata::util::syntax;
use regex_automata::{Anchored, Input, MatchKind, Span};
use regex_syntax::ast;
use svlib_contracts::{REGEX_MAX_CAPTURES, REGEX_OPT_LINE, REGEX_OPT_NOCASE};

use crate::error::{BridgeError, Result};
use crate::out_array::OutArray;

thread_local! {
    static LIVE_COMPILED: Cell<usize> = const { Cell::new(0) };
}

/// Compiled patterns currently alive on this thread.
pub fn live_compiled_patterns() -> usize {
    LIVE_COMPILED.with(|c| c.get())
}

struct Compiled {
    re_leftmost: Regex,
    re_all: Regex,
    // Implicit whole-match group included.
    group_count: usize,
}

impl Compiled {
    fn new(re_leftmost: Regex, re_all: Regex, group_count: usize) -> Self {
        LIVE_COMPILED.with(|c| c.set(c.get() + 1));
        Compiled {
            re_leftmost,
            re_all,
            group_count,
        }
    }
}

impl Drop for Compiled {
    fn drop(&mut self) {
        LIVE_COMPILED.with(|c| c.set(c.get().saturating_sub(1)));
    }
}

fn syntax_config(opts: u32) -> syntax::Config {
    let line = opts & REGEX_OPT_LINE != 0;
    syntax::Config::new()
        .unicode(false)
        .utf8(false)
        .case_insensitive(opts & REGEX_OPT_NOCASE != 0)
        .multi_line(line)
        .dot_matches_new_line(!line)
}

fn describe_syntax_error(err: &regex_syntax::Error) -> String {
    match err {
        regex_syntax::Error::Parse(e) => describe_ast_error(e),
        regex_syntax::Error::Translate(e) => {
            let pos = min(e.span().start.offset, u32::MAX as usize);
            format!("invalid pattern at offset {pos}: {}", e.kind())
        }
        _ => "invalid pattern".to_string(),
    }
}

fn describe_ast_error(err: &ast::Error) -> String {
    let kind = err.kind();
    let pat_len = err.pattern().len();
    let span_start = err.span().start.offset;

    let class = match kind {
        ast::ErrorKind::GroupUnclosed | ast::ErrorKind::GroupUnopened => "unbalanced parenthesis",
        ast::ErrorKind::ClassUnclosed => "unclosed bracket expression",
        ast::ErrorKind::ClassEscapeInvalid
        | ast::ErrorKind::ClassRangeInvalid
        | ast::ErrorKind::ClassRangeLiteral => "invalid character class",
        ast::ErrorKind::EscapeUnrecognized
        | ast::ErrorKind::EscapeUnexpectedEof
        | ast::ErrorKind::EscapeHexEmpty
        | ast::ErrorKind::EscapeHexInvalid
        | ast::ErrorKind::EscapeHexInvalidDigit => "invalid escape",
        ast::ErrorKind::RepetitionMissing => "nothing to repeat",
        ast::ErrorKind::RepetitionCountInvalid => "invalid repetition range",
        ast::ErrorKind::RepetitionCountDecimalEmpty
        | ast::ErrorKind::RepetitionCountUnclosed
        | ast::ErrorKind::DecimalInvalid => "invalid repetition count",
        ast::ErrorKind::CaptureLimitExceeded => "too many capture groups",
        ast::ErrorKind::NestLimitExceeded(_) => "pattern nested too deeply",
        _ => "invalid pattern",
    };

    let pos = match kind {
        // Report where the closing delimiter was expected.
        ast::ErrorKind::GroupUnclosed | ast::ErrorKind::ClassUnclosed => pat_len,
        _ => span_start,
    };
    format!("{class} at offset {pos}: {kind}")
}

fn compile(pattern: &str, opts: u32) -> Result<Compiled> {
    let build = |kind: MatchKind| {
        Regex::builder()
            .configure(Regex::config().match_kind(kind))
            .syntax(syntax_config(opts))
            .build(pattern)
            .map_err(|err| {
                BridgeError::PatternCompile(match err.syntax_error() {
                    Some(se) => describe_syntax_error(se),
                    None => format!("pattern too large to compile: {err}"),
                })
            })
    };
    // First-match semantics finds where the leftmost match starts; `All`
    // then extends it to the longest end.
    let re_leftmost = build(MatchKind::LeftmostFirst)?;
    let re_all = build(MatchKind::All)?;

    let group_count = re_leftmost.captures_len();
    let explicit = group_count.saturating_sub(1);
    if explicit > REGEX_MAX_CAPTURES {
        return Err(BridgeError::PatternCompile(format!(
            "pattern defines {explicit} capture groups, at most {REGEX_MAX_CAPTURES} are supported"
        )));
    }
    Ok(Compiled::new(re_leftmost, re_all, group_count))
}

impl Compiled {
    /// POSIX leftmost-longest match in `hay` at or after `start` (negative
    /// counts as 0). Returns the overall span and the groups of that match.
    fn find_at(&self, hay: &[u8], start: i32) -> Option<(Span, Captures)> {
        let from = usize::try_from(start).unwrap_or(0);
        if from > hay.len() {
            return None;
        }
        let left = self
            .re_leftmost
            .search(&Input::new(hay).range(from..).anchored(Anchored::No))?;

        let anchored = Input::new(hay)
            .range(left.start()..)
            .anchored(Anchored::Yes);
        let mut cache = self.re_all.create_cache();
        let longest = self.re_all.search_with(&mut cache, &anchored)?;
        let mut caps = self.re_all.create_captures();
        self.re_all
            .search_captures_with(&mut cache, &anchored, &mut caps);
        Some((longest.span(), caps))
    }
}

/// Matches `pattern` against `subject` from byte offset `start` and writes
/// `(start, end)` offset pairs for the whole match and each group into `out`,
/// as many as fit. Returns the number of groups the pattern defines (whole
/// match included) on a match, or `0` with `out` untouched when there is none.
/// Offsets are relative to the start of `subject`; groups that did not take
/// part in the match are reported as `(-1, -1)`.
pub fn run_match(
    pattern: &str,
    subject: &[u8],
    opts: u32,
    start: i32,
    out: &mut OutArray<i32>,
) -> Result<usize> {
    let slots = out.capacity();
    if slots % 2 != 0 {
        return Err(BridgeError::ContractViolation(format!(
            "match array has odd length {slots}; offsets come in start/end pairs"
        )));
    }

    let c = compile(pattern, opts)?;
    let Some((whole, caps)) = c.find_at(subject, start) else {
        return Ok(0);
    };

    let offset = |v: usize| min(v, i32::MAX as usize) as i32;
    let group_count = c.group_count;
    let pairs = (0..group_count).flat_map(|g| {
        let (gs, ge) = if g == 0 {
            (offset(whole.start), offset(whole.end))
        } else {
            match caps.get_group(g) {
                Some(sp) => (offset(sp.start), offset(sp.end)),
                None => (-1, -1),
            }
        };
        [gs, ge]
    });
    let wc = out.write(pairs)?;
    if wc.truncated() {
        log::trace!(
            "svlib: regex {pattern:?} has {group_count} groups, caller had room for {}",
            wc.written / 2
        );
    }
    Ok(group_count)
}
