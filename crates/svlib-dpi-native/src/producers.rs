//! Sources that populate a sequence: glob expansion and directory listing.

use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt as _;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{BridgeError, Result};

/// Producer-owned storage behind a live sequence.
pub enum Payload {
    Glob(GlobExpansion),
    DirList(DirListing),
}

pub struct GlobExpansion {
    pattern: String,
    paths: Vec<CString>,
}

pub struct DirListing {
    dir: PathBuf,
    names: Vec<CString>,
}

impl Payload {
    pub fn glob(pattern: &str, paths: Vec<CString>) -> Self {
        Payload::Glob(GlobExpansion {
            pattern: pattern.to_string(),
            paths,
        })
    }

    pub fn dir_list(dir: &Path, names: Vec<CString>) -> Self {
        Payload::DirList(DirListing {
            dir: dir.to_path_buf(),
            names,
        })
    }

    pub fn items(&self) -> &[CString] {
        match self {
            Payload::Glob(g) => &g.paths,
            Payload::DirList(d) => &d.names,
        }
    }

    /// Frees the producer's storage. Runs exactly once per sequence.
    pub fn release(self) {
        match self {
            Payload::Glob(g) => {
                log::debug!(
                    "svlib: releasing glob {:?} ({} paths)",
                    g.pattern,
                    g.paths.len()
                );
            }
            Payload::DirList(d) => {
                log::debug!(
                    "svlib: releasing listing of {} ({} entries)",
                    d.dir.display(),
                    d.names.len()
                );
            }
        }
    }
}

// -------------------------
// Glob expansion
// -------------------------

fn has_glob_meta(component: &str) -> bool {
    component
        .bytes()
        .any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' | b'\\'))
}

fn to_cstring(bytes: Vec<u8>) -> Result<CString> {
    CString::new(bytes).map_err(|_| BridgeError::InvalidArgument("path contains NUL".into()))
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_bytes().first() == Some(&b'.')
}

// Follows symlinks; a dangling link is not a directory.
fn is_dir_following(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

// A directory the pattern needs could not be read. Aborts the expansion.
fn dir_error(pattern: &str, dir: &Path, e: io::Error) -> BridgeError {
    let context = format!("glob {pattern:?} cannot read {}", dir.display());
    if e.kind() == io::ErrorKind::PermissionDenied {
        BridgeError::PermissionDenied(format!("{context}: {e}"))
    } else {
        BridgeError::io(context, e)
    }
}

fn vanished(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ENOTDIR)
}

fn component_matcher(pattern: &str, component: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(component)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| BridgeError::InvalidArgument(format!("bad glob pattern {pattern:?}: {e}")))?;
    Ok(glob.compile_matcher())
}

enum Step {
    /// `**`: the directory itself and every directory below it.
    AnyDepth,
    /// One path component. Leading dots only match when `dot_ok`.
    Name { matcher: GlobMatcher, dot_ok: bool },
}

struct GlobPlan {
    // Literal leading components as written, e.g. "/usr/lib" or "src".
    root_display: String,
    steps: Vec<Step>,
}

impl GlobPlan {
    fn root_fs(&self) -> &Path {
        if self.root_display.is_empty() {
            Path::new(".")
        } else {
            Path::new(&self.root_display)
        }
    }
}

fn plan_glob(pattern: &str) -> Result<Option<GlobPlan>> {
    let absolute = pattern.starts_with('/');
    let comps: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    let Some(first_wild) = comps.iter().position(|c| has_glob_meta(c)) else {
        return Ok(None);
    };

    let mut root_display = String::new();
    if absolute {
        root_display.push('/');
    }
    root_display.push_str(&comps[..first_wild].join("/"));

    let mut steps = Vec::new();
    for comp in &comps[first_wild..] {
        if *comp == "**" {
            if !matches!(steps.last(), Some(Step::AnyDepth)) {
                steps.push(Step::AnyDepth);
            }
            continue;
        }
        steps.push(Step::Name {
            matcher: component_matcher(pattern, comp)?,
            dot_ok: comp.starts_with('.'),
        });
    }
    // A trailing `**` names everything below it.
    if matches!(steps.last(), Some(Step::AnyDepth)) {
        steps.push(Step::Name {
            matcher: component_matcher(pattern, "*")?,
            dot_ok: false,
        });
    }

    Ok(Some(GlobPlan {
        root_display,
        steps,
    }))
}

/// A path produced so far, both as the caller spelled it and as opened.
#[derive(Clone)]
struct Candidate {
    display: Vec<u8>,
    path: PathBuf,
}

impl Candidate {
    fn child(&self, rel: &Path) -> Candidate {
        let mut display = self.display.clone();
        if !display.is_empty() && !display.ends_with(b"/") {
            display.push(b'/');
        }
        display.extend_from_slice(rel.as_os_str().as_bytes());
        Candidate {
            display,
            path: self.path.join(rel),
        }
    }
}

struct Expander<'a> {
    pattern: &'a str,
    cfg: &'a Config,
}

impl Expander<'_> {
    fn check_limit(&self, n: usize) -> Result<()> {
        if n > self.cfg.glob_max_entries {
            log::warn!(
                "svlib: glob {:?} matched more than {} paths",
                self.pattern,
                self.cfg.glob_max_entries
            );
            return Err(BridgeError::OutOfMemory);
        }
        Ok(())
    }

    fn can_descend(&self, ent: &std::fs::DirEntry) -> bool {
        if self.cfg.follow_symlinks {
            is_dir_following(&ent.path())
        } else {
            ent.file_type().map(|t| t.is_dir()).unwrap_or(false)
        }
    }

    // Entries of `dir` whose name matches; with `leaf` unset only the
    // directories among them, to expand further.
    fn match_in(
        &self,
        dir: &Candidate,
        matcher: &GlobMatcher,
        dot_ok: bool,
        leaf: bool,
        out: &mut Vec<Candidate>,
    ) -> Result<()> {
        let rd = match std::fs::read_dir(&dir.path) {
            Ok(rd) => rd,
            Err(e) if vanished(&e) => return Ok(()),
            Err(e) => return Err(dir_error(self.pattern, &dir.path, e)),
        };
        for ent in rd {
            let ent = ent.map_err(|e| dir_error(self.pattern, &dir.path, e))?;
            let name = ent.file_name();
            if is_hidden(&name) && !dot_ok {
                continue;
            }
            let rel = Path::new(&name);
            if !matcher.is_match(rel) {
                continue;
            }
            if leaf || self.can_descend(&ent) {
                out.push(dir.child(rel));
                self.check_limit(out.len())?;
            }
        }
        Ok(())
    }

    // `dir` plus every non-hidden directory below it. Symlink loops and
    // entries that disappear mid-walk are skipped.
    fn descend_all(&self, dir: &Candidate, out: &mut Vec<Candidate>) -> Result<()> {
        let walker = WalkDir::new(&dir.path)
            .follow_links(self.cfg.follow_symlinks)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || (!is_hidden(e.file_name()) && e.file_type().is_dir())
            });
        for ent in walker {
            let ent = match ent {
                Ok(ent) => ent,
                Err(e) if e.loop_ancestor().is_some() => {
                    log::debug!("svlib: glob {:?} skips symlink loop: {e}", self.pattern);
                    continue;
                }
                Err(e) if e.io_error().map(vanished).unwrap_or(false) => continue,
                Err(e) => {
                    let at = e.path().unwrap_or(dir.path.as_path()).to_path_buf();
                    return Err(dir_error(self.pattern, &at, e.into()));
                }
            };
            if ent.depth() == 0 {
                out.push(dir.clone());
            } else if let Ok(rel) = ent.path().strip_prefix(&dir.path) {
                out.push(dir.child(rel));
            }
            self.check_limit(out.len())?;
        }
        Ok(())
    }

    fn run(&self, plan: &GlobPlan) -> Result<Vec<Candidate>> {
        let mut frontier = vec![Candidate {
            display: plan.root_display.as_bytes().to_vec(),
            path: plan.root_fs().to_path_buf(),
        }];
        for (i, step) in plan.steps.iter().enumerate() {
            let leaf = i + 1 == plan.steps.len();
            let mut next = Vec::new();
            for dir in &frontier {
                match step {
                    Step::AnyDepth => self.descend_all(dir, &mut next)?,
                    Step::Name { matcher, dot_ok } => {
                        self.match_in(dir, matcher, *dot_ok, leaf, &mut next)?
                    }
                }
            }
            next.sort_by(|a, b| a.display.cmp(&b.display));
            next.dedup_by(|a, b| a.display == b.display);
            if next.is_empty() {
                return Ok(next);
            }
            frontier = next;
        }
        Ok(frontier)
    }
}

fn expand_literal(pattern: &str, dirs_only: bool, cfg: &Config) -> Result<Vec<CString>> {
    let path = Path::new(pattern);
    if std::fs::symlink_metadata(path).is_err() {
        return Ok(Vec::new());
    }
    let is_dir = is_dir_following(path);
    if dirs_only && !is_dir {
        return Ok(Vec::new());
    }
    let mut bytes = pattern.as_bytes().to_vec();
    if is_dir && (cfg.mark_dirs || dirs_only) && !bytes.ends_with(b"/") {
        bytes.push(b'/');
    }
    Ok(vec![to_cstring(bytes)?])
}

/// Expands `pattern` against the filesystem one component at a time, sorted
/// bytewise. Only directories a component matches are opened, and failing to
/// read one of them aborts the expansion. Dangling symlinks are listed like
/// any other entry. Directories are marked with a trailing `/` when
/// configured to.
pub fn expand_glob(pattern: &str, cfg: &Config) -> Result<Vec<CString>> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let dirs_only = pattern.ends_with('/');
    let Some(plan) = plan_glob(pattern)? else {
        return expand_literal(pattern, dirs_only, cfg);
    };

    let root = plan.root_fs();
    match std::fs::metadata(root) {
        Ok(m) if m.is_dir() => {}
        Ok(_) => return Ok(Vec::new()),
        Err(e) if vanished(&e) => return Ok(Vec::new()),
        Err(e) => return Err(dir_error(pattern, root, e)),
    }

    let found = Expander { pattern, cfg }.run(&plan)?;
    let mut out = Vec::with_capacity(found.len());
    for c in found {
        let is_dir = is_dir_following(&c.path);
        if dirs_only && !is_dir {
            continue;
        }
        let mut bytes = c.display;
        if is_dir && (cfg.mark_dirs || dirs_only) {
            bytes.push(b'/');
        }
        out.push(to_cstring(bytes)?);
    }
    out.sort();
    Ok(out)
}

// -------------------------
// Directory listing
// -------------------------

/// Entry names of one directory (without `.` and `..`), sorted bytewise.
pub fn list_dir(dir: &Path, cfg: &Config) -> Result<Vec<CString>> {
    let md = std::fs::metadata(dir).map_err(|e| BridgeError::io(dir.display().to_string(), e))?;
    if !md.is_dir() {
        return Err(BridgeError::io(
            dir.display().to_string(),
            io::Error::from_raw_os_error(libc::ENOTDIR),
        ));
    }

    let rd = std::fs::read_dir(dir).map_err(|e| BridgeError::io(dir.display().to_string(), e))?;
    let mut out: Vec<CString> = Vec::new();
    for ent in rd {
        let ent = ent.map_err(|e| BridgeError::io(dir.display().to_string(), e))?;
        let name = ent.file_name();
        let mut bytes = OsStr::as_bytes(&name).to_vec();
        let is_dir = std::fs::metadata(ent.path())
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir && cfg.mark_dirs {
            bytes.push(b'/');
        }
        out.push(to_cstring(bytes)?);
        if out.len() > cfg.glob_max_entries {
            return Err(BridgeError::OutOfMemory);
        }
    }
    out.sort();
    Ok(out)
}
