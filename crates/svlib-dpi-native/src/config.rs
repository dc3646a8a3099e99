use once_cell::sync::OnceCell;

pub const DEFAULT_SCRATCH_START_SIZE: usize = 1024;
pub const DEFAULT_SCRATCH_LONGEST: usize = 8192;
pub const DEFAULT_GLOB_MAX_ENTRIES: usize = 100_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub scratch_start_size: usize,
    /// Absolute ceiling for any string staged in the scratch buffer.
    pub scratch_longest: usize,
    pub glob_max_entries: usize,
    pub mark_dirs: bool,
    pub follow_symlinks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scratch_start_size: DEFAULT_SCRATCH_START_SIZE,
            scratch_longest: DEFAULT_SCRATCH_LONGEST,
            glob_max_entries: DEFAULT_GLOB_MAX_ENTRIES,
            mark_dirs: true,
            follow_symlinks: true,
        }
    }
}

static CONFIG: OnceCell<Config> = OnceCell::new();

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_usize_nonzero(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

fn load_config() -> Config {
    let scratch_start_size =
        env_usize_nonzero("SVLIB_SCRATCH_START_SIZE", DEFAULT_SCRATCH_START_SIZE);
    let scratch_longest = env_usize_nonzero("SVLIB_SCRATCH_LONGEST", DEFAULT_SCRATCH_LONGEST)
        .max(scratch_start_size);
    let cfg = Config {
        scratch_start_size,
        scratch_longest,
        glob_max_entries: env_usize_nonzero("SVLIB_GLOB_MAX_ENTRIES", DEFAULT_GLOB_MAX_ENTRIES),
        mark_dirs: env_bool("SVLIB_GLOB_MARK_DIRS", true),
        follow_symlinks: env_bool("SVLIB_GLOB_FOLLOW_SYMLINKS", true),
    };
    log::debug!("svlib: loaded config {cfg:?}");
    cfg
}

pub fn config() -> &'static Config {
    CONFIG.get_or_init(load_config)
}
