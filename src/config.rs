use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;

/// A century; seeded dates stay well inside chrono's range.
pub const MAX_BACKDATE_WINDOW_DAYS: u32 = 36_500;
pub const MAX_PUBLISH_SEED_SPACING_DAYS: u32 = 365;

#[derive(Deserialize)]
pub struct Paths {
    pub posts_file: PathBuf,
    pub comments_file: Option<PathBuf>,
    pub blogs_file: Option<PathBuf>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Derive {
    pub words_per_minute: u32,
    pub backdate_window_days: u32,
    pub read_count_base: u64,
    pub read_count_ceiling: u64,
    pub rating_steps: Vec<f32>,
    pub fallback_authors: Vec<String>,
    pub fallback_category: String,
    /// Published posts without a date get `index * spacing + 1` days back
    pub publish_seed_spacing_days: u32,
    pub preview_chars: usize,
}

impl Default for Derive {
    fn default() -> Self {
        Derive {
            words_per_minute: 220,
            backdate_window_days: 540,
            read_count_base: 800,
            read_count_ceiling: 24_000,
            rating_steps: vec![2.5, 3.0, 3.5, 4.0, 4.5, 5.0],
            fallback_authors: [
                "Michael Brown",
                "Ava Kapoor",
                "Noah Singh",
                "Sofia Alvarez",
                "Ethan Park",
                "Layla Rahman",
            ].iter().map(|s| s.to_string()).collect(),
            fallback_category: "General".to_string(),
            publish_seed_spacing_days: 2,
            preview_chars: 130,
        }
    }
}

#[derive(Deserialize)]
pub struct Server {
    pub address: String,
    pub port: u16,
}

#[derive(Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct Persistence {
    pub latency_ms: u64,
    /// Status changes for these ids are refused by the simulated endpoint
    pub failing_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone, Debug)]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize)]
pub struct Config {
    pub paths: Paths,
    #[serde(default)]
    pub derive: Derive,
    pub server: Server,
    #[serde(default)]
    pub persistence: Persistence,
    pub log: Option<Log>,
}

fn parse_path(path: PathBuf) -> io::Result<PathBuf> {
    if !path.starts_with("${exe_dir}") {
        return Ok(path);
    }

    let cur_exe = env::current_exe()?;
    let exe_dir = cur_exe.parent()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "Executable has no parent directory"))?;
    let str_path = path.to_string_lossy();
    Ok(PathBuf::from(str_path.replace("${exe_dir}", &exe_dir.to_string_lossy())))
}

fn parse_opt_path(path: Option<PathBuf>) -> io::Result<Option<PathBuf>> {
    path.map(parse_path).transpose()
}

pub fn parse_config(cfg_content: &str) -> io::Result<Config> {
    let cfg = match toml::from_str::<Config>(cfg_content) {
        Ok(cfg) => cfg,
        Err(e) => return Err(io::Error::new(
            ErrorKind::InvalidData, format!("Error parsing configuration file: {}", e))),
    };

    if cfg.derive.words_per_minute == 0 {
        return Err(io::Error::new(ErrorKind::InvalidData, "derive.words_per_minute must be positive"));
    }
    if cfg.derive.backdate_window_days > MAX_BACKDATE_WINDOW_DAYS {
        return Err(io::Error::new(ErrorKind::InvalidData,
                                  format!("derive.backdate_window_days must be at most {}", MAX_BACKDATE_WINDOW_DAYS)));
    }
    if cfg.derive.publish_seed_spacing_days > MAX_PUBLISH_SEED_SPACING_DAYS {
        return Err(io::Error::new(ErrorKind::InvalidData,
                                  format!("derive.publish_seed_spacing_days must be at most {}", MAX_PUBLISH_SEED_SPACING_DAYS)));
    }
    if cfg.derive.rating_steps.is_empty() {
        return Err(io::Error::new(ErrorKind::InvalidData, "derive.rating_steps must not be empty"));
    }
    if cfg.derive.fallback_authors.is_empty() {
        return Err(io::Error::new(ErrorKind::InvalidData, "derive.fallback_authors must not be empty"));
    }

    Ok(cfg)
}

pub fn read_config(cfg_path: &Path) -> io::Result<Config> {
    let cfg_content = match fs::read_to_string(cfg_path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening configuration file {}: {}", cfg_path.display(), e))),
    };

    let mut cfg = parse_config(&cfg_content)?;

    cfg.paths = Paths {
        posts_file: parse_path(cfg.paths.posts_file)?,
        comments_file: parse_opt_path(cfg.paths.comments_file)?,
        blogs_file: parse_opt_path(cfg.paths.blogs_file)?,
    };

    Ok(cfg)
}
