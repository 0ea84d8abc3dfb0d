//! Config file loading and merging with CLI flags.
//!
//! The file is a small `key = value` dialect: double-quoted strings (no
//! escape processing, so regex backslashes are written once), integers,
//! booleans, arrays of double-quoted strings, and `#` comments.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use course_sync::DEFAULT_CONCURRENCY;
use course_sync::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use course_sync::sync::DEFAULT_CRAWL_CONCURRENCY;

use crate::cli::Args;

const APP_DIR: &str = "course-sync";
const CONFIG_FILE: &str = "config.toml";

/// Defaults read from the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<u8>,
    pub crawl_concurrency: Option<u8>,
    pub blacklist: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub verbosity: Option<VerbositySetting>,
    pub assume_yes: Option<bool>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI enforces.
    pub(crate) fn validate(&self) -> Result<()> {
        validate_workers("concurrency", self.concurrency)?;
        validate_workers("crawl_concurrency", self.crawl_concurrency)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_workers(field: &str, value: Option<u8>) -> Result<()> {
    if let Some(value) = value
        && !(1..=100).contains(&value)
    {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=100");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    if let Some(value) = value
        && !(1..=3600).contains(&value)
    {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Effective settings after merging CLI > config file > built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub crawl_concurrency: usize,
    /// Config patterns first, then CLI patterns.
    pub blacklist: Vec<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub assume_yes: bool,
    pub default_log_level: &'static str,
    /// Config file that was read, if any.
    pub config_path: Option<PathBuf>,
}

/// Loads the config file (explicit `--config` or the default location) and
/// merges it with `args`.
pub(crate) fn resolve_settings(args: &Args) -> Result<Settings> {
    let (config_path, file) = match &args.config {
        Some(path) => (Some(path.clone()), Some(load_file_config(path)?)),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => {
                let file = load_file_config(&path)?;
                (Some(path), Some(file))
            }
            _ => (None, None),
        },
    };
    Ok(merge(args, file.unwrap_or_default(), config_path))
}

fn merge(args: &Args, file: FileConfig, config_path: Option<PathBuf>) -> Settings {
    let mut blacklist = file.blacklist.unwrap_or_default();
    blacklist.extend(args.blacklist.iter().cloned());

    Settings {
        output_dir: args
            .output_dir
            .clone()
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        concurrency: args
            .concurrency
            .or(file.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from),
        crawl_concurrency: args
            .crawl_concurrency
            .or(file.crawl_concurrency)
            .map_or(DEFAULT_CRAWL_CONCURRENCY, usize::from),
        blacklist,
        connect_timeout_secs: args
            .connect_timeout
            .or(file.connect_timeout_secs)
            .unwrap_or(CONNECT_TIMEOUT_SECS),
        read_timeout_secs: args
            .read_timeout
            .or(file.read_timeout_secs)
            .unwrap_or(READ_TIMEOUT_SECS),
        assume_yes: args.assume_yes || file.assume_yes.unwrap_or(false),
        default_log_level: resolve_default_log_level(args.verbose, args.quiet, file.verbosity),
        config_path,
    }
}

/// Level used when `RUST_LOG` is unset.
///
/// Priority: `--quiet` > `-v`/`-vv` > config `verbosity` > info.
pub(crate) fn resolve_default_log_level(
    verbose: u8,
    quiet: bool,
    configured: Option<VerbositySetting>,
) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => configured.map_or("info", VerbositySetting::log_level),
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/course-sync/config.toml`
/// 2. `$HOME/.config/course-sync/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "concurrency" => {
                cfg.concurrency = Some(parse_unsigned::<u8>(value).with_context(invalid)?);
            }
            "crawl_concurrency" => {
                cfg.crawl_concurrency = Some(parse_unsigned::<u8>(value).with_context(invalid)?);
            }
            "blacklist" => {
                cfg.blacklist = Some(parse_string_array(value).with_context(invalid)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_unsigned::<u64>(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_unsigned::<u64>(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            "assume_yes" => {
                cfg.assume_yes = Some(parse_boolean(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    let raw_value = raw_value.trim();
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    let inner = &raw_value[1..raw_value.len() - 1];
    if inner.contains('"') {
        bail!("Unexpected quote inside string");
    }
    Ok(inner.to_string())
}

fn parse_string_array(raw_value: &str) -> Result<Vec<String>> {
    let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        bail!("Expected array of double-quoted strings");
    };

    let mut items = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (index, ch) in inner.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ',' if !in_string => {
                items.push(parse_string_literal(&inner[start..index])?);
                start = index + 1;
            }
            _ => {}
        }
    }
    if in_string {
        bail!("Unterminated string in array");
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        items.push(parse_string_literal(last)?);
    }
    Ok(items)
}

/// Parses a non-negative integer that must fit `T`.
fn parse_unsigned<T: TryFrom<u64>>(raw_value: &str) -> Result<T> {
    let token = raw_value.trim();
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    let value: u64 = token
        .parse()
        .with_context(|| format!("Expected integer value, got '{token}'"))?;
    T::try_from(value).map_err(|_| anyhow::anyhow!("Integer {value} is too large"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    Ok(match value {
        "default" => VerbositySetting::Default,
        "verbose" => VerbositySetting::Verbose,
        "quiet" => VerbositySetting::Quiet,
        "debug" => VerbositySetting::Debug,
        other => bail!("Unknown verbosity '{other}' (default, verbose, quiet, debug)"),
    })
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
