//! Layered configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables with the `DAYBOOK_` prefix (`DAYBOOK_TIMEZONE=utc`)
//! 2. `<config dir>/daybook/config.toml`
//! 3. Built-in defaults
//!
//! Paths left unset fall back to the platform data directory.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Duration, FixedOffset};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid timezone '{0}': expected 'local', 'utc' or an offset such as '+02:00'")]
    Timezone(String),

    #[error("Invalid code_ttl '{value}': {source}")]
    CodeTtl {
        value: String,
        source: humantime::DurationError,
    },

    #[error("code_ttl '{0}' is too long")]
    CodeTtlRange(String),

    #[error("No data directory available, set DAYBOOK_JOURNAL_FILE.")]
    NoDataDir,
}

fn default_timezone() -> String {
    "local".to_string()
}

fn default_code_ttl() -> String {
    "15m".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub journal_file: Option<PathBuf>,

    #[serde(default)]
    pub drafts_file: Option<PathBuf>,

    #[serde(default)]
    pub session_file: Option<PathBuf>,

    /// Zone that decides where a day starts and ends.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// How long a login code stays valid (humantime, e.g. "15m").
    #[serde(default = "default_code_ttl")]
    pub code_ttl: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            journal_file: None,
            drafts_file: None,
            session_file: None,
            timezone: default_timezone(),
            code_ttl: default_code_ttl(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        let config_file = project_dirs().map(|dirs| dirs.config_dir().join("config.toml"));
        Self::figment(config_file.as_deref())
            .extract()
            .map_err(|error| ConfigError::Load(Box::new(error)))
    }

    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = config_file {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }
        figment.merge(Env::prefixed("DAYBOOK_"))
    }

    pub fn zone(&self) -> Result<Zone, ConfigError> {
        self.timezone.parse()
    }

    pub fn code_ttl(&self) -> Result<Duration, ConfigError> {
        let ttl = humantime::parse_duration(&self.code_ttl).map_err(|source| ConfigError::CodeTtl {
            value: self.code_ttl.clone(),
            source,
        })?;
        Duration::from_std(ttl).map_err(|_| ConfigError::CodeTtlRange(self.code_ttl.clone()))
    }

    pub fn journal_path(&self) -> Result<PathBuf, ConfigError> {
        resolve(&self.journal_file, "db.sqlite")
    }

    pub fn drafts_path(&self) -> Result<PathBuf, ConfigError> {
        resolve(&self.drafts_file, "drafts.json")
    }

    pub fn session_path(&self) -> Result<PathBuf, ConfigError> {
        resolve(&self.session_file, "session.json")
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "gozque", "daybook")
}

fn resolve(configured: &Option<PathBuf>, file_name: &str) -> Result<PathBuf, ConfigError> {
    if let Some(path) = configured {
        return Ok(path.clone());
    }
    project_dirs()
        .map(|dirs| dirs.data_dir().join(file_name))
        .ok_or(ConfigError::NoDataDir)
}

/// The time zone used to tell calendar days apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl FromStr for Zone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("local") {
            return Ok(Zone::Local);
        }
        if wanted.eq_ignore_ascii_case("utc") || wanted.eq_ignore_ascii_case("z") {
            return Ok(Zone::Utc);
        }
        parse_offset(wanted)
            .map(Zone::Fixed)
            .ok_or_else(|| ConfigError::Timezone(wanted.to_string()))
    }
}

/// Parse "+HH:MM", "-HH:MM" or "+HH".
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.chars().next()? {
        '+' => (1, &s[1..]),
        '-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_correct() {
        let config = Config::default();
        assert_eq!(config.zone().unwrap(), Zone::Local);
        assert_eq!(config.code_ttl().unwrap(), Duration::minutes(15));
        assert!(config.journal_file.is_none());
    }

    #[rstest]
    #[case("local", Zone::Local)]
    #[case("UTC", Zone::Utc)]
    #[case("+02:00", Zone::Fixed(FixedOffset::east_opt(7200).unwrap()))]
    #[case("-05:30", Zone::Fixed(FixedOffset::west_opt(5 * 3600 + 1800).unwrap()))]
    #[case("+09", Zone::Fixed(FixedOffset::east_opt(9 * 3600).unwrap()))]
    fn zones_parse(#[case] input: &str, #[case] expected: Zone) {
        assert_eq!(input.parse::<Zone>().unwrap(), expected);
    }

    #[rstest]
    #[case("Mars/Olympus")]
    #[case("+25:00")]
    #[case("02:00")]
    fn bad_zones_are_rejected(#[case] input: &str) {
        assert!(input.parse::<Zone>().is_err());
    }

    #[test]
    fn bad_ttl_is_rejected() {
        let config = Config {
            code_ttl: "soon".to_string(),
            ..Config::default()
        };
        assert!(config.code_ttl().is_err());
    }

    #[test]
    fn file_and_env_layers_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                timezone = "utc"
                journal_file = "/tmp/journal.sqlite"
                "#,
            )?;
            jail.set_env("DAYBOOK_CODE_TTL", "5m");
            jail.set_env("DAYBOOK_TIMEZONE", "+01:00");

            let config: Config = Config::figment(Some(Path::new("config.toml"))).extract()?;
            assert_eq!(config.journal_path().unwrap(), PathBuf::from("/tmp/journal.sqlite"));
            assert_eq!(config.code_ttl().unwrap(), Duration::minutes(5));
            assert_eq!(
                config.zone().unwrap(),
                Zone::Fixed(FixedOffset::east_opt(3600).unwrap())
            );
            Ok(())
        });
    }

    #[test]
    fn missing_config_file_is_ignored() {
        figment::Jail::expect_with(|_jail| {
            let config: Config = Config::figment(Some(Path::new("absent.toml"))).extract()?;
            assert_eq!(config.timezone, "local");
            Ok(())
        });
    }
}
