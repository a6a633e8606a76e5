//! Tunables of the auto-explain module.
//!
//! Values come from three places: the defaults below, an `[auto_explain]`
//! table in a TOML file, and `auto_explain.<name> = value` assignments made
//! through [`AutoExplainConfig::set`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PlanError, Result};
use crate::explain::ExplainFormat;

/// Prefix reserved for the module's settings.
pub const SETTING_PREFIX: &str = "auto_explain.";

/// Names accepted after [`SETTING_PREFIX`].
pub const SETTING_NAMES: &[&str] = &[
    "log_min_duration",
    "log_parameter_max_length",
    "log_analyze",
    "log_verbose",
    "log_buffers",
    "log_wal",
    "log_triggers",
    "log_timing",
    "log_settings",
    "log_format",
    "log_level",
    "log_nested_statements",
    "sample_rate",
];

/// Severity a logged plan is emitted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most detailed debug level.
    Debug5,
    /// Debug level 4.
    Debug4,
    /// Debug level 3.
    Debug3,
    /// Debug level 2.
    Debug2,
    /// Debug level 1.
    Debug1,
    /// Alias of `debug2` in server logs.
    Debug,
    /// Informational.
    Info,
    /// Notice.
    Notice,
    /// Warning.
    Warning,
    /// Server log.
    #[default]
    Log,
}

impl LogLevel {
    /// Lower-case setting value.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug5 => "debug5",
            LogLevel::Debug4 => "debug4",
            LogLevel::Debug3 => "debug3",
            LogLevel::Debug2 => "debug2",
            LogLevel::Debug1 => "debug1",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Log => "log",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "debug5" => LogLevel::Debug5,
            "debug4" => LogLevel::Debug4,
            "debug3" => LogLevel::Debug3,
            "debug2" => LogLevel::Debug2,
            "debug1" => LogLevel::Debug1,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "notice" => LogLevel::Notice,
            "warning" => LogLevel::Warning,
            "log" => LogLevel::Log,
            _ => return Err(()),
        })
    }
}

/// Every tunable of the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoExplainConfig {
    /// Minimum duration in milliseconds; `-1` disables logging.
    #[serde(deserialize_with = "deserialize_duration_ms")]
    pub log_min_duration: i32,
    /// Bytes of each bound parameter to log; `-1` logs them whole.
    #[serde(deserialize_with = "deserialize_size_bytes")]
    pub log_parameter_max_length: i32,
    /// Collect per-node counters for logged statements.
    pub log_analyze: bool,
    /// Log verbose plans.
    pub log_verbose: bool,
    /// Log buffer usage.
    pub log_buffers: bool,
    /// Log WAL usage.
    pub log_wal: bool,
    /// Log trigger statistics.
    pub log_triggers: bool,
    /// Time individual nodes.
    pub log_timing: bool,
    /// Log modified planner settings.
    pub log_settings: bool,
    /// Format of logged plans.
    pub log_format: ExplainFormat,
    /// Severity of logged plans.
    pub log_level: LogLevel,
    /// Consider statements run inside other statements.
    pub log_nested_statements: bool,
    /// Fraction of top-level statements considered.
    pub sample_rate: f64,
}

impl Default for AutoExplainConfig {
    fn default() -> Self {
        AutoExplainConfig {
            log_min_duration: -1,
            log_parameter_max_length: -1,
            log_analyze: false,
            log_verbose: false,
            log_buffers: false,
            log_wal: false,
            log_triggers: false,
            log_timing: true,
            log_settings: false,
            log_format: ExplainFormat::Text,
            log_level: LogLevel::Log,
            log_nested_statements: false,
            sample_rate: 1.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrText {
    Int(i64),
    Text(String),
}

fn deserialize_duration_ms<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i32, D::Error> {
    match IntOrText::deserialize(d)? {
        IntOrText::Int(v) => i32::try_from(v).map_err(serde::de::Error::custom),
        IntOrText::Text(s) => parse_duration_ms(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration \"{s}\""))),
    }
}

fn deserialize_size_bytes<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i32, D::Error> {
    match IntOrText::deserialize(d)? {
        IntOrText::Int(v) => i32::try_from(v).map_err(serde::de::Error::custom),
        IntOrText::Text(s) => parse_size_bytes(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid size \"{s}\""))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auto_explain: AutoExplainConfig,
}

/// Splits `"250ms"` into `(250, "ms")`. A bare number has an empty unit.
fn split_unit(value: &str) -> Option<(i64, &str)> {
    let value = value.trim();
    let digits = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    let number = value[..digits].parse::<i64>().ok()?;
    Some((number, value[digits..].trim()))
}

fn scaled(number: i64, factor: i64) -> Option<i32> {
    number.checked_mul(factor).and_then(|v| i32::try_from(v).ok())
}

/// Parses a duration in milliseconds, accepting `ms`, `s`, `min`, `h` and
/// `d` suffixes.
pub fn parse_duration_ms(value: &str) -> Option<i32> {
    let (number, unit) = split_unit(value)?;
    let factor = match unit {
        "" | "ms" => 1,
        "s" => 1_000,
        "min" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return None,
    };
    scaled(number, factor)
}

/// Parses a size in bytes, accepting `B`, `kB`, `MB` and `GB` suffixes.
pub fn parse_size_bytes(value: &str) -> Option<i32> {
    let (number, unit) = split_unit(value)?;
    let factor = match unit {
        "" | "B" => 1,
        "kB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        _ => return None,
    };
    scaled(number, factor)
}

/// Parses the boolean spellings a setting accepts.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn show_bool(value: bool) -> String {
    let shown = if value { "on" } else { "off" };
    shown.to_string()
}

fn show_duration(ms: i32) -> String {
    match ms {
        -1 => "-1".to_string(),
        ms if ms != 0 && ms % 60_000 == 0 => format!("{}min", ms / 60_000),
        ms if ms != 0 && ms % 1_000 == 0 => format!("{}s", ms / 1_000),
        ms => format!("{ms}ms"),
    }
}

fn show_size(bytes: i32) -> String {
    match bytes {
        -1 => "-1".to_string(),
        b if b != 0 && b % (1 << 20) == 0 => format!("{}MB", b >> 20),
        b if b != 0 && b % (1 << 10) == 0 => format!("{}kB", b >> 10),
        b => format!("{b}B"),
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("plantree").join("config.toml"))
}

impl AutoExplainConfig {
    /// Reads the `[auto_explain]` table of a TOML document. Other tables are
    /// left to their owners.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| PlanError::Config {
            message: e.to_string(),
        })?;
        file.auto_explain.validate()?;
        Ok(file.auto_explain)
    }

    /// Reads `path`, or the default location when `path` is `None`. A
    /// missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(default) if default.exists() => default,
                _ => return Ok(Self::default()),
            },
        };
        let text = fs::read_to_string(&path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the ranges a file cannot express in its types.
    pub fn validate(&self) -> Result<()> {
        if self.log_min_duration < -1 {
            return Err(invalid("log_min_duration", &self.log_min_duration.to_string()));
        }
        if self.log_parameter_max_length < -1 {
            return Err(invalid(
                "log_parameter_max_length",
                &self.log_parameter_max_length.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(invalid("sample_rate", &self.sample_rate.to_string()));
        }
        Ok(())
    }

    /// Assigns `name = value`. `name` must carry the `auto_explain.` prefix;
    /// only privileged callers may change anything.
    pub fn set(&mut self, name: &str, value: &str, privileged: bool) -> Result<()> {
        let full = name.to_ascii_lowercase();
        let short = setting_name(&full)?;
        if !privileged {
            return Err(PlanError::PermissionDenied { name: full });
        }
        let bad = || invalid(&full, value);
        match short {
            "log_min_duration" => {
                let ms = parse_duration_ms(value).filter(|&v| v >= -1).ok_or_else(bad)?;
                self.log_min_duration = ms;
            }
            "log_parameter_max_length" => {
                let len = parse_size_bytes(value).filter(|&v| v >= -1).ok_or_else(bad)?;
                self.log_parameter_max_length = len;
            }
            "log_format" => {
                self.log_format = value
                    .trim()
                    .to_ascii_lowercase()
                    .parse::<ExplainFormat>()
                    .map_err(|_| bad())?;
            }
            "log_level" => {
                self.log_level = value.trim().parse::<LogLevel>().map_err(|_| bad())?;
            }
            "sample_rate" => {
                let rate = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|r| (0.0..=1.0).contains(r))
                    .ok_or_else(bad)?;
                self.sample_rate = rate;
            }
            flag => {
                let parsed = parse_bool(value).ok_or_else(bad)?;
                *self.flag_mut(flag).ok_or_else(bad)? = parsed;
            }
        }
        Ok(())
    }

    /// Current value of `name` in the form [`AutoExplainConfig::set`]
    /// accepts.
    pub fn show(&self, name: &str) -> Result<String> {
        let full = name.to_ascii_lowercase();
        Ok(match setting_name(&full)? {
            "log_min_duration" => show_duration(self.log_min_duration),
            "log_parameter_max_length" => show_size(self.log_parameter_max_length),
            "log_format" => self.log_format.to_string(),
            "log_level" => self.log_level.to_string(),
            "sample_rate" => self.sample_rate.to_string(),
            "log_analyze" => show_bool(self.log_analyze),
            "log_verbose" => show_bool(self.log_verbose),
            "log_buffers" => show_bool(self.log_buffers),
            "log_wal" => show_bool(self.log_wal),
            "log_triggers" => show_bool(self.log_triggers),
            "log_timing" => show_bool(self.log_timing),
            "log_settings" => show_bool(self.log_settings),
            "log_nested_statements" => show_bool(self.log_nested_statements),
            _ => return Err(PlanError::UnknownSetting { name: full }),
        })
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        Some(match name {
            "log_analyze" => &mut self.log_analyze,
            "log_verbose" => &mut self.log_verbose,
            "log_buffers" => &mut self.log_buffers,
            "log_wal" => &mut self.log_wal,
            "log_triggers" => &mut self.log_triggers,
            "log_timing" => &mut self.log_timing,
            "log_settings" => &mut self.log_settings,
            "log_nested_statements" => &mut self.log_nested_statements,
            _ => return None,
        })
    }
}

fn setting_name(full: &str) -> Result<&str> {
    full.strip_prefix(SETTING_PREFIX)
        .filter(|short| SETTING_NAMES.contains(short))
        .ok_or_else(|| PlanError::UnknownSetting {
            name: full.to_string(),
        })
}

fn invalid(name: &str, value: &str) -> PlanError {
    let name = if name.starts_with(SETTING_PREFIX) {
        name.to_string()
    } else {
        format!("{SETTING_PREFIX}{name}")
    };
    PlanError::InvalidSetting {
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = AutoExplainConfig::default();
        assert_eq!(cfg.log_min_duration, -1);
        assert_eq!(cfg.log_parameter_max_length, -1);
        assert!(cfg.log_timing);
        assert!(!cfg.log_analyze);
        assert_eq!(cfg.sample_rate, 1.0);
        assert_eq!(cfg.log_format, ExplainFormat::Text);
        assert_eq!(cfg.log_level, LogLevel::Log);
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration_ms("250"), Some(250));
        assert_eq!(parse_duration_ms("250ms"), Some(250));
        assert_eq!(parse_duration_ms("2s"), Some(2_000));
        assert_eq!(parse_duration_ms("1min"), Some(60_000));
        assert_eq!(parse_duration_ms("-1"), Some(-1));
        assert_eq!(parse_duration_ms("3 fortnights"), None);
        assert_eq!(parse_duration_ms("99999999d"), None);
    }

    #[test]
    fn set_and_show() {
        let mut cfg = AutoExplainConfig::default();
        cfg.set("auto_explain.log_min_duration", "1s", true).unwrap();
        assert_eq!(cfg.log_min_duration, 1_000);
        assert_eq!(cfg.show("auto_explain.log_min_duration").unwrap(), "1s");

        cfg.set("AUTO_EXPLAIN.LOG_ANALYZE", "on", true).unwrap();
        assert!(cfg.log_analyze);
        cfg.set("auto_explain.log_timing", "0", true).unwrap();
        assert_eq!(cfg.show("auto_explain.log_timing").unwrap(), "off");

        cfg.set("auto_explain.log_format", "JSON", true).unwrap();
        assert_eq!(cfg.log_format, ExplainFormat::Json);
        cfg.set("auto_explain.log_level", "warning", true).unwrap();
        assert_eq!(cfg.log_level, LogLevel::Warning);
        cfg.set("auto_explain.sample_rate", "0.25", true).unwrap();
        assert_eq!(cfg.sample_rate, 0.25);
        cfg.set("auto_explain.log_parameter_max_length", "1kB", true).unwrap();
        assert_eq!(cfg.log_parameter_max_length, 1024);
    }

    #[test]
    fn rejects_bad_assignments() {
        let mut cfg = AutoExplainConfig::default();
        let err = cfg.set("auto_explain.bicycle", "on", true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration parameter name \"auto_explain.bicycle\""
        );
        let err = cfg.set("auto_explain.log_analyze", "on", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "permission denied to set parameter \"auto_explain.log_analyze\""
        );
        assert!(!cfg.log_analyze);
        assert!(matches!(
            cfg.set("auto_explain.sample_rate", "1.5", true),
            Err(PlanError::InvalidSetting { .. })
        ));
        assert!(matches!(
            cfg.set("auto_explain.log_min_duration", "-2", true),
            Err(PlanError::InvalidSetting { .. })
        ));
        assert!(matches!(
            cfg.set("auto_explain.log_verbose", "maybe", true),
            Err(PlanError::InvalidSetting { .. })
        ));
        assert!(matches!(
            cfg.set("work_mem", "4MB", true),
            Err(PlanError::UnknownSetting { .. })
        ));
    }

    #[test]
    fn toml_table() {
        let cfg = AutoExplainConfig::from_toml_str(
            r#"
            [auto_explain]
            log_min_duration = "100ms"
            log_analyze = true
            log_format = "yaml"
            sample_rate = 0.5

            [cli]
            color = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_min_duration, 100);
        assert!(cfg.log_analyze);
        assert_eq!(cfg.log_format, ExplainFormat::Yaml);
        assert_eq!(cfg.sample_rate, 0.5);
        assert!(cfg.log_timing);

        assert!(AutoExplainConfig::from_toml_str("[auto_explain]\nlog_bicycles = true\n").is_err());
        assert!(AutoExplainConfig::from_toml_str("[auto_explain]\nsample_rate = 2.0\n").is_err());
        assert_eq!(AutoExplainConfig::from_toml_str("").unwrap(), AutoExplainConfig::default());
    }
}
