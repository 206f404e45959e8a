//! Throttle rules per sentence type and the settings of the recorder binary.

use chrono::Duration;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

use crate::err::ConfigError;

pub const DEFAULT_SENTENCE: &str = "$GPGGA";
const DEFAULT_INTERVAL_SECS: i64 = 10;

/// How often and how a sentence type is recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleRule {
    /// Minimum time between two recorded events. An event exactly one
    /// interval after the previous one is still suppressed.
    pub interval: Duration,
    /// Severity used by the log sink.
    pub level: Level,
    /// Also log the verbatim line.
    pub log_original: bool,
}

impl ThrottleRule {
    pub fn new(interval: Duration) -> Self {
        ThrottleRule {
            interval,
            level: Level::DEBUG,
            log_original: false,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn log_original(mut self, log_original: bool) -> Self {
        self.log_original = log_original;
        self
    }
}

/// Sentence identifier → rule. Sentence types without a rule are never
/// recorded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThrottleConfig {
    rules: HashMap<String, ThrottleRule>,
}

impl ThrottleConfig {
    /// A configuration that records nothing.
    pub fn new() -> Self {
        ThrottleConfig {
            rules: HashMap::new(),
        }
    }

    /// `$GPGGA` every 10 seconds at debug level, including the original line.
    pub fn gga_default() -> Self {
        ThrottleConfig::new().with_rule(
            DEFAULT_SENTENCE,
            ThrottleRule::new(Duration::seconds(DEFAULT_INTERVAL_SECS)).log_original(true),
        )
    }

    pub fn with_rule<S: Into<String>>(mut self, sentence_id: S, rule: ThrottleRule) -> Self {
        self.rules.insert(sentence_id.into(), rule);
        self
    }

    #[inline]
    pub fn get(&self, sentence_id: &str) -> Option<&ThrottleRule> {
        self.rules.get(sentence_id)
    }

    #[inline]
    pub fn contains(&self, sentence_id: &str) -> bool {
        self.rules.contains_key(sentence_id)
    }
}

/// Which sinks the binary feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderKind {
    Log,
    Csv,
}

impl FromStr for RecorderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(RecorderKind::Log),
            "csv" => Ok(RecorderKind::Csv),
            _ => Err(ConfigError::InvalidValue("NMEA_RECORDERS", s.to_owned())),
        }
    }
}

/// Settings of the `nmea-recorder` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Device (or any readable file) the sentences come from.
    pub device: PathBuf,
    /// Directory for the log and CSV files.
    pub log_dir: PathBuf,
    /// Interval of the `$GPGGA` rule.
    pub interval: Duration,
    /// Pause after each line, bounds CPU usage.
    pub poll: std::time::Duration,
    pub log_original: bool,
    /// Print every raw line to stdout.
    pub echo: bool,
    pub recorders: Vec<RecorderKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            device: PathBuf::from("/dev/ttyACM0"),
            log_dir: PathBuf::from("."),
            interval: Duration::seconds(DEFAULT_INTERVAL_SECS),
            poll: std::time::Duration::from_millis(100),
            log_original: false,
            echo: true,
            recorders: vec![RecorderKind::Csv],
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the settings through `lookup`, falling back to the defaults for
    /// unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(device) = lookup("NMEA_DEVICE") {
            settings.device = PathBuf::from(device);
        }
        if let Some(dir) = lookup("NMEA_LOG_DIR") {
            settings.log_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("NMEA_INTERVAL_SECS") {
            let secs = parse_number::<u32>("NMEA_INTERVAL_SECS", &secs)?;
            settings.interval = Duration::seconds(i64::from(secs));
        }
        if let Some(ms) = lookup("NMEA_POLL_MS") {
            settings.poll = std::time::Duration::from_millis(parse_number("NMEA_POLL_MS", &ms)?);
        }
        if let Some(flag) = lookup("NMEA_LOG_ORIGINAL") {
            settings.log_original = parse_flag("NMEA_LOG_ORIGINAL", &flag)?;
        }
        if let Some(flag) = lookup("NMEA_ECHO") {
            settings.echo = parse_flag("NMEA_ECHO", &flag)?;
        }
        if let Some(list) = lookup("NMEA_RECORDERS") {
            settings.recorders = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(RecorderKind::from_str)
                .collect::<Result<_, _>>()?;
        }

        Ok(settings)
    }

    /// A fresh throttle configuration for one recorder.
    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig::new().with_rule(
            DEFAULT_SENTENCE,
            ThrottleRule::new(self.interval).log_original(self.log_original),
        )
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    T::from_str(value.trim()).map_err(|_| ConfigError::InvalidValue(key, value.to_owned()))
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key, value.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn unset_keys_use_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn keys_override_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("NMEA_DEVICE", "/dev/ttyUSB0"),
            ("NMEA_LOG_DIR", "/var/log/gps"),
            ("NMEA_INTERVAL_SECS", "30"),
            ("NMEA_POLL_MS", "5"),
            ("NMEA_LOG_ORIGINAL", "yes"),
            ("NMEA_ECHO", "0"),
            ("NMEA_RECORDERS", "log, csv"),
        ]))
        .unwrap();

        assert_eq!(settings.device, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(settings.log_dir, PathBuf::from("/var/log/gps"));
        assert_eq!(settings.interval, Duration::seconds(30));
        assert_eq!(settings.poll, std::time::Duration::from_millis(5));
        assert!(settings.log_original);
        assert!(!settings.echo);
        assert_eq!(settings.recorders, vec![RecorderKind::Log, RecorderKind::Csv]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_matches!(
            Settings::from_lookup(lookup(&[("NMEA_INTERVAL_SECS", "-1")])),
            Err(ConfigError::InvalidValue("NMEA_INTERVAL_SECS", _))
        );
        assert_matches!(
            Settings::from_lookup(lookup(&[("NMEA_ECHO", "maybe")])),
            Err(ConfigError::InvalidValue("NMEA_ECHO", _))
        );
        assert_matches!(
            Settings::from_lookup(lookup(&[("NMEA_RECORDERS", "csv,screen")])),
            Err(ConfigError::InvalidValue("NMEA_RECORDERS", _))
        );
    }

    #[test]
    fn configs_are_independent() {
        let settings = Settings::default();
        let a = settings.throttle_config();
        let b = a.clone().with_rule("$GPRMC", ThrottleRule::new(Duration::seconds(1)));
        assert!(!a.contains("$GPRMC"));
        assert!(b.contains("$GPRMC"));
        assert_eq!(a.get("$GPGGA").unwrap().interval, Duration::seconds(10));
    }

    #[test]
    fn gga_default_logs_the_original() {
        let config = ThrottleConfig::gga_default();
        let rule = config.get("$GPGGA").unwrap();
        assert_eq!(rule.level, Level::DEBUG);
        assert!(rule.log_original);
        assert!(!ThrottleConfig::new().contains("$GPGGA"));
    }
}
