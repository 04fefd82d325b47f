use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_file: PathBuf,
    pub assignments_file: PathBuf,
    pub public_dir: PathBuf,
    pub shutdown_grace: Duration,
    /// Fixed seed for the first draw; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_file: PathBuf::from("data.json"),
            assignments_file: PathBuf::from("assignments.json"),
            public_dir: PathBuf::from("public"),
            shutdown_grace: Duration::from_secs(10),
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |var: &str, default: PathBuf| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        Ok(Self {
            port: parsed(&lookup, "PORT")?.unwrap_or(defaults.port),
            data_file: path("SANTA_DATA_FILE", defaults.data_file),
            assignments_file: path("SANTA_ASSIGNMENTS_FILE", defaults.assignments_file),
            public_dir: path("SANTA_PUBLIC_DIR", defaults.public_dir),
            shutdown_grace: parsed(&lookup, "SANTA_SHUTDOWN_GRACE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            seed: parsed(&lookup, "SANTA_SEED")?,
        })
    }
}

fn parsed<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]).unwrap(), Config::default());
        assert_eq!(Config::default().port, 3000);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("SANTA_DATA_FILE", "/var/santa/users.json"),
            ("SANTA_SHUTDOWN_GRACE_SECS", "3"),
            ("SANTA_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.data_file, PathBuf::from("/var/santa/users.json"));
        assert_eq!(cfg.assignments_file, PathBuf::from("assignments.json"));
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(3));
        assert_eq!(cfg.seed, Some(42));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("PORT", " "), ("SANTA_PUBLIC_DIR", "")]).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn rejects_bad_port() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PORT",
                value: "eighty".into()
            }
        );
        assert!(config(&[("PORT", "70000")]).is_err());
    }
}
