use std::env;
use std::str::FromStr;

use crate::error::PerformanceError;
use crate::outliers::DEFAULT_OUTLIER_THRESHOLD;
use crate::scoring::DEFAULT_TREND_CYCLES;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub outlier_threshold: f64,
    pub trend_cycles: usize,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            trend_cycles: DEFAULT_TREND_CYCLES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    /// Reads `DATABASE_URL` and the `PERF_*` overrides from the environment.
    pub fn from_env() -> Result<Self, PerformanceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PerformanceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            outlier_threshold: parse_or(
                &lookup,
                "PERF_OUTLIER_THRESHOLD",
                defaults.outlier_threshold,
            )?,
            trend_cycles: parse_or(&lookup, "PERF_TREND_CYCLES", defaults.trend_cycles)?,
            max_connections: parse_or(&lookup, "PERF_MAX_CONNECTIONS", defaults.max_connections)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Applies per-invocation flags and revalidates the result.
    pub fn with_overrides(
        &self,
        trend_cycles: Option<usize>,
        outlier_threshold: Option<f64>,
    ) -> Result<Self, PerformanceError> {
        let config = Self {
            trend_cycles: trend_cycles.unwrap_or(self.trend_cycles),
            outlier_threshold: outlier_threshold.unwrap_or(self.outlier_threshold),
            ..self.clone()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PerformanceError> {
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(PerformanceError::InvalidConfig {
                key: "PERF_OUTLIER_THRESHOLD",
                reason: format!("must be a positive number, got {}", self.outlier_threshold),
            });
        }
        if self.trend_cycles == 0 {
            return Err(PerformanceError::InvalidConfig {
                key: "PERF_TREND_CYCLES",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(PerformanceError::InvalidConfig {
                key: "PERF_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, PerformanceError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err: T::Err| PerformanceError::InvalidConfig {
                key,
                reason: format!("{raw:?}: {err}"),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.outlier_threshold, 1.5);
        assert_eq!(config.trend_cycles, 3);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/perf"),
            ("PERF_OUTLIER_THRESHOLD", "2.0"),
            ("PERF_TREND_CYCLES", " 4 "),
        ]))
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/perf"));
        assert_eq!(config.outlier_threshold, 2.0);
        assert_eq!(config.trend_cycles, 4);
    }

    #[test]
    fn overrides_are_validated() {
        let config = Config::default();
        let tuned = config.with_overrides(Some(5), Some(2.5)).unwrap();
        assert_eq!(tuned.trend_cycles, 5);
        assert_eq!(tuned.outlier_threshold, 2.5);
        assert_eq!(config.with_overrides(None, None).unwrap(), config);

        assert!(config.with_overrides(Some(0), None).is_err());
        assert!(config.with_overrides(None, Some(-1.0)).is_err());
        assert!(config.with_overrides(None, Some(0.0)).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("PERF_TREND_CYCLES", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PERF_OUTLIER_THRESHOLD", "-1")])).is_err());
        let err = Config::from_lookup(lookup(&[("PERF_MAX_CONNECTIONS", "many")])).unwrap_err();
        assert!(err.to_string().contains("PERF_MAX_CONNECTIONS"));
    }
}
