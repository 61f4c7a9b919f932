use std::env;

use tracing::info;

use crate::error::{HarvestError, Result};

/// Application configuration loaded from environment variables.
/// Built once at startup and passed explicitly to each workflow.
#[derive(Debug, Clone)]
pub struct Config {
    // Collection
    pub subreddit: String,
    pub hour_interval: u32,
    pub n_days_time_lapsed_submissions: u32,
    pub allow_partial_refetch: bool,

    // Diagnostics
    pub verbose: bool,
    /// Strict projection: attribute lookup failures abort the run.
    pub debug: bool,

    // Storage
    pub storage_root: String,
    pub original_load_bucket: String,
    pub n_days_old_bucket: String,
    pub mappings_dir: Option<String>,

    // Reddit
    pub reddit_base_url: Option<String>,
    pub reddit_user_agent: String,
    pub reddit_access_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Missing required keys
    /// and malformed values are configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hour_interval = parse_or(get("HOUR_INTERVAL"), "HOUR_INTERVAL", 1u32)?;
        if hour_interval == 0 {
            return Err(HarvestError::Config(
                "HOUR_INTERVAL must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            subreddit: get("SUBREDDIT").ok_or_else(|| missing("SUBREDDIT"))?,
            hour_interval,
            n_days_time_lapsed_submissions: parse_or(
                get("N_DAYS_TIME_LAPSED_SUBMISSIONS"),
                "N_DAYS_TIME_LAPSED_SUBMISSIONS",
                7u32,
            )?,
            allow_partial_refetch: parse_flag(
                get("ALLOW_PARTIAL_REFETCH"),
                "ALLOW_PARTIAL_REFETCH",
                true,
            )?,
            verbose: parse_flag(get("VERBOSE"), "VERBOSE", false)?,
            debug: parse_flag(get("DEBUG"), "DEBUG", false)?,
            storage_root: get("STORAGE_ROOT").unwrap_or_else(|| "./data".to_string()),
            original_load_bucket: get("ORIGINAL_LOAD_BUCKET")
                .unwrap_or_else(|| "original-load".to_string()),
            n_days_old_bucket: get("N_DAYS_OLD_BUCKET")
                .unwrap_or_else(|| "n-days-old".to_string()),
            mappings_dir: get("MAPPINGS_DIR"),
            reddit_base_url: get("REDDIT_BASE_URL"),
            reddit_user_agent: get("REDDIT_USER_AGENT")
                .unwrap_or_else(|| "timelapse-harvester/0.1".to_string()),
            reddit_access_token: get("REDDIT_ACCESS_TOKEN"),
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        let token = if self.reddit_access_token.is_some() {
            "<set>"
        } else {
            "<unset>"
        };
        info!(
            subreddit = self.subreddit.as_str(),
            hour_interval = self.hour_interval,
            n_days = self.n_days_time_lapsed_submissions,
            allow_partial_refetch = self.allow_partial_refetch,
            verbose = self.verbose,
            debug = self.debug,
            storage_root = self.storage_root.as_str(),
            original_load_bucket = self.original_load_bucket.as_str(),
            n_days_old_bucket = self.n_days_old_bucket.as_str(),
            mappings_dir = ?self.mappings_dir,
            reddit_base_url = ?self.reddit_base_url,
            reddit_access_token = token,
            "Loaded config"
        );
    }
}

fn missing(key: &str) -> HarvestError {
    HarvestError::Config(format!("{key} environment variable is required"))
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| HarvestError::Config(format!("{key} must be a number, got {raw:?}"))),
    }
}

fn parse_flag(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HarvestError::Config(format!(
            "{key} must be a boolean, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_subreddit_is_set() {
        let config = Config::from_lookup(lookup(&[("SUBREDDIT", "wallstreetbets")])).unwrap();
        assert_eq!(config.subreddit, "wallstreetbets");
        assert_eq!(config.hour_interval, 1);
        assert_eq!(config.n_days_time_lapsed_submissions, 7);
        assert!(config.allow_partial_refetch);
        assert!(!config.verbose);
        assert!(!config.debug);
        assert_eq!(config.original_load_bucket, "original-load");
        assert_eq!(config.n_days_old_bucket, "n-days-old");
    }

    #[test]
    fn missing_subreddit_is_config_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn false_string_is_false() {
        let config = Config::from_lookup(lookup(&[
            ("SUBREDDIT", "stocks"),
            ("VERBOSE", "False"),
            ("DEBUG", "1"),
        ]))
        .unwrap();
        assert!(!config.verbose);
        assert!(config.debug);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("SUBREDDIT", "stocks"),
            ("HOUR_INTERVAL", "two"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("HOUR_INTERVAL"));

        let err = Config::from_lookup(lookup(&[("SUBREDDIT", "stocks"), ("DEBUG", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));

        let err = Config::from_lookup(lookup(&[("SUBREDDIT", "stocks"), ("HOUR_INTERVAL", "0")]))
            .unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }
}
