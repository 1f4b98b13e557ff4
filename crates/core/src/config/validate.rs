use std::collections::HashSet;

use super::{types::Config, AuthMethod, ConfigError};
use crate::maintenance::MAX_WINDOW_HOURS;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - API key auth has at least one key
/// - Ladder is non-empty, labels are unique and usable as directory names
/// - Every tier has non-zero dimensions and bandwidth
/// - Encoder segment duration and parallelism are non-zero
/// - Trending window is between 1 hour and `MAX_WINDOW_HOURS`
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey && config.auth.api_keys.is_empty() {
        return Err(ConfigError::ValidationError(
            "auth.api_keys must not be empty when using api_key auth".to_string(),
        ));
    }

    if config.ladder.is_empty() {
        return Err(ConfigError::ValidationError(
            "ladder must contain at least one quality tier".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for tier in &config.ladder {
        if !is_path_safe(&tier.label) {
            return Err(ConfigError::ValidationError(format!(
                "ladder label '{}' must be non-empty and contain only [A-Za-z0-9_-]",
                tier.label
            )));
        }
        if !seen.insert(tier.label.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "ladder label '{}' is duplicated",
                tier.label
            )));
        }
        if tier.width == 0 || tier.height == 0 {
            return Err(ConfigError::ValidationError(format!(
                "ladder tier '{}' has a zero dimension",
                tier.label
            )));
        }
        if tier.bandwidth == 0 {
            return Err(ConfigError::ValidationError(format!(
                "ladder tier '{}' has zero bandwidth",
                tier.label
            )));
        }
    }

    if config.encoder.segment_duration_secs == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.segment_duration_secs cannot be 0".to_string(),
        ));
    }

    if config.encoder.max_parallel_encodes == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.max_parallel_encodes cannot be 0".to_string(),
        ));
    }

    if config.trending.window_hours == 0 || config.trending.window_hours > MAX_WINDOW_HOURS {
        return Err(ConfigError::ValidationError(format!(
            "trending.window_hours must be between 1 and {}",
            MAX_WINDOW_HOURS
        )));
    }

    Ok(())
}

fn is_path_safe(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::ladder::QualityTier;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[auth]
method = "none"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_api_key_without_keys_fails() {
        let mut config = base_config();
        config.auth.method = AuthMethod::ApiKey;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_ladder_fails() {
        let mut config = base_config();
        config.ladder.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_label_fails() {
        let mut config = base_config();
        config.ladder.push(QualityTier::new("720p", 1280, 720, 3_000_000));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicated"));
    }

    #[test]
    fn test_validate_unsafe_label_fails() {
        let mut config = base_config();
        config.ladder = vec![QualityTier::new("../up", 640, 360, 800_000)];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_bandwidth_fails() {
        let mut config = base_config();
        config.ladder = vec![QualityTier::new("360p", 640, 360, 0)];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_trending_window_bounds() {
        let mut config = base_config();
        config.trending.window_hours = 0;
        assert!(validate_config(&config).is_err());

        config.trending.window_hours = i64::MAX as u64;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("trending.window_hours"));

        config.trending.window_hours = MAX_WINDOW_HOURS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_parallelism_fails() {
        let mut config = base_config();
        config.encoder.max_parallel_encodes = 0;
        assert!(validate_config(&config).is_err());
    }
}
