use crate::config::types::{Config, InputConfig, OutputConfig, ProbeConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_probe_config(&config.probe)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates probing and rate governance settings
fn validate_probe_config(config: &ProbeConfig) -> Result<(), ConfigError> {
    // Pacing works in whole requests per second
    if config.requests_per_second() == 0 {
        return Err(ConfigError::Validation(format!(
            "requests_per_minute must be >= 60, got {}",
            config.requests_per_minute
        )));
    }

    if config.burst < 1 {
        return Err(ConfigError::Validation(format!(
            "burst must be >= 1, got {}",
            config.burst
        )));
    }

    if config.max_in_flight < 1 || config.max_in_flight > 10_000 {
        return Err(ConfigError::Validation(format!(
            "max_in_flight must be between 1 and 10000, got {}",
            config.max_in_flight
        )));
    }

    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "channel_capacity must be >= 1, got {}",
            config.channel_capacity
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the input directory setting
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "input directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.failed_log_path.is_empty() {
        return Err(ConfigError::Validation(
            "failed_log_path cannot be empty".to_string(),
        ));
    }

    if config.failed_log_path == config.database_path {
        return Err(ConfigError::Validation(format!(
            "failed_log_path and database_path must differ, both are '{}'",
            config.failed_log_path
        )));
    }

    if config.failed_log_max_size_mb < 1 {
        return Err(ConfigError::Validation(format!(
            "failed_log_max_size_mb must be >= 1, got {}",
            config.failed_log_max_size_mb
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_config(requests_per_minute: u32) -> ProbeConfig {
        ProbeConfig {
            requests_per_minute,
            burst: 1,
            max_in_flight: 100,
            channel_capacity: 100,
            request_timeout_secs: 10,
            http_errors_are_failures: false,
        }
    }

    #[test]
    fn test_validate_requests_per_minute() {
        assert!(validate_probe_config(&probe_config(60)).is_ok());
        assert!(validate_probe_config(&probe_config(2000)).is_ok());

        assert!(validate_probe_config(&probe_config(0)).is_err());
        assert!(validate_probe_config(&probe_config(59)).is_err());
    }

    #[test]
    fn test_validate_in_flight_bounds() {
        let mut config = probe_config(600);
        config.max_in_flight = 0;
        assert!(validate_probe_config(&config).is_err());

        config.max_in_flight = 10_001;
        assert!(validate_probe_config(&config).is_err());

        config.max_in_flight = 1;
        assert!(validate_probe_config(&config).is_ok());
    }

    #[test]
    fn test_validate_output_config() {
        let mut output = OutputConfig {
            database_path: "sweep.db".to_string(),
            failed_log_path: "failed.txt".to_string(),
            failed_log_max_size_mb: 100,
        };
        assert!(validate_output_config(&output).is_ok());

        output.failed_log_max_size_mb = 0;
        assert!(validate_output_config(&output).is_err());

        output.failed_log_max_size_mb = 1;
        output.failed_log_path = "sweep.db".to_string();
        assert!(validate_output_config(&output).is_err());
    }

    #[test]
    fn test_validate_input_config() {
        assert!(validate_input_config(&InputConfig {
            directory: "./input".to_string()
        })
        .is_ok());
        assert!(validate_input_config(&InputConfig {
            directory: "  ".to_string()
        })
        .is_err());
    }
}
