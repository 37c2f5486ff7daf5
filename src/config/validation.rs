use crate::config::types::{Config, DownloadConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_download_config(&config.download)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the feed source
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.service_index_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid service_index_url '{}': {}",
            config.service_index_url, e
        ))
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "service_index_url '{}' must use http or https",
            config.service_index_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "service_index_url '{}' has no host",
            config.service_index_url
        )));
    }

    if let Some(user_agent) = &config.user_agent {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates download limits
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.parallel_downloads < 1 {
        return Err(ConfigError::Validation(format!(
            "parallel_downloads must be >= 1, got {}",
            config.parallel_downloads
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_commits == Some(0) {
        return Err(ConfigError::Validation(
            "max_commits must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    // The suffix becomes part of a file name.
    if config.cursor_suffix.is_empty()
        || !config
            .cursor_suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "cursor_suffix must be non-empty and contain only alphanumerics, '-', '_' or '.', got '{}'",
            config.cursor_suffix
        )));
    }

    Ok(())
}
