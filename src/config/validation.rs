use crate::config::types::{Config, IndexingConfig, SearchConfig, SiteEntry, StorageConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_indexing_config(&config.indexing)?;
    validate_search_config(&config.search)?;
    validate_storage_config(&config.storage)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler connection settings
fn validate_indexing_config(config: &IndexingConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates search ranking settings
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if !(config.frequency_ceiling > 0.0 && config.frequency_ceiling <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "frequency-ceiling must be in (0, 1], got {}",
            config.frequency_ceiling
        )));
    }

    if config.default_limit < 1 {
        return Err(ConfigError::Validation(
            "default-limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates configured sites: parseable http(s) URLs, unique, named
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for site in sites {
        let url = Url::parse(&site.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid site URL '{}': {}", site.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Site URL '{}' must use http or https",
                site.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Site URL '{}' has no host",
                site.url
            )));
        }

        if site.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Site '{}' must have a name",
                site.url
            )));
        }

        if !seen.insert(site.url.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' is configured more than once",
                site.url
            )));
        }
    }

    Ok(())
}
