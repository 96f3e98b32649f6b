use crate::config::types::{Config, OutputConfig, ScraperConfig, SourceConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_source_config(&config.source)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_categories(&config.categories, config.scraper.categories_to_scrape.as_deref())?;
    Ok(())
}

/// Validates scrape session settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 32, got {}",
            config.concurrency
        )));
    }

    if config.delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "delay_ms must be <= 60000ms, got {}ms",
            config.delay_ms
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates the marketplace source
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the category dictionary and the optional scrape subset
fn validate_categories(
    categories: &BTreeMap<String, i64>,
    subset: Option<&[i64]>,
) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one category must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (name, num) in categories {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category names cannot be empty".to_string(),
            ));
        }
        if *num < 0 {
            return Err(ConfigError::Validation(format!(
                "category '{}' has negative number {}",
                name, num
            )));
        }
        if !seen.insert(*num) {
            return Err(ConfigError::Validation(format!(
                "category number {} is assigned twice",
                num
            )));
        }
    }

    if let Some(subset) = subset {
        if let Some(bad) = subset.iter().find(|n| **n < 0) {
            return Err(ConfigError::Validation(format!(
                "categories_to_scrape contains negative number {}",
                bad
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
