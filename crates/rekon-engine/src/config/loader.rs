use super::schema::ResolverConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./rekon.yaml
    /// 2. ~/.rekon/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<ResolverConfig, ConfigError> {
        let local_config = PathBuf::from("./rekon.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".rekon").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(ResolverConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<ResolverConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: ResolverConfig = serde_yaml::from_str(&content)?;
        validate(&config)?;
        Ok(config)
    }
}

pub fn validate(config: &ResolverConfig) -> Result<(), ConfigError> {
    if config.enabled_domains.is_empty() {
        return Err(ConfigError::Invalid("enabled_domains is empty".into()));
    }
    if config.wait.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("wait.poll_interval_ms must be > 0".into()));
    }
    if config.existence_probe.interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "existence_probe.interval_ms must be > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekon_common::DomainName;
    use std::io::Write;

    #[tokio::test]
    async fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "enabled_domains: [NET, WIN]\nwait:\n  poll_interval_ms: 50\n"
        )
        .unwrap();
        let config = ConfigLoader::load_from(file.path()).await.unwrap();
        assert_eq!(config.enabled_domains, vec![DomainName::Net, DomainName::Win]);
        assert_eq!(config.wait.poll_interval_ms, 50);
        assert_eq!(config.wait.ignore_cache_every, 1);
        assert_eq!(config.existence_probe.timeout_ms, 2000);
        assert_eq!(config.search.max_depth, 64);
    }

    #[tokio::test]
    async fn domain_names_are_upper_case() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "enabled_domains: [net]\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from(file.path()).await,
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn rejects_zero_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "wait:\n  poll_interval_ms: 0\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from(file.path()).await,
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&ResolverConfig::default()).is_ok());
    }
}
