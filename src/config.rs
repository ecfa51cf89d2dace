use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::workflow::{roles, UnlistedStatePolicy};

/// Main configuration structure for the grant lifecycle service
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GrantLifecycleConfig {
    /// Logging and metrics settings
    pub observability: ObservabilityConfig,
    /// Transition authorization settings
    pub authorization: AuthorizationConfig,
    /// Domain event delivery settings
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive, overridden by RUST_LOG when set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable output
    pub json_logs: bool,
    /// Enable transition metrics collection
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// How states without registry metadata are gated
    pub unlisted_state_policy: UnlistedStatePolicy,
    /// Role allowed to delete any draft in its tenant
    pub admin_role: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Publish domain events after each committed change
    pub publish_enabled: bool,
    /// Capacity of the in-process event channel
    pub channel_capacity: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
        }
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            unlisted_state_policy: UnlistedStatePolicy::Deny,
            admin_role: roles::ADMIN.to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            publish_enabled: true,
            channel_capacity: 1024,
        }
    }
}

impl GrantLifecycleConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (grant-lifecycle.toml, .grant-lifecycle-rc)
    /// 3. Environment variables (GRANT_LIFECYCLE__SECTION__KEY)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with configuration files looked up in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let toml_file = dir.join("grant-lifecycle.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".grant-lifecycle-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("GRANT_LIFECYCLE")
                .separator("__")
                .try_parsing(true),
        );

        let config: GrantLifecycleConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.channel_capacity == 0 {
            anyhow::bail!("events.channel_capacity must be at least 1");
        }
        if self.authorization.admin_role.trim().is_empty() {
            anyhow::bail!("authorization.admin_role must not be empty");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<GrantLifecycleConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = GrantLifecycleConfig::load_env_file();
        GrantLifecycleConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static GrantLifecycleConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GrantLifecycleConfig::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.authorization.unlisted_state_policy, UnlistedStatePolicy::Deny);
        assert_eq!(config.authorization.admin_role, "ADMIN");
        assert_eq!(config.events.channel_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_and_partial_files() {
        let config = GrantLifecycleConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: GrantLifecycleConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);

        let partial: GrantLifecycleConfig = toml::from_str(
            r#"
            [authorization]
            unlisted_state_policy = "permit"
            "#,
        )
        .unwrap();
        assert_eq!(partial.authorization.unlisted_state_policy, UnlistedStatePolicy::Permit);
        assert_eq!(partial.authorization.admin_role, "ADMIN");
        assert!(partial.events.publish_enabled);
    }

    #[test]
    fn test_load_from_directory_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("grant-lifecycle.toml"),
            "[events]\nchannel_capacity = 16\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".grant-lifecycle-rc"),
            "[observability]\njson_logs = false\n",
        )
        .unwrap();

        let config = GrantLifecycleConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.events.channel_capacity, 16);
        assert!(!config.observability.json_logs);
        assert_eq!(config.authorization.admin_role, "ADMIN");
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = GrantLifecycleConfig::default();
        config.events.channel_capacity = 0;
        assert!(config.validate().is_err());
    }
}
