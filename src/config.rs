use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Stack configuration. Only the resource-group name is required; every other
/// value falls back to a deterministic default derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub resource_group_name: String,
    #[serde(default)]
    pub resource_name_prefix: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub function_app_name: Option<String>,
    /// `"Consumption Plan"` (or unset) selects the `Y1` SKU; any other value
    /// selects `P1V2`.
    #[serde(default)]
    pub app_service_plan_type: Option<String>,
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub web_app_repo_url: Option<String>,
    #[serde(default)]
    pub key_vault_name: Option<String>,
    #[serde(default)]
    pub storage_account_name: Option<String>,
    #[serde(default)]
    pub sql_admin_login: Option<String>,
    /// Credentials for live deployment; not needed for previews.
    #[serde(default)]
    pub azure: Option<AzureConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub subscription_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let azure = match std::env::var("AZURE_SUBSCRIPTION_ID") {
            Ok(subscription_id) => Some(AzureConfig {
                subscription_id,
                tenant_id: std::env::var("AZURE_TENANT_ID")
                    .context("AZURE_TENANT_ID environment variable not set")?,
                object_id: std::env::var("AZURE_OBJECT_ID").ok(),
                access_token: std::env::var("AZURE_ACCESS_TOKEN").ok(),
            }),
            Err(_) => None,
        };

        Ok(Self {
            resource_group_name: std::env::var("RESOURCE_GROUP_NAME")
                .context("RESOURCE_GROUP_NAME environment variable not set")?,
            resource_name_prefix: std::env::var("RESOURCE_NAME_PREFIX").ok(),
            location: std::env::var("LOCATION").ok(),
            function_app_name: std::env::var("FUNCTION_APP_NAME").ok(),
            app_service_plan_type: std::env::var("APP_SERVICE_PLAN_TYPE").ok(),
            secret_name: std::env::var("SECRET_NAME").ok(),
            repo_url: std::env::var("REPO_URL").ok(),
            web_app_repo_url: std::env::var("WEB_APP_REPO_URL").ok(),
            key_vault_name: std::env::var("KEY_VAULT_NAME").ok(),
            storage_account_name: std::env::var("STORAGE_ACCOUNT_NAME").ok(),
            sql_admin_login: std::env::var("SQL_ADMIN_LOGIN").ok(),
            azure,
        })
    }

    /// Create a sample configuration file
    pub fn create_sample<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample = Self {
            resource_group_name: "credrotate".to_string(),
            resource_name_prefix: None,
            location: Some("CentralUS".to_string()),
            function_app_name: None,
            app_service_plan_type: Some("Consumption Plan".to_string()),
            secret_name: None,
            repo_url: None,
            web_app_repo_url: None,
            key_vault_name: None,
            storage_account_name: None,
            sql_admin_login: None,
            azure: Some(AzureConfig {
                subscription_id: "your-subscription-id".to_string(),
                tenant_id: "your-tenant-id".to_string(),
                object_id: None,
                access_token: None,
            }),
        };

        let toml_string =
            toml::to_string_pretty(&sample).context("Failed to serialize sample config")?;
        fs::write(path.as_ref(), toml_string)
            .with_context(|| format!("Failed to write sample config to {:?}", path.as_ref()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_resource_group_name_is_a_parse_error() {
        let parsed: Result<Config, _> = toml::from_str("location = \"CentralUS\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn minimal_config_parses_with_defaults_unset() {
        let config: Config = toml::from_str("resource_group_name = \"demo\"").unwrap();
        assert_eq!(config.resource_group_name, "demo");
        assert!(config.resource_name_prefix.is_none());
        assert!(config.azure.is_none());
    }

    #[test]
    fn round_trips_through_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "resource_group_name = \"demo\"\napp_service_plan_type = \"Premium\"\n\n[azure]\nsubscription_id = \"sub\"\ntenant_id = \"tenant\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.app_service_plan_type.as_deref(), Some("Premium"));
        assert_eq!(config.azure.unwrap().subscription_id, "sub");
    }

    #[test]
    fn sample_config_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.toml");
        Config::create_sample(&path).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.resource_group_name, "credrotate");
    }
}
