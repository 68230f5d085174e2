//! Parameterized builder for the credential-rotation stacks.
//!
//! One builder covers every deployment variant; the variants only differ in
//! three options (single vs. dual storage accounts, which credential kind is
//! rotated, and whether an initial secret is seeded). Each stack is staged
//! as: foundation resources, rotation function, event wiring, optional seed
//! secret, and (for the SQL kind) a consumer web app reading the secret.

use chrono::{Duration, Utc};
use rand::Rng;
use tracing::info;

use crate::config::Config;
use crate::deployment::{ClientConfig, Deployment, ResourceOptions};
use crate::naming;
use crate::output::Output;
use crate::resources::{
    role_definition_id, AccessPolicy, AccessPolicyArgs, AccessPolicyEntry, AppServicePlan,
    AppServicePlanArgs, Component, ComponentArgs, FirewallRuleArgs, ResourceGroup,
    ResourceGroupArgs, RoleAssignment, RoleAssignmentArgs, Secret, SecretArgs, SqlFirewallRule,
    SqlServer, SqlServerArgs, StorageAccount, StorageAccountArgs, SystemTopic, SystemTopicArgs,
    SystemTopicEventSubscription, SystemTopicEventSubscriptionArgs, Vault, VaultArgs, WebApp,
    WebAppArgs, WebAppSourceControl, WebAppSourceControlArgs, STORAGE_ACCOUNT_KEY_OPERATOR_ROLE,
};

pub const DEFAULT_LOCATION: &str = "CentralUS";
const CONSUMPTION_PLAN: &str = "Consumption Plan";
const CONSUMPTION_SKU: &str = "Y1";
const PREMIUM_SKU: &str = "P1V2";
const ROTATION_TOPIC_NAME: &str = "SecretExpiry";
const SOURCE_BRANCH: &str = "main";
const DEFAULT_SQL_ADMIN_LOGIN: &str = "sqlAdmin";
const DEFAULT_PASSWORD_LENGTH: usize = 32;

// Placeholder subscription for previews, where no credentials are configured.
const PREVIEW_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

const STORAGE_ROTATION_REPO_URL: &str =
    "https://github.com/Azure-Samples/KeyVault-Rotation-StorageAccountKey-PowerShell.git";
const SQL_ROTATION_REPO_URL: &str =
    "https://github.com/Azure-Samples/KeyVault-Rotation-SQLPassword-Csharp.git";
const SQL_CONSUMER_REPO_URL: &str =
    "https://github.com/Azure-Samples/KeyVault-Rotation-SQLPassword-Csharp-WebApp.git";

/// Which credential the stack rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    StorageKey,
    SqlPassword,
}

impl SecretKind {
    pub fn default_secret_name(&self) -> &'static str {
        match self {
            SecretKind::StorageKey => "storageKey",
            SecretKind::SqlPassword => "sqlPassword",
        }
    }

    pub fn default_repo_url(&self) -> &'static str {
        match self {
            SecretKind::StorageKey => STORAGE_ROTATION_REPO_URL,
            SecretKind::SqlPassword => SQL_ROTATION_REPO_URL,
        }
    }

    pub fn worker_runtime(&self) -> &'static str {
        match self {
            SecretKind::StorageKey => "powershell",
            SecretKind::SqlPassword => "dotnet",
        }
    }

    /// Name of the function endpoint the expiry events are delivered to.
    pub fn rotation_function(&self) -> &'static str {
        match self {
            SecretKind::StorageKey => "AKVStorageRotation",
            SecretKind::SqlPassword => "AKVSQLRotation",
        }
    }
}

impl std::str::FromStr for SecretKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "storage-key" => Ok(SecretKind::StorageKey),
            "sql-password" => Ok(SecretKind::SqlPassword),
            _ => Err(format!(
                "Unknown secret kind: {}. Supported: storage-key, sql-password",
                s
            )),
        }
    }
}

/// The three options the deployment variants differ in.
#[derive(Debug, Clone, Copy)]
pub struct StackOptions {
    pub secret_kind: SecretKind,
    pub dual_storage: bool,
    pub seed_secret: bool,
}

/// Named presets for the shipped deployment variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Dual storage accounts, storage-key rotation, no seed secret.
    TwoSets,
    /// Dual storage accounts, storage-key rotation, seeded secret and
    /// storage role assignment.
    TwoSetsSeeded,
    /// Single storage account, SQL password rotation, seeded secret and a
    /// consumer web app.
    OneSet,
}

impl Variant {
    pub fn options(&self) -> StackOptions {
        match self {
            Variant::TwoSets => StackOptions {
                secret_kind: SecretKind::StorageKey,
                dual_storage: true,
                seed_secret: false,
            },
            Variant::TwoSetsSeeded => StackOptions {
                secret_kind: SecretKind::StorageKey,
                dual_storage: true,
                seed_secret: true,
            },
            Variant::OneSet => StackOptions {
                secret_kind: SecretKind::SqlPassword,
                dual_storage: false,
                seed_secret: true,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Variant::TwoSets => "two-sets",
            Variant::TwoSetsSeeded => "two-sets-seeded",
            Variant::OneSet => "one-set",
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "two-sets" => Ok(Variant::TwoSets),
            "two-sets-seeded" => Ok(Variant::TwoSetsSeeded),
            "one-set" => Ok(Variant::OneSet),
            _ => Err(format!(
                "Unknown variant: {}. Supported: two-sets, two-sets-seeded, one-set",
                s
            )),
        }
    }
}

/// Fully-resolved stack parameters: every configurable value with its
/// default applied.
#[derive(Debug, Clone)]
pub struct StackParams {
    pub resource_group_name: String,
    pub resource_name_prefix: String,
    pub location: String,
    pub function_app_name: String,
    pub app_service_sku: String,
    pub secret_name: String,
    pub repo_url: String,
    pub web_app_repo_url: String,
    pub key_vault_name: String,
    pub storage_account_name: String,
    pub sql_admin_login: String,
    pub subscription_id: String,
}

impl StackParams {
    pub fn resolve(config: &Config, kind: SecretKind) -> Self {
        let resource_group_name = config.resource_group_name.clone();
        let resource_name_prefix = config
            .resource_name_prefix
            .clone()
            .unwrap_or_else(|| resource_group_name.clone());

        let app_service_sku = match config.app_service_plan_type.as_deref() {
            None => CONSUMPTION_SKU,
            Some(CONSUMPTION_PLAN) => CONSUMPTION_SKU,
            Some(_) => PREMIUM_SKU,
        };

        Self {
            location: config
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            function_app_name: config
                .function_app_name
                .clone()
                .unwrap_or_else(|| naming::default_function_app_name(&resource_group_name)),
            app_service_sku: app_service_sku.to_string(),
            secret_name: config
                .secret_name
                .clone()
                .unwrap_or_else(|| kind.default_secret_name().to_string()),
            repo_url: config
                .repo_url
                .clone()
                .unwrap_or_else(|| kind.default_repo_url().to_string()),
            web_app_repo_url: config
                .web_app_repo_url
                .clone()
                .unwrap_or_else(|| SQL_CONSUMER_REPO_URL.to_string()),
            key_vault_name: config
                .key_vault_name
                .clone()
                .unwrap_or_else(|| naming::vault_name(&resource_name_prefix)),
            storage_account_name: config
                .storage_account_name
                .clone()
                .unwrap_or_else(|| naming::primary_storage_name(&resource_name_prefix)),
            sql_admin_login: config
                .sql_admin_login
                .clone()
                .unwrap_or_else(|| DEFAULT_SQL_ADMIN_LOGIN.to_string()),
            subscription_id: config
                .azure
                .as_ref()
                .map(|azure| azure.subscription_id.clone())
                .unwrap_or_else(|| PREVIEW_SUBSCRIPTION_ID.to_string()),
            resource_group_name,
            resource_name_prefix,
        }
    }
}

/// Generate a random credential value for the SQL admin password.
pub fn generate_password(length: usize) -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Outputs of a built stack.
pub struct RotationStack {
    pub vault_name: Output<String>,
    pub function_app_name: String,
    /// Host name of the consumer web app; SQL variant only.
    pub web_app_endpoint: Option<Output<String>>,
}

struct SqlFoundation {
    server: SqlServer,
    admin_password: String,
}

struct Foundation {
    resource_group: ResourceGroup,
    vault: Vault,
    primary_storage: StorageAccount,
    sql: Option<SqlFoundation>,
}

struct RotationFunction {
    function_app: WebApp,
    source_control: WebAppSourceControl,
}

/// Assemble the resource graph for one deployment variant.
pub fn build(deployment: &Deployment, params: &StackParams, options: StackOptions) -> RotationStack {
    info!(
        "Building {} rotation stack for resource group {}",
        params.secret_name, params.resource_group_name
    );

    let client = deployment.client_config();
    let foundation = add_foundation(deployment, params, &options, &client);
    let function = add_rotation_function(deployment, params, options.secret_kind, &foundation);
    let event_subscription =
        wire_secret_expiry_events(deployment, params, options.secret_kind, &foundation, &function);

    if options.seed_secret {
        seed_secret(deployment, params, &foundation, &function, &event_subscription);
    }

    let web_app_endpoint = foundation
        .sql
        .as_ref()
        .map(|sql| add_consumer_web_app(deployment, params, &foundation, sql, &client));

    RotationStack {
        vault_name: foundation.vault.vault_name(),
        function_app_name: params.function_app_name.clone(),
        web_app_endpoint,
    }
}

fn add_foundation(
    deployment: &Deployment,
    params: &StackParams,
    options: &StackOptions,
    client: &ClientConfig,
) -> Foundation {
    let resource_group = ResourceGroup::new(
        deployment,
        "resourceGroup",
        ResourceGroupArgs {
            name: params.resource_group_name.clone(),
            location: params.location.clone(),
        },
    );

    let primary_storage = StorageAccount::new(
        deployment,
        "appStorageAccount",
        StorageAccountArgs {
            account_name: params.storage_account_name.as_str().into(),
            resource_group_name: params.resource_group_name.clone(),
            location: resource_group.location(),
            sku: None,
        },
    );

    if options.dual_storage {
        StorageAccount::new(
            deployment,
            "appStorageAccount2",
            StorageAccountArgs {
                account_name: naming::secondary_storage_name(&params.resource_name_prefix).into(),
                resource_group_name: params.resource_group_name.clone(),
                location: resource_group.location(),
                sku: None,
            },
        );
    }

    // The deployer keeps delete rights so seeded secrets can be cleaned up;
    // the function identity is granted its policy during event wiring.
    let vault = Vault::new(
        deployment,
        "vault",
        VaultArgs {
            vault_name: params.key_vault_name.as_str().into(),
            resource_group_name: params.resource_group_name.clone(),
            location: resource_group.location(),
            tenant_id: client.tenant_id.clone(),
            access_policies: vec![AccessPolicyEntry {
                tenant_id: client.tenant_id.clone(),
                object_id: client.object_id.clone(),
                secret_permissions: vec!["delete".to_string()],
            }],
        },
    );

    let sql = if options.secret_kind == SecretKind::SqlPassword {
        let admin_password = generate_password(DEFAULT_PASSWORD_LENGTH);
        let server = SqlServer::new(
            deployment,
            "sqlServer",
            SqlServerArgs {
                server_name: naming::sql_server_name(&params.resource_name_prefix).into(),
                resource_group_name: params.resource_group_name.clone(),
                location: resource_group.location(),
                administrator_login: params.sql_admin_login.clone(),
                administrator_password: admin_password.clone(),
            },
        );
        SqlFirewallRule::new(
            deployment,
            "firewallRule",
            FirewallRuleArgs {
                rule_name: "AllowAllWindowsAzureIps".to_string(),
                server_name: server.server_name(),
                resource_group_name: params.resource_group_name.clone(),
                start_ip_address: "0.0.0.0".to_string(),
                end_ip_address: "0.0.0.0".to_string(),
            },
        );
        Some(SqlFoundation {
            server,
            admin_password,
        })
    } else {
        None
    };

    Foundation {
        resource_group,
        vault,
        primary_storage,
        sql,
    }
}

fn add_rotation_function(
    deployment: &Deployment,
    params: &StackParams,
    kind: SecretKind,
    foundation: &Foundation,
) -> RotationFunction {
    let location = foundation.resource_group.location();

    let app_insights = Component::new(
        deployment,
        "appInsights",
        ComponentArgs {
            resource_name: params.function_app_name.clone(),
            resource_group_name: params.resource_group_name.clone(),
            location: location.clone(),
        },
    );

    let plan = AppServicePlan::new(
        deployment,
        "appServicePlan",
        AppServicePlanArgs {
            plan_name: naming::rotation_plan_name(&params.resource_group_name),
            resource_group_name: params.resource_group_name.clone(),
            location: location.clone(),
            sku_name: params.app_service_sku.clone(),
        },
    );

    let function_storage = StorageAccount::new(
        deployment,
        "functionAppStorage",
        StorageAccountArgs {
            account_name: naming::function_storage_account_name().into(),
            resource_group_name: params.resource_group_name.clone(),
            location: location.clone(),
            sku: None,
        },
    );
    let storage_key = function_storage.primary_key(deployment);
    let jobs_storage = function_storage.account_name().zip(&storage_key).map(|(name, key)| {
        format!("DefaultEndpointsProtocol=https;AccountName={name};AccountKey={key}")
    });
    let content_storage = function_storage.account_name().zip(&storage_key).map(|(name, key)| {
        format!(
            "DefaultEndpointsProtocol=https;AccountName={name};EndpointSuffix=core.windows.net;AccountKey={key}"
        )
    });

    let app_settings = vec![
        ("AzureWebJobsStorage".to_string(), jobs_storage),
        ("FUNCTIONS_EXTENSION_VERSION".to_string(), "~3".into()),
        (
            "FUNCTIONS_WORKER_RUNTIME".to_string(),
            kind.worker_runtime().into(),
        ),
        (
            "WEBSITE_CONTENTAZUREFILECONNECTIONSTRING".to_string(),
            content_storage,
        ),
        (
            "WEBSITE_CONTENTSHARE".to_string(),
            params.function_app_name.to_lowercase().into(),
        ),
        ("WEBSITE_NODE_DEFAULT_VERSION".to_string(), "~10".into()),
        (
            "APPINSIGHTS_INSTRUMENTATIONKEY".to_string(),
            app_insights.instrumentation_key(),
        ),
    ];

    let function_app = WebApp::new(
        deployment,
        "functionApp",
        WebAppArgs {
            site_name: params.function_app_name.clone(),
            resource_group_name: params.resource_group_name.clone(),
            location,
            server_farm_id: plan.id(),
            site_kind: "functionapp".to_string(),
            app_settings,
        },
    );

    let source_control = WebAppSourceControl::new(
        deployment,
        "functionAppSourceControl",
        WebAppSourceControlArgs {
            site_name: function_app.site_name(),
            resource_group_name: params.resource_group_name.clone(),
            repo_url: params.repo_url.clone(),
            branch: SOURCE_BRANCH.to_string(),
        },
    );

    RotationFunction {
        function_app,
        source_control,
    }
}

fn wire_secret_expiry_events(
    deployment: &Deployment,
    params: &StackParams,
    kind: SecretKind,
    foundation: &Foundation,
    function: &RotationFunction,
) -> SystemTopicEventSubscription {
    AccessPolicy::new(
        deployment,
        "accessPolicy",
        AccessPolicyArgs {
            vault_name: foundation.vault.vault_name(),
            resource_group_name: params.resource_group_name.clone(),
            tenant_id: function.function_app.identity_tenant_id(),
            object_id: function.function_app.principal_id(),
            secret_permissions: vec!["get".to_string(), "set".to_string(), "list".to_string()],
        },
    );

    let topic = SystemTopic::new(
        deployment,
        "eventGridTopic",
        SystemTopicArgs {
            topic_name: ROTATION_TOPIC_NAME.to_string(),
            resource_group_name: params.resource_group_name.clone(),
            location: foundation.resource_group.location(),
            source: foundation.vault.id(),
        },
    );

    let secret_name = params.secret_name.clone();
    let subscription_name = foundation
        .vault
        .vault_name()
        .zip(&function.function_app.site_name())
        .map(move |(vault, site)| format!("{vault}-{secret_name}-{site}"));
    let rotation_function = kind.rotation_function();
    let destination = function
        .function_app
        .id()
        .map(move |id| format!("{id}/functions/{rotation_function}"));

    // The function endpoint only exists once the source deployment finishes,
    // and there is no data dependency to order on.
    SystemTopicEventSubscription::new(
        deployment,
        "secretExpiryEvent",
        SystemTopicEventSubscriptionArgs {
            subscription_name,
            system_topic_name: topic.topic_name(),
            resource_group_name: params.resource_group_name.clone(),
            secret_name: params.secret_name.clone(),
            destination_function_id: destination,
        },
        ResourceOptions::new().depends_on(function.source_control.handle()),
    )
}

fn seed_secret(
    deployment: &Deployment,
    params: &StackParams,
    foundation: &Foundation,
    function: &RotationFunction,
    event_subscription: &SystemTopicEventSubscription,
) {
    let value: Output<String>;
    let credential_id: String;
    let provider_address: Output<String>;
    let validity_period_days: &str;
    let expires_at: i64;

    match &foundation.sql {
        Some(sql) => {
            value = Output::literal(sql.admin_password.clone());
            credential_id = params.sql_admin_login.clone();
            provider_address = sql.server.id();
            validity_period_days = "1";
            // Near-immediate expiry so the first rotation fires right after
            // the deployment completes.
            expires_at = (Utc::now() + Duration::minutes(1)).timestamp();
        }
        None => {
            value = foundation.primary_storage.primary_key(deployment);
            credential_id = "key1".to_string();
            provider_address = foundation.primary_storage.id();
            validity_period_days = "60";
            expires_at = (Utc::now() + Duration::days(1)).timestamp();
        }
    }

    Secret::new(
        deployment,
        "secret",
        SecretArgs {
            secret_name: params.secret_name.clone(),
            vault_name: foundation.vault.vault_name(),
            resource_group_name: params.resource_group_name.clone(),
            value,
            expires_at,
            tags: vec![
                ("CredentialId".to_string(), credential_id.into()),
                ("ProviderAddress".to_string(), provider_address),
                ("ValidityPeriodDays".to_string(), validity_period_days.into()),
            ],
        },
        ResourceOptions::new().depends_on(event_subscription.handle()),
    );

    if foundation.sql.is_none() {
        // Key regeneration rights on the rotated account.
        RoleAssignment::new(
            deployment,
            "functionAppAccessToStorage",
            RoleAssignmentArgs {
                assignment_name: naming::random_uuid(),
                scope: foundation.primary_storage.id(),
                principal_id: function.function_app.principal_id(),
                role_definition_id: role_definition_id(
                    &params.subscription_id,
                    STORAGE_ACCOUNT_KEY_OPERATOR_ROLE,
                ),
            },
        );
    }
}

fn add_consumer_web_app(
    deployment: &Deployment,
    params: &StackParams,
    foundation: &Foundation,
    sql: &SqlFoundation,
    client: &ClientConfig,
) -> Output<String> {
    let app_name = naming::consumer_app_name(&params.resource_name_prefix);

    let plan = AppServicePlan::new(
        deployment,
        "webAppServicePlan",
        AppServicePlanArgs {
            plan_name: app_name.clone(),
            resource_group_name: params.resource_group_name.clone(),
            location: foundation.resource_group.location(),
            sku_name: "F1".to_string(),
        },
    );

    let data_source = sql
        .server
        .server_name()
        .map(|server| format!("{server}.database.windows.net"));

    let web_app = WebApp::new(
        deployment,
        "webApp",
        WebAppArgs {
            site_name: app_name,
            resource_group_name: params.resource_group_name.clone(),
            location: foundation.resource_group.location(),
            server_farm_id: plan.id(),
            site_kind: "app".to_string(),
            app_settings: vec![
                ("DataSource".to_string(), data_source),
                ("KeyVaultName".to_string(), foundation.vault.vault_name()),
                ("SecretName".to_string(), params.secret_name.as_str().into()),
            ],
        },
    );

    WebAppSourceControl::new(
        deployment,
        "webAppSourceControl",
        WebAppSourceControlArgs {
            site_name: web_app.site_name(),
            resource_group_name: params.resource_group_name.clone(),
            repo_url: params.web_app_repo_url.clone(),
            branch: SOURCE_BRANCH.to_string(),
        },
    );

    AccessPolicy::new(
        deployment,
        "webAppPolicy",
        AccessPolicyArgs {
            vault_name: foundation.vault.vault_name(),
            resource_group_name: params.resource_group_name.clone(),
            tenant_id: client.tenant_id.clone(),
            object_id: web_app.principal_id(),
            secret_permissions: vec!["get".to_string(), "list".to_string(), "set".to_string()],
        },
    );

    web_app.default_host_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CreateRequest, DryRunProvider, Provider, ResourceKind};
    use serde_json::Value;
    use std::sync::Arc;

    fn demo_config() -> Config {
        Config {
            resource_group_name: "demo".to_string(),
            resource_name_prefix: None,
            location: None,
            function_app_name: None,
            app_service_plan_type: None,
            secret_name: None,
            repo_url: None,
            web_app_repo_url: None,
            key_vault_name: None,
            storage_account_name: None,
            sql_admin_login: None,
            azure: None,
        }
    }

    async fn built(
        variant: Variant,
    ) -> (Arc<DryRunProvider>, Deployment, RotationStack, StackParams) {
        let provider = Arc::new(DryRunProvider::new());
        let deployment = Deployment::new(Arc::clone(&provider) as Arc<dyn Provider>);
        let params = StackParams::resolve(&demo_config(), variant.options().secret_kind);
        let stack = build(&deployment, &params, variant.options());
        let report = deployment.run().await;
        assert!(report.is_success(), "{variant:?}: {report:?}");
        (provider, deployment, stack, params)
    }

    fn request_named<'a>(
        created: &'a [CreateRequest],
        kind: ResourceKind,
        name: &str,
    ) -> &'a CreateRequest {
        created
            .iter()
            .find(|r| r.kind == kind && r.name == name)
            .unwrap_or_else(|| panic!("no {kind:?} request named {name}"))
    }

    fn position(created: &[CreateRequest], name: &str) -> usize {
        created
            .iter()
            .position(|r| r.name == name)
            .unwrap_or_else(|| panic!("no request named {name}"))
    }

    fn app_setting<'a>(body: &'a Value, name: &str) -> &'a str {
        body.pointer("/properties/siteConfig/appSettings")
            .and_then(Value::as_array)
            .and_then(|settings| settings.iter().find(|s| s["name"] == name))
            .and_then(|s| s["value"].as_str())
            .unwrap_or_else(|| panic!("no app setting {name}"))
    }

    #[test]
    fn plan_type_selects_the_sku() {
        let mut config = demo_config();
        let params = StackParams::resolve(&config, SecretKind::StorageKey);
        assert_eq!(params.app_service_sku, "Y1");

        config.app_service_plan_type = Some("Consumption Plan".to_string());
        let params = StackParams::resolve(&config, SecretKind::StorageKey);
        assert_eq!(params.app_service_sku, "Y1");

        config.app_service_plan_type = Some("Premium".to_string());
        let params = StackParams::resolve(&config, SecretKind::StorageKey);
        assert_eq!(params.app_service_sku, "P1V2");
    }

    #[test]
    fn default_names_derive_from_the_resource_group() {
        let params = StackParams::resolve(&demo_config(), SecretKind::StorageKey);
        assert_eq!(params.key_vault_name, "demo-kv");
        assert_eq!(params.storage_account_name, "demostorage");
        assert_eq!(params.function_app_name, "demo-storagekey-rotation-fnapp");
        assert_eq!(params.secret_name, "storageKey");
        assert_eq!(params.location, DEFAULT_LOCATION);
        assert_eq!(params.sql_admin_login, "sqlAdmin");
        assert_eq!(params.subscription_id, PREVIEW_SUBSCRIPTION_ID);

        let params = StackParams::resolve(&demo_config(), SecretKind::SqlPassword);
        assert_eq!(params.secret_name, "sqlPassword");
        assert!(params.repo_url.contains("SQLPassword"));
    }

    #[test]
    fn variant_names_round_trip() {
        for variant in [Variant::TwoSets, Variant::TwoSetsSeeded, Variant::OneSet] {
            assert_eq!(variant.name().parse::<Variant>().unwrap(), variant);
        }
        assert!("three-sets".parse::<Variant>().is_err());
    }

    #[tokio::test]
    async fn event_subscription_waits_for_the_source_control_deployment() {
        for variant in [Variant::TwoSets, Variant::TwoSetsSeeded, Variant::OneSet] {
            let (provider, deployment, _, params) = built(variant).await;

            let node = deployment.node("secretExpiryEvent").unwrap();
            assert!(
                node.depends_on.contains("functionAppSourceControl"),
                "{variant:?}"
            );

            let created = provider.created();
            let source_control = format!("{}/web", params.function_app_name);
            let subscription = format!(
                "SecretExpiry/{}-{}-{}",
                params.key_vault_name, params.secret_name, params.function_app_name
            );
            assert!(
                position(&created, &source_control) < position(&created, &subscription),
                "{variant:?}"
            );
        }
    }

    #[tokio::test]
    async fn seeded_secret_is_created_after_the_event_subscription() {
        for variant in [Variant::TwoSetsSeeded, Variant::OneSet] {
            let (provider, deployment, _, params) = built(variant).await;

            let node = deployment.node("secret").unwrap();
            assert!(node.depends_on.contains("secretExpiryEvent"), "{variant:?}");

            let created = provider.created();
            let subscription = format!(
                "SecretExpiry/{}-{}-{}",
                params.key_vault_name, params.secret_name, params.function_app_name
            );
            let secret = format!("{}/{}", params.key_vault_name, params.secret_name);
            assert!(
                position(&created, &subscription) < position(&created, &secret),
                "{variant:?}"
            );
        }
    }

    #[tokio::test]
    async fn unseeded_variant_creates_no_secret() {
        let (provider, deployment, _, _) = built(Variant::TwoSets).await;
        assert!(deployment.node("secret").is_none());
        assert!(provider.creation_index(ResourceKind::Secret).is_none());
        assert!(provider.creation_index(ResourceKind::RoleAssignment).is_none());
    }

    #[tokio::test]
    async fn function_identity_flows_into_policy_and_role_assignment() {
        let (provider, _, _, params) = built(Variant::TwoSetsSeeded).await;
        let created = provider.created();
        let principal = DryRunProvider::principal_id_for(&params.function_app_name);

        let policy = created
            .iter()
            .find(|r| r.kind == ResourceKind::AccessPolicy)
            .unwrap();
        assert_eq!(
            policy.body.pointer("/properties/accessPolicies/0/objectId").unwrap(),
            &Value::String(principal.clone())
        );
        assert_eq!(
            policy.body.pointer("/properties/accessPolicies/0/tenantId").unwrap(),
            DryRunProvider::tenant_id()
        );

        let assignment = created
            .iter()
            .find(|r| r.kind == ResourceKind::RoleAssignment)
            .unwrap();
        assert_eq!(
            assignment.body.pointer("/properties/principalId").unwrap(),
            &Value::String(principal)
        );
        let role = assignment
            .body
            .pointer("/properties/roleDefinitionId")
            .and_then(Value::as_str)
            .unwrap();
        assert!(role.ends_with(STORAGE_ACCOUNT_KEY_OPERATOR_ROLE));
        assert!(assignment
            .scope
            .as_deref()
            .unwrap()
            .ends_with("/demostorage"));
    }

    #[tokio::test]
    async fn event_filter_targets_exactly_the_rotated_secret() {
        let cases = [
            (Variant::TwoSets, "storageKey", "AKVStorageRotation"),
            (Variant::OneSet, "sqlPassword", "AKVSQLRotation"),
        ];
        for (variant, secret_name, function) in cases {
            let (provider, _, _, _) = built(variant).await;
            let created = provider.created();
            let subscription = created
                .iter()
                .find(|r| r.kind == ResourceKind::SystemTopicEventSubscription)
                .unwrap();

            let filter = subscription.body.pointer("/properties/filter").unwrap();
            assert_eq!(filter["subjectBeginsWith"], secret_name);
            assert_eq!(filter["subjectEndsWith"], secret_name);
            assert_eq!(
                filter["includedEventTypes"][0],
                crate::resources::SECRET_NEAR_EXPIRY_EVENT
            );

            let destination = subscription
                .body
                .pointer("/properties/destination/properties")
                .unwrap();
            assert_eq!(destination["maxEventsPerBatch"], 1);
            let resource_id = destination["resourceId"].as_str().unwrap();
            assert!(
                resource_id.ends_with(&format!("/functions/{function}")),
                "{resource_id}"
            );
        }
    }

    #[tokio::test]
    async fn every_storage_account_is_locally_redundant() {
        let cases = [
            (Variant::TwoSets, 3),
            (Variant::TwoSetsSeeded, 3),
            (Variant::OneSet, 2),
        ];
        for (variant, expected) in cases {
            let (provider, _, _, _) = built(variant).await;
            let accounts: Vec<_> = provider
                .created()
                .into_iter()
                .filter(|r| r.kind == ResourceKind::StorageAccount)
                .collect();
            assert_eq!(accounts.len(), expected, "{variant:?}");
            for account in accounts {
                assert_eq!(account.body.pointer("/sku/name").unwrap(), "Standard_LRS");
            }
        }
    }

    #[tokio::test]
    async fn function_app_settings_carry_runtime_and_storage_connection() {
        let (provider, _, _, params) = built(Variant::TwoSets).await;
        let created = provider.created();
        let function_app =
            request_named(&created, ResourceKind::WebApp, &params.function_app_name);

        assert_eq!(
            app_setting(&function_app.body, "FUNCTIONS_WORKER_RUNTIME"),
            "powershell"
        );
        assert_eq!(
            app_setting(&function_app.body, "WEBSITE_CONTENTSHARE"),
            params.function_app_name.to_lowercase()
        );

        let jobs_storage = app_setting(&function_app.body, "AzureWebJobsStorage");
        assert!(jobs_storage.starts_with("DefaultEndpointsProtocol=https;AccountName="));
        assert!(jobs_storage.contains("fnappstrg"));
        assert!(jobs_storage.contains("AccountKey="));

        let instrumentation = app_setting(&function_app.body, "APPINSIGHTS_INSTRUMENTATIONKEY");
        assert_eq!(instrumentation, format!("{}-ikey", params.function_app_name));
    }

    #[tokio::test]
    async fn storage_variant_seeds_the_primary_key_with_provenance_tags() {
        let (provider, _, _, params) = built(Variant::TwoSetsSeeded).await;
        let created = provider.created();
        let secret = request_named(
            &created,
            ResourceKind::Secret,
            &format!("{}/storageKey", params.key_vault_name),
        );

        assert_eq!(
            secret.body.pointer("/properties/value").unwrap(),
            &Value::String(DryRunProvider::storage_key_for("demostorage"))
        );
        assert_eq!(secret.body.pointer("/tags/CredentialId").unwrap(), "key1");
        assert_eq!(secret.body.pointer("/tags/ValidityPeriodDays").unwrap(), "60");
        let provider_address = secret
            .body
            .pointer("/tags/ProviderAddress")
            .and_then(Value::as_str)
            .unwrap();
        assert!(provider_address.ends_with("/demostorage"));
        assert!(secret.body.pointer("/properties/attributes/exp").unwrap().is_i64());
    }

    #[tokio::test]
    async fn sql_variant_provisions_server_and_consumer_endpoint() {
        let (provider, deployment, stack, params) = built(Variant::OneSet).await;
        let created = provider.created();

        let server = request_named(&created, ResourceKind::SqlServer, "demo-sql");
        assert_eq!(
            server.body.pointer("/properties/administratorLogin").unwrap(),
            "sqlAdmin"
        );
        assert_eq!(server.body.pointer("/properties/version").unwrap(), "12.0");
        request_named(
            &created,
            ResourceKind::SqlFirewallRule,
            "demo-sql/AllowAllWindowsAzureIps",
        );

        let web_app = request_named(&created, ResourceKind::WebApp, "demo-app");
        assert_eq!(
            app_setting(&web_app.body, "DataSource"),
            "demo-sql.database.windows.net"
        );
        assert_eq!(app_setting(&web_app.body, "KeyVaultName"), params.key_vault_name);
        assert_eq!(app_setting(&web_app.body, "SecretName"), "sqlPassword");

        let secret = request_named(&created, ResourceKind::Secret, "demo-kv/sqlPassword");
        let password = secret
            .body
            .pointer("/properties/value")
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(password.len(), 32);
        assert_eq!(secret.body.pointer("/tags/CredentialId").unwrap(), "sqlAdmin");
        assert_eq!(secret.body.pointer("/tags/ValidityPeriodDays").unwrap(), "1");

        assert!(deployment.node("functionAppAccessToStorage").is_none());

        let endpoint = stack.web_app_endpoint.unwrap();
        assert_eq!(endpoint.resolve().await.unwrap(), "demo-app.azurewebsites.net");
    }

    #[tokio::test]
    async fn storage_variant_exposes_no_consumer_endpoint() {
        let (_, _, stack, params) = built(Variant::TwoSets).await;
        assert!(stack.web_app_endpoint.is_none());
        assert_eq!(
            stack.vault_name.resolve().await.unwrap(),
            params.key_vault_name
        );
    }

    #[tokio::test]
    async fn vault_grants_the_deployer_delete_permission() {
        let (provider, _, _, params) = built(Variant::TwoSets).await;
        let created = provider.created();
        let vault = request_named(&created, ResourceKind::Vault, &params.key_vault_name);

        let entry = vault.body.pointer("/properties/accessPolicies/0").unwrap();
        assert_eq!(entry["objectId"], DryRunProvider::object_id());
        assert_eq!(entry["permissions"]["secrets"][0], "delete");
    }

    #[test]
    fn generated_passwords_have_the_requested_length() {
        let first = generate_password(32);
        let second = generate_password(32);
        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
    }
}
