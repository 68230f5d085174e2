//! Provisioning providers
//!
//! A provider executes the actual control-plane calls for the resource graph:
//! creating resources and performing read-only invokes (client configuration,
//! storage key listing). The deployment engine only ever talks to this trait,
//! so the same stack builds against the live ARM endpoint or the in-memory
//! dry-run recorder.

mod arm;
mod dry_run;

pub use arm::ArmProvider;
pub use dry_run::DryRunProvider;

use serde_json::Value;
use thiserror::Error;

/// Azure resource types recognized by the deployment graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ResourceGroup,
    StorageAccount,
    Vault,
    Secret,
    AccessPolicy,
    AppServicePlan,
    Component,
    WebApp,
    WebAppSourceControl,
    SystemTopic,
    SystemTopicEventSubscription,
    RoleAssignment,
    SqlServer,
    SqlFirewallRule,
}

impl ResourceKind {
    /// Fully-qualified ARM resource type. Child resources carry every path
    /// segment; their request names use `parent/child` form to match.
    pub fn arm_type(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "Microsoft.Resources/resourceGroups",
            ResourceKind::StorageAccount => "Microsoft.Storage/storageAccounts",
            ResourceKind::Vault => "Microsoft.KeyVault/vaults",
            ResourceKind::Secret => "Microsoft.KeyVault/vaults/secrets",
            ResourceKind::AccessPolicy => "Microsoft.KeyVault/vaults/accessPolicies",
            ResourceKind::AppServicePlan => "Microsoft.Web/serverfarms",
            ResourceKind::Component => "Microsoft.Insights/components",
            ResourceKind::WebApp => "Microsoft.Web/sites",
            ResourceKind::WebAppSourceControl => "Microsoft.Web/sites/sourcecontrols",
            ResourceKind::SystemTopic => "Microsoft.EventGrid/systemTopics",
            ResourceKind::SystemTopicEventSubscription => {
                "Microsoft.EventGrid/systemTopics/eventSubscriptions"
            }
            ResourceKind::RoleAssignment => "Microsoft.Authorization/roleAssignments",
            ResourceKind::SqlServer => "Microsoft.Sql/servers",
            ResourceKind::SqlFirewallRule => "Microsoft.Sql/servers/firewallRules",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "2020-06-01",
            ResourceKind::StorageAccount => "2019-06-01",
            ResourceKind::Vault | ResourceKind::Secret | ResourceKind::AccessPolicy => {
                "2019-09-01"
            }
            ResourceKind::AppServicePlan => "2018-02-01",
            ResourceKind::Component => "2018-05-01-preview",
            ResourceKind::WebApp | ResourceKind::WebAppSourceControl => "2018-11-01",
            ResourceKind::SystemTopic | ResourceKind::SystemTopicEventSubscription => {
                "2020-04-01-preview"
            }
            ResourceKind::RoleAssignment => "2018-09-01-preview",
            ResourceKind::SqlServer | ResourceKind::SqlFirewallRule => "2019-06-01-preview",
        }
    }
}

/// A fully-resolved resource creation request.
///
/// `name` is the Azure resource name (child resources use `parent/child`
/// form). `scope` replaces the resource-group path for scope-attached
/// resources such as role assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub kind: ResourceKind,
    pub name: String,
    pub resource_group: Option<String>,
    pub scope: Option<String>,
    pub body: Value,
}

/// Result of a successful creation: the resource id plus whatever outputs the
/// control plane reported (identity principal ids, instrumentation keys, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedResource {
    pub id: String,
    pub outputs: Value,
}

/// Read-only control-plane calls used while assembling resource inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeRequest {
    /// Tenant and object id of the deploying principal.
    ClientConfig,
    /// Access keys of a storage account; consumers take `keys[0].value`.
    ListStorageAccountKeys {
        account_name: String,
        resource_group: String,
    },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("control plane returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    Invalid(String),
}

/// Trait for provisioning backends (live ARM, in-memory dry run).
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Create a resource. Called at most once per registered resource.
    async fn create(&self, request: CreateRequest) -> Result<CreatedResource, ProviderError>;

    /// Perform a read-only invoke.
    async fn invoke(&self, request: InvokeRequest) -> Result<Value, ProviderError>;

    /// Provider name for display purposes.
    fn provider_type(&self) -> &'static str;
}
