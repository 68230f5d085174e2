use serde_json::{json, Value};

use crate::deployment::{Deployment, Registered, ResourceOptions};
use crate::output::Output;
use crate::providers::{CreateRequest, ResourceKind};

/// One entry of a vault's access-policy list.
pub struct AccessPolicyEntry {
    pub tenant_id: Output<String>,
    pub object_id: Output<String>,
    pub secret_permissions: Vec<String>,
}

impl AccessPolicyEntry {
    fn to_value(&self) -> Output<Value> {
        let permissions = self.secret_permissions.clone();
        self.tenant_id.zip(&self.object_id).map(move |(tenant, object)| {
            json!({
                "tenantId": tenant,
                "objectId": object,
                "permissions": { "secrets": permissions },
            })
        })
    }
}

pub struct VaultArgs {
    pub vault_name: Output<String>,
    pub resource_group_name: String,
    pub location: Output<String>,
    pub tenant_id: Output<String>,
    pub access_policies: Vec<AccessPolicyEntry>,
}

/// Secret store. Policies for principals that do not exist yet (the function
/// identity) are appended later through [`AccessPolicy`] resources.
pub struct Vault {
    resource: Registered,
    vault_name: Output<String>,
}

impl Vault {
    pub fn new(deployment: &Deployment, logical_name: &str, args: VaultArgs) -> Self {
        let policies = Output::join(args.access_policies.iter().map(|p| p.to_value()).collect());
        let resource_group_name = args.resource_group_name.clone();
        let request = args
            .vault_name
            .zip3(&args.location, &args.tenant_id)
            .zip(&policies)
            .map(move |((name, location, tenant), policies)| CreateRequest {
                kind: ResourceKind::Vault,
                name,
                resource_group: Some(resource_group_name),
                scope: None,
                body: json!({
                    "location": location,
                    "properties": {
                        "accessPolicies": policies,
                        "enabledForDeployment": false,
                        "enabledForDiskEncryption": false,
                        "enabledForTemplateDeployment": false,
                        // Should be enabled for production.
                        "enableSoftDelete": false,
                        "sku": { "family": "A", "name": "standard" },
                        "tenantId": tenant,
                    },
                }),
            });
        let resource =
            deployment.register(logical_name, ResourceKind::Vault, request, ResourceOptions::new());
        let vault_name = resource.done().zip(&args.vault_name).map(|(_, name)| name);

        Self {
            resource,
            vault_name,
        }
    }

    pub fn vault_name(&self) -> Output<String> {
        self.vault_name.clone()
    }

    pub fn id(&self) -> Output<String> {
        self.resource.id()
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct SecretArgs {
    pub secret_name: String,
    pub vault_name: Output<String>,
    pub resource_group_name: String,
    pub value: Output<String>,
    /// Expiry as a unix timestamp; the vault raises `SecretNearExpiry` ahead
    /// of this instant.
    pub expires_at: i64,
    /// Provenance tags (CredentialId, ProviderAddress, ValidityPeriodDays).
    pub tags: Vec<(String, Output<String>)>,
}

/// A rotatable credential value seeded into the vault.
pub struct Secret {
    resource: Registered,
}

impl Secret {
    pub fn new(
        deployment: &Deployment,
        logical_name: &str,
        args: SecretArgs,
        options: ResourceOptions,
    ) -> Self {
        let tags = Output::join(
            args.tags
                .iter()
                .map(|(key, value)| {
                    let key = key.clone();
                    value.map(move |value| (key, value))
                })
                .collect(),
        );
        let secret_name = args.secret_name.clone();
        let resource_group_name = args.resource_group_name.clone();
        let expires_at = args.expires_at;
        let request = args.vault_name.zip3(&args.value, &tags).map(
            move |(vault, value, tags)| {
                let tags: serde_json::Map<String, Value> = tags
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect();
                CreateRequest {
                    kind: ResourceKind::Secret,
                    name: format!("{vault}/{secret_name}"),
                    resource_group: Some(resource_group_name),
                    scope: None,
                    body: json!({
                        "properties": {
                            "value": value,
                            "attributes": { "exp": expires_at },
                        },
                        "tags": tags,
                    }),
                }
            },
        );
        let resource = deployment.register(logical_name, ResourceKind::Secret, request, options);

        Self { resource }
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct AccessPolicyArgs {
    pub vault_name: Output<String>,
    pub resource_group_name: String,
    pub tenant_id: Output<String>,
    pub object_id: Output<String>,
    pub secret_permissions: Vec<String>,
}

/// Appends an access-policy entry to an existing vault. Registered only once
/// the principal's identity output is available.
pub struct AccessPolicy {
    resource: Registered,
}

impl AccessPolicy {
    pub fn new(deployment: &Deployment, logical_name: &str, args: AccessPolicyArgs) -> Self {
        let permissions = args.secret_permissions.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args
            .vault_name
            .zip3(&args.tenant_id, &args.object_id)
            .map(move |(vault, tenant, object)| CreateRequest {
                kind: ResourceKind::AccessPolicy,
                name: format!("{vault}/add"),
                resource_group: Some(resource_group_name),
                scope: None,
                body: json!({
                    "properties": {
                        "accessPolicies": [{
                            "tenantId": tenant,
                            "objectId": object,
                            "permissions": { "secrets": permissions },
                        }],
                    },
                }),
            });
        let resource = deployment.register(
            logical_name,
            ResourceKind::AccessPolicy,
            request,
            ResourceOptions::new(),
        );

        Self { resource }
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}
