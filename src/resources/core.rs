use serde_json::{json, Value};

use crate::deployment::{Deployment, Registered, ResourceOptions};
use crate::output::{Output, ResolveError};
use crate::providers::{CreateRequest, InvokeRequest, ResourceKind};

/// Every storage account in the rotation stacks is locally-redundant unless a
/// caller explicitly overrides the SKU.
pub const DEFAULT_STORAGE_SKU: &str = "Standard_LRS";

pub struct ResourceGroupArgs {
    pub name: String,
    pub location: String,
}

/// Deployment container; created once per stack, never mutated.
pub struct ResourceGroup {
    resource: Registered,
    name: Output<String>,
    location: Output<String>,
}

impl ResourceGroup {
    pub fn new(deployment: &Deployment, logical_name: &str, args: ResourceGroupArgs) -> Self {
        let request = Output::literal(CreateRequest {
            kind: ResourceKind::ResourceGroup,
            name: args.name.clone(),
            resource_group: None,
            scope: None,
            body: json!({ "location": args.location }),
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::ResourceGroup,
            request,
            ResourceOptions::new(),
        );

        // Known up front, but gated on creation so consumers pick up the
        // dependency edge.
        let name = {
            let name = args.name.clone();
            resource.done().map(move |_| name)
        };
        let location = {
            let location = args.location.clone();
            resource.done().map(move |_| location)
        };

        Self {
            resource,
            name,
            location,
        }
    }

    pub fn name(&self) -> Output<String> {
        self.name.clone()
    }

    pub fn location(&self) -> Output<String> {
        self.location.clone()
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct StorageAccountArgs {
    pub account_name: Output<String>,
    pub resource_group_name: String,
    pub location: Output<String>,
    pub sku: Option<String>,
}

pub struct StorageAccount {
    resource: Registered,
    account_name: Output<String>,
    resource_group_name: String,
}

impl StorageAccount {
    pub fn new(deployment: &Deployment, logical_name: &str, args: StorageAccountArgs) -> Self {
        let sku = args.sku.unwrap_or_else(|| DEFAULT_STORAGE_SKU.to_string());
        let resource_group_name = args.resource_group_name.clone();
        let request = args.account_name.zip(&args.location).map(move |(name, location)| {
            CreateRequest {
                kind: ResourceKind::StorageAccount,
                name,
                resource_group: Some(resource_group_name),
                scope: None,
                body: json!({
                    "kind": "Storage",
                    "location": location,
                    "sku": { "name": sku },
                }),
            }
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::StorageAccount,
            request,
            ResourceOptions::new(),
        );
        let account_name = resource.done().zip(&args.account_name).map(|(_, name)| name);

        Self {
            resource,
            account_name,
            resource_group_name: args.resource_group_name,
        }
    }

    pub fn account_name(&self) -> Output<String> {
        self.account_name.clone()
    }

    pub fn id(&self) -> Output<String> {
        self.resource.id()
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }

    /// First access key, via a `listKeys` invoke once the account exists.
    /// Call once and clone the output; each call issues its own invoke.
    pub fn primary_key(&self, deployment: &Deployment) -> Output<String> {
        let provider = deployment.provider();
        let resource_group = self.resource_group_name.clone();
        self.account_name.then(move |account_name| async move {
            let keys = provider
                .invoke(InvokeRequest::ListStorageAccountKeys {
                    account_name: account_name.clone(),
                    resource_group,
                })
                .await
                .map_err(|e| ResolveError::Provision {
                    resource: format!("listKeys({account_name})"),
                    message: e.to_string(),
                })?;
            keys.pointer("/keys/0/value")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ResolveError::Provision {
                    resource: format!("listKeys({account_name})"),
                    message: "no keys returned".to_string(),
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DryRunProvider, Provider};
    use std::sync::Arc;

    #[tokio::test]
    async fn storage_accounts_default_to_standard_lrs() {
        let provider = Arc::new(DryRunProvider::new());
        let deployment = Deployment::new(Arc::clone(&provider) as Arc<dyn Provider>);

        let storage = StorageAccount::new(
            &deployment,
            "appStorageAccount",
            StorageAccountArgs {
                account_name: "demostorage".into(),
                resource_group_name: "demo".to_string(),
                location: "CentralUS".into(),
                sku: None,
            },
        );
        assert!(deployment.run().await.is_success());

        let created = provider.created();
        assert_eq!(created[0].body.pointer("/sku/name").unwrap(), DEFAULT_STORAGE_SKU);
        assert_eq!(storage.account_name().resolve().await.unwrap(), "demostorage");
    }

    #[tokio::test]
    async fn primary_key_reads_the_first_listed_key() {
        let provider = Arc::new(DryRunProvider::new());
        let deployment = Deployment::new(provider as Arc<dyn Provider>);

        let storage = StorageAccount::new(
            &deployment,
            "appStorageAccount",
            StorageAccountArgs {
                account_name: "demostorage".into(),
                resource_group_name: "demo".to_string(),
                location: "CentralUS".into(),
                sku: None,
            },
        );
        let key = storage.primary_key(&deployment);
        assert_eq!(
            key.resolve().await.unwrap(),
            DryRunProvider::storage_key_for("demostorage")
        );
    }
}
