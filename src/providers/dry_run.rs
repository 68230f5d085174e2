use std::sync::Mutex;

use serde_json::{json, Value};
use tracing::debug;

use super::{
    CreateRequest, CreatedResource, InvokeRequest, Provider, ProviderError, ResourceKind,
};

const SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// In-memory provider backing `preview` and the structural tests.
///
/// Records every creation in submission order and fabricates deterministic
/// outputs for the values real resources would report asynchronously
/// (managed-identity principal ids, instrumentation keys, storage keys).
#[derive(Default)]
pub struct DryRunProvider {
    records: Mutex<Vec<CreateRequest>>,
}

impl DryRunProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creation requests in the order they were submitted.
    pub fn created(&self) -> Vec<CreateRequest> {
        self.records.lock().unwrap().clone()
    }

    /// Position of the first created resource of the given kind.
    pub fn creation_index(&self, kind: ResourceKind) -> Option<usize> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .position(|r| r.kind == kind)
    }

    pub fn tenant_id() -> &'static str {
        "dryrun-tenant"
    }

    pub fn object_id() -> &'static str {
        "dryrun-deployer"
    }

    /// Principal id fabricated for a web app's system-assigned identity.
    pub fn principal_id_for(site_name: &str) -> String {
        format!("{site_name}-principal")
    }

    /// First access key fabricated for a storage account.
    pub fn storage_key_for(account_name: &str) -> String {
        format!("{account_name}-key1")
    }

    fn fabricate_id(request: &CreateRequest) -> String {
        if let Some(scope) = &request.scope {
            return format!(
                "{}/providers/{}/{}",
                scope,
                request.kind.arm_type(),
                request.name
            );
        }
        match &request.resource_group {
            None => format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION_ID, request.name),
            Some(rg) => format!(
                "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
                SUBSCRIPTION_ID,
                rg,
                request.kind.arm_type(),
                request.name
            ),
        }
    }

    fn fabricate_outputs(request: &CreateRequest) -> Value {
        match request.kind {
            ResourceKind::WebApp => json!({
                "identity": {
                    "principalId": Self::principal_id_for(&request.name),
                    "tenantId": Self::tenant_id(),
                },
                "defaultHostName": format!("{}.azurewebsites.net", request.name),
            }),
            ResourceKind::Component => json!({
                "properties": {
                    "InstrumentationKey": format!("{}-ikey", request.name),
                }
            }),
            _ => request.body.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for DryRunProvider {
    async fn create(&self, request: CreateRequest) -> Result<CreatedResource, ProviderError> {
        debug!("dry run: would create {} ({})", request.name, request.kind.arm_type());
        let created = CreatedResource {
            id: Self::fabricate_id(&request),
            outputs: Self::fabricate_outputs(&request),
        };
        self.records.lock().unwrap().push(request);
        Ok(created)
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<Value, ProviderError> {
        match request {
            InvokeRequest::ClientConfig => Ok(json!({
                "tenantId": Self::tenant_id(),
                "objectId": Self::object_id(),
            })),
            InvokeRequest::ListStorageAccountKeys { account_name, .. } => Ok(json!({
                "keys": [
                    { "keyName": "key1", "value": Self::storage_key_for(&account_name) },
                    { "keyName": "key2", "value": format!("{account_name}-key2") },
                ]
            })),
        }
    }

    fn provider_type(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_creations_in_order() {
        let provider = DryRunProvider::new();
        provider
            .create(CreateRequest {
                kind: ResourceKind::ResourceGroup,
                name: "demo".to_string(),
                resource_group: None,
                scope: None,
                body: json!({"location": "CentralUS"}),
            })
            .await
            .unwrap();
        provider
            .create(CreateRequest {
                kind: ResourceKind::Vault,
                name: "demo-kv".to_string(),
                resource_group: Some("demo".to_string()),
                scope: None,
                body: json!({}),
            })
            .await
            .unwrap();

        let created = provider.created();
        assert_eq!(created.len(), 2);
        assert!(provider.creation_index(ResourceKind::ResourceGroup).unwrap()
            < provider.creation_index(ResourceKind::Vault).unwrap());
    }

    #[tokio::test]
    async fn web_apps_get_a_fabricated_identity() {
        let provider = DryRunProvider::new();
        let created = provider
            .create(CreateRequest {
                kind: ResourceKind::WebApp,
                name: "demo-fnapp".to_string(),
                resource_group: Some("demo".to_string()),
                scope: None,
                body: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(
            created.outputs.pointer("/identity/principalId").unwrap(),
            "demo-fnapp-principal"
        );
    }
}
