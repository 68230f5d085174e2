use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    CreateRequest, CreatedResource, InvokeRequest, Provider, ProviderError, ResourceKind,
};

const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Azure Resource Manager provider.
///
/// Submits resource bodies as `PUT` requests against the management endpoint,
/// authenticated with a bearer token. Identity values (tenant and object id of
/// the deployer) are taken from configuration rather than fetched, so a single
/// token is the only live credential this provider needs.
pub struct ArmProvider {
    client: Client,
    endpoint: String,
    subscription_id: String,
    tenant_id: String,
    object_id: String,
    token: String,
}

impl ArmProvider {
    pub fn new(
        subscription_id: String,
        tenant_id: String,
        object_id: String,
        token: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            subscription_id,
            tenant_id,
            object_id,
            token,
        })
    }

    /// Point the provider at a different management endpoint. Used by tests.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// ARM id path for a create request, without the endpoint prefix.
    ///
    /// Child resource names (`parent/child`) are interleaved with the trailing
    /// segments of the ARM type, e.g. `Microsoft.Web/sites/sourcecontrols`
    /// with name `myapp/web` becomes `.../sites/myapp/sourcecontrols/web`.
    fn resource_path(&self, request: &CreateRequest) -> Result<String, ProviderError> {
        if let Some(scope) = &request.scope {
            return Ok(format!(
                "{}/providers/{}/{}",
                scope,
                request.kind.arm_type(),
                request.name
            ));
        }

        if request.kind == ResourceKind::ResourceGroup {
            return Ok(format!(
                "/subscriptions/{}/resourcegroups/{}",
                self.subscription_id, request.name
            ));
        }

        let resource_group = request.resource_group.as_deref().ok_or_else(|| {
            ProviderError::Invalid(format!(
                "resource '{}' has neither a resource group nor a scope",
                request.name
            ))
        })?;

        let mut type_segments = request.kind.arm_type().split('/');
        let namespace = type_segments.next().unwrap_or_default();
        let type_segments: Vec<&str> = type_segments.collect();
        let name_segments: Vec<&str> = request.name.split('/').collect();
        if type_segments.len() != name_segments.len() {
            return Err(ProviderError::Invalid(format!(
                "name '{}' does not match resource type '{}'",
                request.name,
                request.kind.arm_type()
            )));
        }

        let mut path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, resource_group, namespace
        );
        for (type_segment, name_segment) in type_segments.iter().zip(&name_segments) {
            path.push('/');
            path.push_str(type_segment);
            path.push('/');
            path.push_str(name_segment);
        }
        Ok(path)
    }

    async fn put(
        &self,
        path: &str,
        api_version: &str,
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{}?api-version={}", self.endpoint, path, api_version);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl Provider for ArmProvider {
    async fn create(&self, request: CreateRequest) -> Result<CreatedResource, ProviderError> {
        let path = self.resource_path(&request)?;
        let outputs = self
            .put(&path, request.kind.api_version(), &request.body)
            .await?;

        let id = outputs
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(path);

        info!("Created {} ({})", request.name, request.kind.arm_type());
        Ok(CreatedResource { id, outputs })
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<Value, ProviderError> {
        match request {
            InvokeRequest::ClientConfig => Ok(serde_json::json!({
                "tenantId": self.tenant_id,
                "objectId": self.object_id,
            })),
            InvokeRequest::ListStorageAccountKeys {
                account_name,
                resource_group,
            } => {
                let url = format!(
                    "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}/listKeys?api-version={}",
                    self.endpoint,
                    self.subscription_id,
                    resource_group,
                    account_name,
                    ResourceKind::StorageAccount.api_version(),
                );
                debug!("POST {}", url);

                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProviderError::Api { status, body });
                }

                Ok(response.json().await?)
            }
        }
    }

    fn provider_type(&self) -> &'static str {
        "arm"
    }
}
