//! Resource-dependency graph and cooperative scheduler.
//!
//! A [`Deployment`] collects resource registrations while a stack builder
//! runs, then drives every provisioning future to completion in a single
//! task. Ordering comes from two kinds of edges: data dependencies (an input
//! [`Output`] derived from another resource) and explicit `depends_on` gates
//! for relationships with no data flow, such as an event subscription that
//! must wait for a source-control deployment to finish.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::output::{Output, ResolveError};
use crate::providers::{CreateRequest, CreatedResource, InvokeRequest, Provider, ResourceKind};

/// One node of the resource graph, exposed for structural inspection.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub name: String,
    pub kind: ResourceKind,
    pub depends_on: BTreeSet<String>,
}

/// Handle to a registered resource.
#[derive(Clone)]
pub struct Registered {
    name: String,
    created: Output<CreatedResource>,
    done: Output<()>,
}

impl Registered {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provisioned resource id.
    pub fn id(&self) -> Output<String> {
        self.created.map(|c| c.id)
    }

    /// Completion token for explicit ordering edges.
    pub fn done(&self) -> Output<()> {
        self.done.clone()
    }

    /// Extract a string output reported by the provider, addressed by JSON
    /// pointer (e.g. `/identity/principalId`). Resolution fails if the
    /// provider did not report the value.
    pub fn output_at(&self, pointer: &str) -> Output<String> {
        let pointer = pointer.to_string();
        let name = self.name.clone();
        self.created.then(move |created| async move {
            created
                .outputs
                .pointer(&pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ResolveError::Provision {
                    resource: name,
                    message: format!("missing output '{pointer}'"),
                })
        })
    }
}

/// Explicit ordering directives for a registration.
#[derive(Default, Clone)]
pub struct ResourceOptions {
    gates: Vec<(String, Output<()>)>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create this resource strictly after `resource` completes, even though
    /// no data flows between them.
    pub fn depends_on(mut self, resource: &Registered) -> Self {
        self.gates.push((resource.name.clone(), resource.done()));
        self
    }
}

/// Tenant and object id of the deploying principal, as deferred values.
pub struct ClientConfig {
    pub tenant_id: Output<String>,
    pub object_id: Output<String>,
}

/// Outcome of driving a deployment: which resources were created, which
/// failed, and which were skipped because an upstream failed.
#[derive(Debug, Default)]
pub struct RunReport {
    pub created: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub struct Deployment {
    provider: Arc<dyn Provider>,
    nodes: Mutex<Vec<NodeRecord>>,
    completions: Mutex<Vec<(String, Output<()>)>>,
}

impl Deployment {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            nodes: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        }
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    /// Snapshot of the registered graph.
    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn node(&self, name: &str) -> Option<NodeRecord> {
        self.nodes.lock().unwrap().iter().find(|n| n.name == name).cloned()
    }

    /// Register a resource. The returned handle's outputs resolve once the
    /// provider call completes; the call itself is issued at most once, and
    /// only after every data dependency and explicit gate has resolved.
    pub fn register(
        &self,
        name: &str,
        kind: ResourceKind,
        request: Output<CreateRequest>,
        options: ResourceOptions,
    ) -> Registered {
        let mut depends_on = request.dependencies().clone();
        depends_on.extend(options.gates.iter().map(|(gate, _)| gate.clone()));
        self.nodes.lock().unwrap().push(NodeRecord {
            name: name.to_string(),
            kind,
            depends_on,
        });

        let provider = Arc::clone(&self.provider);
        let logical = name.to_string();
        let gates = options.gates;
        let created = Output::with_deps(
            async move {
                for (_, gate) in gates {
                    gate.resolve().await.map_err(|e| ResolveError::Dependency {
                        resource: logical.clone(),
                        upstream: e.root().to_string(),
                    })?;
                }
                let request = request.resolve().await.map_err(|e| {
                    ResolveError::Dependency {
                        resource: logical.clone(),
                        upstream: e.root().to_string(),
                    }
                })?;

                debug!("Submitting {} ({})", logical, request.kind.arm_type());
                match provider.create(request).await {
                    Ok(created) => {
                        info!("Provisioned {}: {}", logical, created.id);
                        Ok(created)
                    }
                    Err(e) => {
                        warn!("Provisioning {} failed: {}", logical, e);
                        Err(ResolveError::Provision {
                            resource: logical.clone(),
                            message: e.to_string(),
                        })
                    }
                }
            },
            BTreeSet::from([name.to_string()]),
        );

        let done = created.map(|_| ());
        self.completions
            .lock()
            .unwrap()
            .push((name.to_string(), done.clone()));

        Registered {
            name: name.to_string(),
            created,
            done,
        }
    }

    /// Identity of the deploying principal, fetched once per deployment.
    pub fn client_config(&self) -> ClientConfig {
        let provider = self.provider();
        let config: Output<Value> = Output::with_deps(
            async move {
                provider
                    .invoke(InvokeRequest::ClientConfig)
                    .await
                    .map_err(|e| ResolveError::Provision {
                        resource: "clientConfig".to_string(),
                        message: e.to_string(),
                    })
            },
            BTreeSet::new(),
        );

        let field = |pointer: &'static str| {
            config.then(move |value| async move {
                value
                    .pointer(pointer)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| ResolveError::Provision {
                        resource: "clientConfig".to_string(),
                        message: format!("missing field '{pointer}'"),
                    })
            })
        };

        ClientConfig {
            tenant_id: field("/tenantId"),
            object_id: field("/objectId"),
        }
    }

    /// Drive every registered resource to completion. Resources with no
    /// relationship may complete in any order; a failed resource aborts its
    /// dependent subgraph, never the siblings.
    pub async fn run(&self) -> RunReport {
        let completions: Vec<_> = self.completions.lock().unwrap().clone();
        let results = futures::future::join_all(completions.into_iter().map(
            |(name, done)| async move {
                let result = done.resolve().await;
                (name, result)
            },
        ))
        .await;

        let mut report = RunReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.created.push(name),
                Err(ResolveError::Provision { message, .. }) => {
                    report.failed.push((name, message));
                }
                Err(ResolveError::Dependency { upstream, .. }) => {
                    report.skipped.push((name, upstream));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DryRunProvider, ProviderError};
    use serde_json::json;

    fn request(kind: ResourceKind, name: &str) -> Output<CreateRequest> {
        Output::literal(CreateRequest {
            kind,
            name: name.to_string(),
            resource_group: Some("demo".to_string()),
            scope: None,
            body: json!({}),
        })
    }

    #[tokio::test]
    async fn explicit_gates_order_unrelated_resources() {
        let provider = Arc::new(DryRunProvider::new());
        let deployment = Deployment::new(Arc::clone(&provider) as Arc<dyn Provider>);

        let source_control = deployment.register(
            "functionAppSourceControl",
            ResourceKind::WebAppSourceControl,
            request(ResourceKind::WebAppSourceControl, "fnapp/web"),
            ResourceOptions::new(),
        );
        deployment.register(
            "secretExpiryEvent",
            ResourceKind::SystemTopicEventSubscription,
            request(ResourceKind::SystemTopicEventSubscription, "SecretExpiry/sub"),
            ResourceOptions::new().depends_on(&source_control),
        );

        let report = deployment.run().await;
        assert!(report.is_success());
        assert!(
            provider
                .creation_index(ResourceKind::WebAppSourceControl)
                .unwrap()
                < provider
                    .creation_index(ResourceKind::SystemTopicEventSubscription)
                    .unwrap()
        );

        let node = deployment.node("secretExpiryEvent").unwrap();
        assert!(node.depends_on.contains("functionAppSourceControl"));
    }

    #[tokio::test]
    async fn data_dependencies_become_graph_edges() {
        let provider = Arc::new(DryRunProvider::new());
        let deployment = Deployment::new(provider as Arc<dyn Provider>);

        let group = deployment.register(
            "resourceGroup",
            ResourceKind::ResourceGroup,
            Output::literal(CreateRequest {
                kind: ResourceKind::ResourceGroup,
                name: "demo".to_string(),
                resource_group: None,
                scope: None,
                body: json!({"location": "CentralUS"}),
            }),
            ResourceOptions::new(),
        );

        let vault_request = group.id().map(|_| CreateRequest {
            kind: ResourceKind::Vault,
            name: "demo-kv".to_string(),
            resource_group: Some("demo".to_string()),
            scope: None,
            body: json!({}),
        });
        deployment.register("vault", ResourceKind::Vault, vault_request, ResourceOptions::new());

        let node = deployment.node("vault").unwrap();
        assert!(node.depends_on.contains("resourceGroup"));
        assert!(deployment.run().await.is_success());
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl Provider for FailingProvider {
        async fn create(
            &self,
            request: CreateRequest,
        ) -> Result<CreatedResource, ProviderError> {
            if request.kind == ResourceKind::StorageAccount {
                return Err(ProviderError::Api {
                    status: 409,
                    body: "name already taken".to_string(),
                });
            }
            Ok(CreatedResource {
                id: format!("/fake/{}", request.name),
                outputs: request.body,
            })
        }

        async fn invoke(&self, _request: InvokeRequest) -> Result<Value, ProviderError> {
            Ok(json!({}))
        }

        fn provider_type(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn upstream_failure_skips_dependents_without_submitting_them() {
        let deployment = Deployment::new(Arc::new(FailingProvider));

        let storage = deployment.register(
            "storageAccount",
            ResourceKind::StorageAccount,
            request(ResourceKind::StorageAccount, "demostorage"),
            ResourceOptions::new(),
        );
        let secret_request = storage.id().map(|id| CreateRequest {
            kind: ResourceKind::Secret,
            name: "demo-kv/storageKey".to_string(),
            resource_group: Some("demo".to_string()),
            scope: None,
            body: json!({"properties": {"value": id}}),
        });
        deployment.register(
            "secret",
            ResourceKind::Secret,
            secret_request,
            ResourceOptions::new(),
        );
        deployment.register(
            "unrelated",
            ResourceKind::AppServicePlan,
            request(ResourceKind::AppServicePlan, "demo-plan"),
            ResourceOptions::new(),
        );

        let report = deployment.run().await;
        assert_eq!(report.created, vec!["unrelated".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "storageAccount");
        assert_eq!(
            report.skipped,
            vec![("secret".to_string(), "storageAccount".to_string())]
        );
    }

    #[tokio::test]
    async fn output_at_fails_for_missing_values() {
        let provider = Arc::new(DryRunProvider::new());
        let deployment = Deployment::new(provider as Arc<dyn Provider>);
        let plan = deployment.register(
            "plan",
            ResourceKind::AppServicePlan,
            request(ResourceKind::AppServicePlan, "demo-plan"),
            ResourceOptions::new(),
        );
        let missing = plan.output_at("/properties/doesNotExist");
        assert!(missing.resolve().await.is_err());
    }
}
