use serde_json::{json, Value};

use crate::deployment::{Deployment, Registered, ResourceOptions};
use crate::output::Output;
use crate::providers::{CreateRequest, ResourceKind};

pub struct AppServicePlanArgs {
    pub plan_name: String,
    pub resource_group_name: String,
    pub location: Output<String>,
    /// `Y1` for consumption hosting, `P1V2` for premium.
    pub sku_name: String,
}

pub struct AppServicePlan {
    resource: Registered,
}

impl AppServicePlan {
    pub fn new(deployment: &Deployment, logical_name: &str, args: AppServicePlanArgs) -> Self {
        let plan_name = args.plan_name.clone();
        let resource_group_name = args.resource_group_name.clone();
        let sku_name = args.sku_name.clone();
        let request = args.location.map(move |location| CreateRequest {
            kind: ResourceKind::AppServicePlan,
            name: plan_name,
            resource_group: Some(resource_group_name),
            scope: None,
            body: json!({
                "location": location,
                "sku": { "name": sku_name },
            }),
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::AppServicePlan,
            request,
            ResourceOptions::new(),
        );

        Self { resource }
    }

    pub fn id(&self) -> Output<String> {
        self.resource.id()
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct ComponentArgs {
    pub resource_name: String,
    pub resource_group_name: String,
    pub location: Output<String>,
}

/// Application-insights telemetry component for the rotation function.
pub struct Component {
    resource: Registered,
}

impl Component {
    pub fn new(deployment: &Deployment, logical_name: &str, args: ComponentArgs) -> Self {
        let resource_name = args.resource_name.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args.location.map(move |location| CreateRequest {
            kind: ResourceKind::Component,
            name: resource_name,
            resource_group: Some(resource_group_name),
            scope: None,
            body: json!({
                "kind": "web",
                "location": location,
                "properties": {
                    "Application_Type": "web",
                    "Request_Source": "IbizaWebAppExtensionCreate",
                },
            }),
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::Component,
            request,
            ResourceOptions::new(),
        );

        Self { resource }
    }

    pub fn instrumentation_key(&self) -> Output<String> {
        self.resource.output_at("/properties/InstrumentationKey")
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct WebAppArgs {
    pub site_name: String,
    pub resource_group_name: String,
    pub location: Output<String>,
    pub server_farm_id: Output<String>,
    /// `functionapp` for the rotation function, `app` for the consumer site.
    pub site_kind: String,
    pub app_settings: Vec<(String, Output<String>)>,
}

/// A site with a system-assigned managed identity. The identity's principal
/// id is an output consumed by access-policy and role-assignment steps.
pub struct WebApp {
    resource: Registered,
    site_name: Output<String>,
}

impl WebApp {
    pub fn new(deployment: &Deployment, logical_name: &str, args: WebAppArgs) -> Self {
        let settings = Output::join(
            args.app_settings
                .iter()
                .map(|(name, value)| {
                    let name = name.clone();
                    value.map(move |value| (name, value))
                })
                .collect(),
        );
        let site_name = args.site_name.clone();
        let site_kind = args.site_kind.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args.location.zip3(&args.server_farm_id, &settings).map(
            move |(location, server_farm_id, settings)| {
                let app_settings: Vec<Value> = settings
                    .into_iter()
                    .map(|(name, value)| json!({ "name": name, "value": value }))
                    .collect();
                CreateRequest {
                    kind: ResourceKind::WebApp,
                    name: site_name,
                    resource_group: Some(resource_group_name),
                    scope: None,
                    body: json!({
                        "kind": site_kind,
                        "location": location,
                        "identity": { "type": "SystemAssigned" },
                        "properties": {
                            "enabled": true,
                            "serverFarmId": server_farm_id,
                            "siteConfig": { "appSettings": app_settings },
                        },
                    }),
                }
            },
        );
        let resource =
            deployment.register(logical_name, ResourceKind::WebApp, request, ResourceOptions::new());
        let site_name = {
            let name = args.site_name.clone();
            resource.done().map(move |_| name)
        };

        Self {
            resource,
            site_name,
        }
    }

    pub fn site_name(&self) -> Output<String> {
        self.site_name.clone()
    }

    pub fn id(&self) -> Output<String> {
        self.resource.id()
    }

    /// Principal id of the system-assigned identity.
    pub fn principal_id(&self) -> Output<String> {
        self.resource.output_at("/identity/principalId")
    }

    /// Tenant the identity was created in.
    pub fn identity_tenant_id(&self) -> Output<String> {
        self.resource.output_at("/identity/tenantId")
    }

    pub fn default_host_name(&self) -> Output<String> {
        self.resource.output_at("/defaultHostName")
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct WebAppSourceControlArgs {
    pub site_name: Output<String>,
    pub resource_group_name: String,
    pub repo_url: String,
    pub branch: String,
}

/// Binds a site to its source repository. Downstream event wiring must wait
/// for this binding; the function endpoints do not exist before it completes.
pub struct WebAppSourceControl {
    resource: Registered,
}

impl WebAppSourceControl {
    pub fn new(deployment: &Deployment, logical_name: &str, args: WebAppSourceControlArgs) -> Self {
        let repo_url = args.repo_url.clone();
        let branch = args.branch.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args.site_name.map(move |site| CreateRequest {
            kind: ResourceKind::WebAppSourceControl,
            name: format!("{site}/web"),
            resource_group: Some(resource_group_name),
            scope: None,
            body: json!({
                "properties": {
                    "repoUrl": repo_url,
                    "branch": branch,
                    "isManualIntegration": true,
                },
            }),
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::WebAppSourceControl,
            request,
            ResourceOptions::new(),
        );

        Self { resource }
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}
