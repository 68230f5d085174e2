use serde_json::json;

use crate::deployment::{Deployment, Registered, ResourceOptions};
use crate::output::Output;
use crate::providers::{CreateRequest, ResourceKind};

pub struct SqlServerArgs {
    pub server_name: Output<String>,
    pub resource_group_name: String,
    pub location: Output<String>,
    pub administrator_login: String,
    pub administrator_password: String,
}

/// Logical SQL server whose admin password is the rotated credential.
pub struct SqlServer {
    resource: Registered,
    server_name: Output<String>,
}

impl SqlServer {
    pub fn new(deployment: &Deployment, logical_name: &str, args: SqlServerArgs) -> Self {
        let login = args.administrator_login.clone();
        let password = args.administrator_password.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args.server_name.zip(&args.location).map(move |(name, location)| {
            CreateRequest {
                kind: ResourceKind::SqlServer,
                name,
                resource_group: Some(resource_group_name),
                scope: None,
                body: json!({
                    "location": location,
                    "properties": {
                        "administratorLogin": login,
                        "administratorLoginPassword": password,
                        "version": "12.0",
                    },
                }),
            }
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::SqlServer,
            request,
            ResourceOptions::new(),
        );
        let server_name = resource.done().zip(&args.server_name).map(|(_, name)| name);

        Self {
            resource,
            server_name,
        }
    }

    pub fn server_name(&self) -> Output<String> {
        self.server_name.clone()
    }

    pub fn id(&self) -> Output<String> {
        self.resource.id()
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct FirewallRuleArgs {
    pub rule_name: String,
    pub server_name: Output<String>,
    pub resource_group_name: String,
    pub start_ip_address: String,
    pub end_ip_address: String,
}

/// Server-level firewall rule; 0.0.0.0–0.0.0.0 admits Azure-internal traffic.
pub struct SqlFirewallRule {
    resource: Registered,
}

impl SqlFirewallRule {
    pub fn new(deployment: &Deployment, logical_name: &str, args: FirewallRuleArgs) -> Self {
        let rule_name = args.rule_name.clone();
        let resource_group_name = args.resource_group_name.clone();
        let start = args.start_ip_address.clone();
        let end = args.end_ip_address.clone();
        let request = args.server_name.map(move |server| CreateRequest {
            kind: ResourceKind::SqlFirewallRule,
            name: format!("{server}/{rule_name}"),
            resource_group: Some(resource_group_name),
            scope: None,
            body: json!({
                "properties": {
                    "startIpAddress": start,
                    "endIpAddress": end,
                },
            }),
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::SqlFirewallRule,
            request,
            ResourceOptions::new(),
        );

        Self { resource }
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}
