use serde_json::json;

use crate::deployment::{Deployment, Registered, ResourceOptions};
use crate::output::Output;
use crate::providers::{CreateRequest, ResourceKind};

/// Built-in role "Storage Account Key Operator Service Role".
pub const STORAGE_ACCOUNT_KEY_OPERATOR_ROLE: &str = "81a9662b-bebf-436f-a333-f67b29880f12";

/// Fully-qualified role-definition id within a subscription.
pub fn role_definition_id(subscription_id: &str, role_id: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/providers/Microsoft.Authorization/roleDefinitions/{role_id}"
    )
}

pub struct RoleAssignmentArgs {
    pub assignment_name: String,
    /// Resource id the role is granted on (the rotated storage account).
    pub scope: Output<String>,
    pub principal_id: Output<String>,
    pub role_definition_id: String,
}

/// Grants a role to a managed identity at a resource scope.
pub struct RoleAssignment {
    resource: Registered,
}

impl RoleAssignment {
    pub fn new(deployment: &Deployment, logical_name: &str, args: RoleAssignmentArgs) -> Self {
        let assignment_name = args.assignment_name.clone();
        let role_definition_id = args.role_definition_id.clone();
        let request = args.scope.zip(&args.principal_id).map(move |(scope, principal)| {
            CreateRequest {
                kind: ResourceKind::RoleAssignment,
                name: assignment_name,
                resource_group: None,
                scope: Some(scope),
                body: json!({
                    "properties": {
                        "roleDefinitionId": role_definition_id,
                        "principalId": principal,
                    },
                }),
            }
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::RoleAssignment,
            request,
            ResourceOptions::new(),
        );

        Self { resource }
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}
