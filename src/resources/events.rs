use serde_json::json;

use crate::deployment::{Deployment, Registered, ResourceOptions};
use crate::output::Output;
use crate::providers::{CreateRequest, ResourceKind};

/// Event type emitted by Key Vault ahead of a secret's expiry instant.
pub const SECRET_NEAR_EXPIRY_EVENT: &str = "Microsoft.KeyVault.SecretNearExpiry";

/// Topic type for system topics sourced from a vault.
pub const KEY_VAULT_TOPIC_TYPE: &str = "microsoft.keyvault.vaults";

pub const MAX_EVENTS_PER_BATCH: u32 = 1;
pub const PREFERRED_BATCH_SIZE_KB: u32 = 64;

pub struct SystemTopicArgs {
    pub topic_name: String,
    pub resource_group_name: String,
    pub location: Output<String>,
    /// Resource id of the vault the topic aggregates events from.
    pub source: Output<String>,
}

pub struct SystemTopic {
    resource: Registered,
    topic_name: Output<String>,
}

impl SystemTopic {
    pub fn new(deployment: &Deployment, logical_name: &str, args: SystemTopicArgs) -> Self {
        let topic_name = args.topic_name.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args.location.zip(&args.source).map(move |(location, source)| {
            CreateRequest {
                kind: ResourceKind::SystemTopic,
                name: topic_name,
                resource_group: Some(resource_group_name),
                scope: None,
                body: json!({
                    "location": location,
                    "properties": {
                        "source": source,
                        "topicType": KEY_VAULT_TOPIC_TYPE,
                    },
                }),
            }
        });
        let resource = deployment.register(
            logical_name,
            ResourceKind::SystemTopic,
            request,
            ResourceOptions::new(),
        );
        let topic_name = {
            let name = args.topic_name.clone();
            resource.done().map(move |_| name)
        };

        Self {
            resource,
            topic_name,
        }
    }

    pub fn topic_name(&self) -> Output<String> {
        self.topic_name.clone()
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}

pub struct SystemTopicEventSubscriptionArgs {
    pub subscription_name: Output<String>,
    pub system_topic_name: Output<String>,
    pub resource_group_name: String,
    /// Subject filter; both begins-with and ends-with are the secret name, so
    /// only expiry events for that exact secret reach the function.
    pub secret_name: String,
    /// `{functionAppId}/functions/{rotationFunction}`.
    pub destination_function_id: Output<String>,
}

/// Routes near-expiry events for one secret to the rotation function.
pub struct SystemTopicEventSubscription {
    resource: Registered,
}

impl SystemTopicEventSubscription {
    pub fn new(
        deployment: &Deployment,
        logical_name: &str,
        args: SystemTopicEventSubscriptionArgs,
        options: ResourceOptions,
    ) -> Self {
        let secret_name = args.secret_name.clone();
        let resource_group_name = args.resource_group_name.clone();
        let request = args
            .system_topic_name
            .zip3(&args.subscription_name, &args.destination_function_id)
            .map(move |(topic, subscription, destination)| CreateRequest {
                kind: ResourceKind::SystemTopicEventSubscription,
                name: format!("{topic}/{subscription}"),
                resource_group: Some(resource_group_name),
                scope: None,
                body: json!({
                    "properties": {
                        "filter": {
                            "subjectBeginsWith": secret_name,
                            "subjectEndsWith": secret_name,
                            "includedEventTypes": [SECRET_NEAR_EXPIRY_EVENT],
                        },
                        "destination": {
                            "endpointType": "AzureFunction",
                            "properties": {
                                "resourceId": destination,
                                "maxEventsPerBatch": MAX_EVENTS_PER_BATCH,
                                "preferredBatchSizeInKilobytes": PREFERRED_BATCH_SIZE_KB,
                            },
                        },
                    },
                }),
            });
        let resource = deployment.register(
            logical_name,
            ResourceKind::SystemTopicEventSubscription,
            request,
            options,
        );

        Self { resource }
    }

    pub fn handle(&self) -> &Registered {
        &self.resource
    }
}
