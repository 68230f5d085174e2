//! Azure resource descriptors
//!
//! Thin typed constructors over the deployment graph. Each constructor
//! assembles a `CreateRequest` body from a mix of literal and deferred
//! inputs and registers it; the returned wrapper exposes the outputs
//! downstream resources consume (names, ids, identity principal ids).

mod authorization;
mod core;
mod events;
mod keyvault;
mod sql;
mod web;

pub use authorization::{role_definition_id, RoleAssignment, RoleAssignmentArgs, STORAGE_ACCOUNT_KEY_OPERATOR_ROLE};
pub use self::core::{
    ResourceGroup, ResourceGroupArgs, StorageAccount, StorageAccountArgs, DEFAULT_STORAGE_SKU,
};
pub use events::{
    SystemTopic, SystemTopicArgs, SystemTopicEventSubscription,
    SystemTopicEventSubscriptionArgs, KEY_VAULT_TOPIC_TYPE, MAX_EVENTS_PER_BATCH,
    PREFERRED_BATCH_SIZE_KB, SECRET_NEAR_EXPIRY_EVENT,
};
pub use keyvault::{
    AccessPolicy, AccessPolicyArgs, AccessPolicyEntry, Secret, SecretArgs, Vault, VaultArgs,
};
pub use sql::{FirewallRuleArgs, SqlFirewallRule, SqlServer, SqlServerArgs};
pub use web::{
    AppServicePlan, AppServicePlanArgs, Component, ComponentArgs, WebApp, WebAppArgs,
    WebAppSourceControl, WebAppSourceControlArgs,
};
