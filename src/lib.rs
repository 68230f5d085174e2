//! Azure Key Vault Rotation Stacks
//!
//! A library for declaratively deploying the Azure resources behind automatic
//! credential rotation: a vault, the rotated accounts, an event-driven
//! rotation function and the wiring between them. Resource inputs are
//! deferred [`output::Output`] values, so creation order follows data flow;
//! a [`deployment::Deployment`] drives the resulting graph against either
//! the live management plane or an in-memory dry-run provider.

pub mod config;
pub mod deployment;
pub mod naming;
pub mod output;
pub mod providers;
pub mod resources;
pub mod stack;

pub use config::Config;
pub use deployment::{Deployment, RunReport};
pub use output::Output;
pub use stack::{RotationStack, SecretKind, StackOptions, StackParams, Variant};
