//! CLI parsing and command execution.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use akv_rotation_stacks::config::{AzureConfig, Config};
use akv_rotation_stacks::deployment::{Deployment, RunReport};
use akv_rotation_stacks::providers::{ArmProvider, DryRunProvider, Provider};
use akv_rotation_stacks::stack::{self, RotationStack, SecretKind, StackOptions, StackParams, Variant};

#[derive(Parser)]
#[command(name = "akvrs")]
#[command(about = "Deploy Azure Key Vault credential-rotation stacks", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "AKVRS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Azure subscription id (overrides config file)
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Azure tenant id (overrides config file)
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Object id of the deploying principal (overrides config file)
    #[arg(long, env = "AZURE_OBJECT_ID")]
    pub object_id: Option<String>,

    /// Management-plane access token (overrides config file)
    #[arg(long, env = "AZURE_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a sample configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "rotation-stacks.toml")]
        output: PathBuf,
    },

    /// Show the resources a variant would create, in creation order
    Preview {
        #[command(flatten)]
        variant: VariantArgs,
    },

    /// Deploy a variant against the Azure management plane
    Deploy {
        #[command(flatten)]
        variant: VariantArgs,
    },
}

/// A variant preset plus per-option overrides.
#[derive(clap::Args)]
pub struct VariantArgs {
    /// Stack variant: two-sets, two-sets-seeded or one-set
    pub variant: Variant,

    /// Override the rotated credential kind (storage-key or sql-password)
    #[arg(long)]
    pub secret_kind: Option<SecretKind>,

    /// Override whether a second storage account is created
    #[arg(long)]
    pub dual_storage: Option<bool>,

    /// Override whether an initial secret is seeded into the vault
    #[arg(long)]
    pub seed_secret: Option<bool>,
}

impl VariantArgs {
    fn options(&self) -> StackOptions {
        let mut options = self.variant.options();
        if let Some(secret_kind) = self.secret_kind {
            options.secret_kind = secret_kind;
        }
        if let Some(dual_storage) = self.dual_storage {
            options.dual_storage = dual_storage;
        }
        if let Some(seed_secret) = self.seed_secret {
            options.seed_secret = seed_secret;
        }
        options
    }
}

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    // Handle init separately as it doesn't need a loaded config
    if let Commands::Init { output } = cli.command {
        Config::create_sample(&output)
            .with_context(|| format!("Failed to create sample config at {:?}", output))?;
        info!("Sample configuration created at {:?}", output);
        return Ok(());
    }

    let mut config = if let Some(config_path) = cli.config {
        Config::from_file(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        Config::from_env().context("Failed to load config from environment")?
    };

    // Override Azure credentials with CLI arguments if provided
    if let Some(ref mut azure) = config.azure {
        if let Some(subscription_id) = cli.subscription_id {
            azure.subscription_id = subscription_id;
        }
        if let Some(tenant_id) = cli.tenant_id {
            azure.tenant_id = tenant_id;
        }
        if let Some(object_id) = cli.object_id {
            azure.object_id = Some(object_id);
        }
        if let Some(token) = cli.access_token {
            azure.access_token = Some(token);
        }
    } else if let (Some(subscription_id), Some(tenant_id)) = (cli.subscription_id, cli.tenant_id) {
        config.azure = Some(AzureConfig {
            subscription_id,
            tenant_id,
            object_id: cli.object_id,
            access_token: cli.access_token,
        });
    }

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above

        Commands::Preview { variant } => {
            let provider = Arc::new(DryRunProvider::new());
            let deployment = Deployment::new(Arc::clone(&provider) as Arc<dyn Provider>);
            let (stack, report) = run_variant(&deployment, &config, variant.options()).await;

            println!("Variant: {}", variant.variant.name());
            println!("Resources in creation order:");
            for (index, request) in provider.created().iter().enumerate() {
                println!("{:>3}. {}  {}", index + 1, request.kind.arm_type(), request.name);
            }

            println!("\nDependency edges:");
            for node in deployment.nodes() {
                if !node.depends_on.is_empty() {
                    let upstream: Vec<String> = node.depends_on.iter().cloned().collect();
                    println!("  {} <- {}", node.name, upstream.join(", "));
                }
            }

            print_outcome(&stack, &report).await
        }

        Commands::Deploy { variant } => {
            let azure = config.azure.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "Azure credentials not configured. Set AZURE_SUBSCRIPTION_ID and AZURE_TENANT_ID or add an [azure] section"
                )
            })?;
            let object_id = azure.object_id.ok_or_else(|| {
                anyhow::anyhow!("Object id not configured. Set AZURE_OBJECT_ID or azure.object_id")
            })?;
            let token = azure.access_token.ok_or_else(|| {
                anyhow::anyhow!(
                    "Access token not configured. Set AZURE_ACCESS_TOKEN or azure.access_token"
                )
            })?;

            let provider = ArmProvider::new(
                azure.subscription_id,
                azure.tenant_id,
                object_id,
                token,
            )
            .context("Failed to create ARM client")?;
            let deployment = Deployment::new(Arc::new(provider));
            let (stack, report) = run_variant(&deployment, &config, variant.options()).await;

            println!("Deployed {} resource(s)", report.created.len());
            print_outcome(&stack, &report).await
        }
    }
}

async fn run_variant(
    deployment: &Deployment,
    config: &Config,
    options: StackOptions,
) -> (RotationStack, RunReport) {
    let params = StackParams::resolve(config, options.secret_kind);
    let stack = stack::build(deployment, &params, options);
    let report = deployment.run().await;
    (stack, report)
}

async fn print_outcome(stack: &RotationStack, report: &RunReport) -> Result<()> {
    for (name, message) in &report.failed {
        error!("{} failed: {}", name, message);
    }
    for (name, upstream) in &report.skipped {
        error!("{} skipped: upstream {} failed", name, upstream);
    }
    if !report.is_success() {
        anyhow::bail!(
            "{} resource(s) failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        );
    }

    println!("\nStack outputs:");
    if let Ok(vault_name) = stack.vault_name.resolve().await {
        println!("  Key vault:    {}", vault_name);
    }
    println!("  Function app: {}", stack.function_app_name);
    if let Some(endpoint) = &stack.web_app_endpoint {
        if let Ok(host) = endpoint.resolve().await {
            println!("  Web endpoint: https://{}", host);
        }
    }
    Ok(())
}
