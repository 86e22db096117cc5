mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, DeployAction, ObservabilityAction, WebhookAction};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => commands::version::run()?,
        Commands::Check => commands::check::run().await?,
        Commands::List { resource } => {
            commands::list::run(resource).await?;
        }
        Commands::Simple(args) => {
            commands::recommend::run("simple", args.into()).await?;
        }
        Commands::Ai(args) => {
            commands::recommend::run("ai", args.into()).await?;
        }
        Commands::Webhook { action } => match action {
            WebhookAction::Serve { addr, tls_cert, tls_key } => {
                commands::webhook::serve(&addr, &tls_cert, &tls_key).await?;
            }
            WebhookAction::CertGenerate {
                service_name,
                namespace,
                output_dir,
                ip_sans,
            } => {
                commands::webhook::generate_certs(&service_name, &namespace, &output_dir, &ip_sans)?;
            }
            WebhookAction::InstallConfig {
                service_name,
                namespace,
                ca_bundle_path,
            } => {
                commands::webhook::install_config(&service_name, &namespace, &ca_bundle_path)?;
            }
        },
        Commands::Observability { action } => match action {
            ObservabilityAction::GenerateAll => println!("{}", commands::observability::generate_all()),
            ObservabilityAction::GenerateServiceMonitors => {
                println!("{}", commands::observability::generate_service_monitors())
            }
            ObservabilityAction::GenerateDashboard => {
                println!("{}", commands::observability::generate_grafana_dashboard_configmap())
            }
        },
        Commands::Deploy { action } => match action {
            DeployAction::GenerateAll => println!("{}", commands::deploy::generate_all()),
            DeployAction::GenerateRbac => println!("{}", commands::deploy::generate_rbac()),
        },
    }

    Ok(())
}
