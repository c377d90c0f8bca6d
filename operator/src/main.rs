use clap::{Parser, Subcommand};
use kube::client::Client;
use tokio_util::sync::CancellationToken;
use tracker::ResourceTracker;

mod binddefinition;
mod roledefinition;
mod terminator;
mod tracker;
mod util;
mod webhookauthorizer;

#[cfg(feature = "metrics")]
mod metrics;

/// Top-level CLI configuration for the binary. Any command line
/// flags should go in here.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Prometheus metrics server scrape port. Disabled by default.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

/// List of subcommands for the binary. Clap will convert the
/// name of each enum variant to kebab-case for the CLI, e.g.
/// `ManageRoleDefinitions` becomes `manage-role-definitions`. Each subcommand runs a single
/// reconciler kind, so the same binary can be scaled independently per controller.
#[derive(Subcommand)]
enum Command {
    ManageRoleDefinitions,
    ManageBindDefinitions,
    ManageRoleBindings,
    ManageWebhookAuthorizers,
}

/// Secondary entrypoint that runs the appropriate subcommand.
async fn run(client: Client, cancel: CancellationToken) {
    let cli = Cli::parse();

    #[cfg(feature = "metrics")]
    if let Some(metrics_port) = cli.metrics_port {
        tokio::spawn(metrics::run_server(metrics_port));
    }

    let result = match cli.command {
        Command::ManageRoleDefinitions => {
            let tracker = ResourceTracker::new(client.clone());
            tokio::spawn({
                let tracker = tracker.clone();
                let cancel = cancel.clone();
                async move { tracker.start(cancel).await }
            });
            roledefinition::run(client, tracker).await
        }
        Command::ManageBindDefinitions => binddefinition::run(client).await,
        Command::ManageRoleBindings => {
            let tracker = ResourceTracker::new(client.clone());
            tokio::spawn({
                let tracker = tracker.clone();
                let cancel = cancel.clone();
                async move { tracker.start(cancel).await }
            });
            terminator::run(client, tracker).await
        }
        Command::ManageWebhookAuthorizers => webhookauthorizer::run(client).await,
    };

    result.unwrap();
    panic!("exited unexpectedly");
}

/// Main entrypoint that sets up the environment before running the secondary entrypoint `run`.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Set the panic hook to exit the process with a non-zero exit code
    // when a panic occurs on any thread. This is desired behavior when
    // running in a container, as the metrics server or controller may
    // panic and we always want to restart the container in that case.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // Create a kubernetes client using the default configuration.
    // In-cluster, the kubeconfig will be set by the service account.
    let client: Client = Client::try_default()
        .await
        .expect("Expected a valid KUBECONFIG environment variable.");

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, draining work queues");
        shutdown_cancel.cancel();
    });

    // Run the secondary entrypoint.
    run(client, cancel).await;

    // This is an unreachable branch. The controllers and metrics
    // servers should never exit without a panic.
    panic!("exited prematurely");
}
