//! mvirt-vcd: drive one lifecycle operation for a declared VCD resource.
//!
//! The resource is read from a JSON spec file; its local state lives in a
//! JSON state file that is only rewritten after the operation settled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mvirt_vcd::audit::VcdAuditLogger;
use mvirt_vcd::clients::HttpClient;
use mvirt_vcd::config::ConnectionArgs;
use mvirt_vcd::reconciler::{DiskKind, VdcKind};
use mvirt_vcd::{
    Fields, FileStateStore, ReadOutcome, Reconciler, ResourceKind, UpdateOutcome, VcdContext,
};

/// mvirt VCD adapter
#[derive(Parser, Debug)]
#[command(name = "mvirt-vcd", version, about)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Resource kind
    #[arg(long, value_enum)]
    kind: Kind,

    /// State file for this resource
    #[arg(long)]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Disk,
    Vdc,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the resource described by the spec file
    Create {
        #[arg(long)]
        spec: PathBuf,
    },
    /// Refresh state from the remote object
    Read,
    /// Apply changes from the spec file
    Update {
        #[arg(long)]
        spec: PathBuf,
    },
    /// Delete the resource
    Delete,
    /// Check whether the tracked object still exists
    Exists,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, results to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mvirt_vcd=info,audit=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.connection.vcd_config();
    info!("VCD endpoint: {}", config.endpoint);

    let client = HttpClient::new(&config).context("Failed to build VCD client")?;
    let ctx = VcdContext::new(
        Arc::new(client),
        args.connection.wait_options(),
        Arc::new(VcdAuditLogger::new("mvirt-vcd")),
    )
    .with_defaults(&config);
    let store = FileStateStore::new(&args.state);

    let operation = async {
        match args.kind {
            Kind::Disk => run(Reconciler::new(DiskKind), &ctx, &store, &args.command).await,
            Kind::Vdc => run(Reconciler::new(VdcKind), &ctx, &store, &args.command).await,
        }
    };

    tokio::select! {
        result = operation => result,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, state file left unchanged");
            bail!("interrupted; the remote outcome is unknown, run read to refresh state")
        }
    }
}

async fn run<K>(
    reconciler: Reconciler<K>,
    ctx: &VcdContext,
    store: &FileStateStore,
    command: &Command,
) -> Result<()>
where
    K: ResourceKind,
    K::Remote: Serialize,
{
    let mut state = store
        .load()
        .await
        .with_context(|| format!("Failed to load state from {}", store.path().display()))?;

    match command {
        Command::Create { spec } => {
            if let Some(id) = &state.id {
                bail!("{} '{}' is already tracked in {}", K::KIND, id, store.path().display());
            }
            let spec = load_spec(&reconciler, ctx, spec).await?;
            let locator = reconciler
                .create(ctx, &spec, &mut state)
                .await
                .map_err(settle_hint)?;
            save(store, &state).await?;
            println!("{}", locator);
        }
        Command::Read => {
            match reconciler.read(ctx, &mut state).await? {
                ReadOutcome::Present(remote) => {
                    println!("{}", serde_json::to_string_pretty(&remote)?)
                }
                ReadOutcome::Gone => println!("gone"),
            }
            save(store, &state).await?;
        }
        Command::Update { spec } => {
            let spec = load_spec(&reconciler, ctx, spec).await?;
            let outcome = reconciler
                .update(ctx, &spec, &mut state)
                .await
                .map_err(settle_hint)?;
            match outcome {
                UpdateOutcome::Unchanged => println!("unchanged"),
                UpdateOutcome::Updated(attributes) => {
                    save(store, &state).await?;
                    println!("updated: {}", attributes.join(", "));
                }
                UpdateOutcome::ReplacementRequired(attributes) => {
                    bail!(
                        "changing {} requires replacing the {}; delete and create it again",
                        attributes.join(", "),
                        K::KIND
                    );
                }
            }
        }
        Command::Delete => {
            reconciler
                .delete(ctx, &mut state)
                .await
                .map_err(settle_hint)?;
            save(store, &state).await?;
            println!("deleted");
        }
        Command::Exists => {
            println!("{}", reconciler.exists(ctx, &state).await?);
        }
    }
    Ok(())
}

/// A task whose outcome is unknown must not be resubmitted blindly.
fn settle_hint(err: mvirt_vcd::Error) -> anyhow::Error {
    if err.is_unconfirmed() {
        warn!("Remote task outcome unknown, run read before retrying");
    }
    err.into()
}

async fn load_spec<K: ResourceKind>(
    reconciler: &Reconciler<K>,
    ctx: &VcdContext,
    path: &Path,
) -> Result<K::Spec> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read spec {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse spec {}", path.display()))?;
    let fields = Fields::from_value(K::KIND, value)?;
    Ok(reconciler.kind().spec_from_fields(&fields, ctx)?)
}

async fn save(store: &FileStateStore, state: &mvirt_vcd::ResourceState) -> Result<()> {
    store
        .save(state)
        .await
        .with_context(|| format!("Failed to write state to {}", store.path().display()))
}
