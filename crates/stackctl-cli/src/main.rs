mod cmd;
mod output;
mod prompt;

use clap::{Parser, Subcommand};
use cmd::vault::VaultSubcommand;

#[derive(Parser)]
#[command(
    name = "stackctl",
    about = "Provision and operate DigitalOcean Kubernetes stacks through CDKTF and Terraform Cloud",
    version,
    propagate_version = true
)]
struct Cli {
    /// Target environment: dev, stg, prd or all (prompted when omitted)
    #[arg(long, short = 'e', global = true)]
    env: Option<String>,

    /// Application repository for service stacks
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Image tag for service stacks
    #[arg(long, global = true)]
    tag: Option<String>,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the registry and cluster stacks, then sync their outputs
    Setup {
        /// Run `cdktf synth` before deploying
        #[arg(long)]
        synth: bool,
    },

    /// Deploy the application service stack onto an existing cluster
    Deploy {
        /// Run `cdktf synth` before deploying
        #[arg(long)]
        synth: bool,
    },

    /// Tear down stacks in reverse creation order
    Destroy {
        /// Which stacks to remove: cluster or service
        #[arg(long, default_value = "cluster")]
        operation: String,
    },

    /// Show the stacks an operation would touch, in order
    Plan {
        /// cluster or service
        #[arg(long, default_value = "cluster")]
        operation: String,
    },

    /// Show persisted stack outputs
    State,

    /// Manage application secrets stored on the cluster
    Vault {
        #[command(subcommand)]
        subcommand: VaultSubcommand,
    },

    /// Install or remove the Istio service mesh
    Istio {
        /// install or uninstall
        action: String,
    },
}

impl Commands {
    fn orchestrates(&self) -> bool {
        matches!(
            self,
            Commands::Setup { .. }
                | Commands::Deploy { .. }
                | Commands::Destroy { .. }
                | Commands::Istio { .. }
        )
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.command.orchestrates() {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(run(cli)));

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let flags = cmd::Flags {
        env: cli.env,
        repo: cli.repo,
        tag: cli.tag,
        yes: cli.yes,
        json: cli.json,
    };
    match cli.command {
        Commands::Setup { synth } => cmd::stack::setup(flags, synth).await,
        Commands::Deploy { synth } => cmd::stack::deploy(flags, synth).await,
        Commands::Destroy { operation } => cmd::stack::destroy(flags, &operation).await,
        Commands::Plan { operation } => cmd::plan::run(flags, &operation),
        Commands::State => cmd::state::run(flags),
        Commands::Vault { subcommand } => cmd::vault::run(flags, subcommand).await,
        Commands::Istio { action } => cmd::istio::run(flags, &action).await,
    }
}
