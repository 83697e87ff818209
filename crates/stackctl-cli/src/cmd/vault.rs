use super::{Context, Flags};
use crate::output::{print_json, print_table};
use crate::prompt;
use anyhow::Context as _;
use clap::Subcommand;
use stackctl_core::vault::{parse_env_file, secret_name, Vault};
use stackctl_core::StackError;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Subcommand tree
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum VaultSubcommand {
    /// Create the environment's secret with a default PORT entry
    Init,
    /// Set one key
    Set {
        #[arg(short = 'k', long)]
        key: Option<String>,
        #[arg(short = 'v', long)]
        value: Option<String>,
    },
    /// Set every KEY=VALUE pair from a dotenv-style file
    Bulk {
        #[arg(long)]
        file: PathBuf,
    },
    /// List keys and decoded values
    Ls,
    /// Remove one key
    Rm {
        #[arg(short = 'k', long)]
        key: Option<String>,
    },
    /// Delete the whole secret
    Destroy,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required(flag: &str, value: Option<String>) -> anyhow::Result<String> {
    value.ok_or_else(|| StackError::Usage(format!("missing required --{flag}")).into())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run(flags: Flags, subcommand: VaultSubcommand) -> anyhow::Result<()> {
    let ctx = Context::load(flags, false)?;
    let env = ctx.env()?;
    let name = secret_name(env.as_str(), ctx.identity.key());

    // Validate arguments before touching the cluster.
    let pending = match subcommand {
        VaultSubcommand::Set { key, value } => {
            let (key, value) = (required("key", key)?, required("value", value)?);
            prompt::confirm(&format!("Set {key} in secret {name}?"), ctx.yes)?;
            Pending::Set(key, value)
        }
        VaultSubcommand::Bulk { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let pairs = parse_env_file(&content)?;
            prompt::confirm(
                &format!("Set {} key(s) from {} in secret {name}?", pairs.len(), file.display()),
                ctx.yes,
            )?;
            Pending::Bulk(pairs)
        }
        VaultSubcommand::Rm { key } => {
            let key = required("key", key)?;
            prompt::confirm(&format!("Remove {key} from secret {name}?"), ctx.yes)?;
            Pending::Rm(key)
        }
        VaultSubcommand::Destroy => {
            prompt::confirm(&format!("Delete secret {name}?"), ctx.yes)?;
            Pending::Destroy
        }
        VaultSubcommand::Init => Pending::Init,
        VaultSubcommand::Ls => Pending::Ls,
    };

    let vault = Vault::new(ctx.connect().await?, name);
    match pending {
        Pending::Init => {
            vault.init().await?;
            println!("Created secret {}", vault.name());
        }
        Pending::Set(key, value) => {
            vault.set(&key, &value).await?;
            println!("Set {key} in {}", vault.name());
        }
        Pending::Bulk(pairs) => {
            vault.set_many(&pairs).await?;
            println!("Set {} key(s) in {}", pairs.len(), vault.name());
        }
        Pending::Ls => {
            let entries = vault.list().await?;
            if ctx.json {
                return print_json(&entries);
            }
            let rows = entries.into_iter().map(|(k, v)| vec![k, v]).collect();
            print_table(&["KEY", "VALUE"], rows);
        }
        Pending::Rm(key) => {
            vault.remove(&key).await?;
            println!("Removed {key} from {}", vault.name());
        }
        Pending::Destroy => {
            vault.destroy().await?;
            println!("Deleted secret {}", vault.name());
        }
    }
    Ok(())
}

enum Pending {
    Init,
    Set(String, String),
    Bulk(Vec<(String, String)>),
    Ls,
    Rm(String),
    Destroy,
}
