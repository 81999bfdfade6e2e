use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use promptvault_core::{ContentDraft, PageRequest, RoleOrderPolicy, VersionId};
use promptvault_engine::PromptVault;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "promptvault")]
#[command(about = "Versioned prompt store with one production version per node")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite file to use instead of the configured one (`:memory:` allowed)
    #[arg(long, value_name = "PATH")]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List nodes with their version counts
    Nodes(NodesArgs),

    /// List the versions of a node, newest first
    Versions { node: String },

    /// Show one version by id, or by node and ordinal
    Show(TargetArgs),

    /// Create a new version of a node
    Create(CreateArgs),

    /// Make a version the production version of its node
    Promote { id: String },

    /// Show the production version of a node
    Production { node: String },

    /// Delete one version by id, or by node and ordinal
    Delete(TargetArgs),

    /// Delete a node and every version in it
    DeleteNode { node: String },

    /// Count the versions of a node
    Count { node: String },
}

#[derive(Args)]
pub struct NodesArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Defaults to the configured page size
    #[arg(long)]
    pub size: Option<u32>,

    /// Case-insensitive substring of the node name
    #[arg(short, long)]
    pub filter: Option<String>,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Version id, or a node name when --ordinal is given
    pub target: String,

    #[arg(short, long)]
    pub ordinal: Option<u32>,
}

#[derive(Args)]
pub struct CreateArgs {
    pub node: String,

    #[arg(short, long)]
    pub system: String,

    #[arg(short, long)]
    pub user: Option<String>,

    #[arg(short, long)]
    pub assistant: Option<String>,

    #[arg(short, long)]
    pub message: Option<String>,

    /// Give the assistant message order 2 and the user message order 3
    #[arg(long)]
    pub assistant_first: bool,
}

impl Commands {
    /// Run the command and return its JSON result.
    pub fn execute(self, vault: &PromptVault) -> Result<Value> {
        match self {
            Commands::Nodes(args) => {
                let request = match args.size {
                    Some(size) => PageRequest::new(args.page, size)?,
                    None => vault.page(args.page)?,
                };
                to_json(&vault.list_summaries(request, args.filter.as_deref())?)
            }
            Commands::Versions { node } => to_json(&vault.get_versions(&node)?),
            Commands::Show(target) => {
                let version = match target.ordinal {
                    Some(ordinal) => vault.get_version_at(&target.target, ordinal)?,
                    None => vault.get_version(parse_id(&target.target)?)?,
                };
                to_json(&version)
            }
            Commands::Create(args) => {
                let mut draft = ContentDraft::new(args.system);
                draft.user = args.user;
                draft.assistant = args.assistant;
                let version = if args.assistant_first {
                    vault.create_version_with(
                        &args.node,
                        &draft,
                        args.message.as_deref(),
                        RoleOrderPolicy::AssistantFirst,
                    )?
                } else {
                    vault.create_version(&args.node, &draft, args.message.as_deref())?
                };
                to_json(&version)
            }
            Commands::Promote { id } => to_json(&vault.promote(parse_id(&id)?)?),
            Commands::Production { node } => to_json(&vault.get_production(&node)?),
            Commands::Delete(target) => {
                let removed = match target.ordinal {
                    Some(ordinal) => vault.delete_version_at(&target.target, ordinal)?,
                    None => vault.delete_version(parse_id(&target.target)?)?,
                };
                to_json(&removed)
            }
            Commands::DeleteNode { node } => {
                let removed = vault.delete_node(&node)?;
                Ok(json!({ "node_name": node.trim(), "removed": removed }))
            }
            Commands::Count { node } => {
                let count = vault.count_versions(&node)?;
                Ok(json!({ "node_name": node.trim(), "count": count }))
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<VersionId> {
    raw.parse()
        .with_context(|| format!("'{raw}' is not a version id"))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
