//! CLI definitions for the agency binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Agency CLI.
#[derive(Parser)]
#[command(name = "agency")]
#[command(about = "Multi-agent orchestration core")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "agency.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Agent registry administration
    Agents {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Print an agent's discovery card
    Card {
        /// Agent id
        agent_id: String,
    },

    /// List the tools advertised by a configured provider
    Tools {
        /// Provider name
        provider: String,
    },

    /// Validate the configuration file
    Check,
}

#[derive(Subcommand)]
pub(crate) enum AgentAction {
    /// List registered agents
    List {
        /// Filter by skill tag
        #[arg(long)]
        skill: Option<String>,

        /// Filter by lifecycle status (created, active, inactive)
        #[arg(long)]
        status: Option<String>,

        /// Filter by model identifier
        #[arg(long)]
        model: Option<String>,

        /// Free-text search over name, description and skills
        #[arg(long)]
        search: Option<String>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create a new agent
    Create {
        /// Agent name
        #[arg(long)]
        name: String,

        /// Description of the agent's purpose
        #[arg(long, default_value = "")]
        description: String,

        /// Caller-supplied id (a UUID is assigned when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Model identifier (falls back to the configured default)
        #[arg(long)]
        model: Option<String>,

        /// Skill tags (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,

        /// Tool providers the agent may call (repeatable)
        #[arg(long = "provider")]
        providers: Vec<String>,

        /// Instruction text
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Show one agent as JSON
    Show {
        /// Agent id
        agent_id: String,
    },

    /// Update fields of an existing agent
    Update {
        /// Agent id
        agent_id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Replace the skill tags (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,

        /// Replace the tool providers (repeatable)
        #[arg(long = "provider")]
        providers: Vec<String>,
    },

    /// Delete an agent (its id is never reused)
    Delete {
        /// Agent id
        agent_id: String,
    },
}
