//! Agency - multi-agent orchestration core
//!
//! Operational CLI over the registry, gateway and dispatcher. Messaging and
//! activation require a model backend and are reached through the library
//! API by the embedding service; this binary covers administration.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use agency_config::{ConfigLoader, Config};
use agency_core::{AgentRegistry, FileStore};
use agency_dispatch::{DispatchConfig, Dispatcher};
use agency_gateway::ToolGateway;
use agency_protocols::spec::{AgentDraft, AgentQuery, AgentSpecPatch, AgentStatus};
use agency_runtime::{ModelRegistry, RuntimeFactory};

use cli::{AgentAction, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    agency_config::validate(&config)?;

    if let Commands::Check = cli.command {
        println!("configuration ok: {} provider(s)", config.providers.len());
        return Ok(());
    }

    let dispatcher = build_dispatcher(&config).await?;

    match cli.command {
        Commands::Agents { action } => run_agents(&dispatcher, &config, action).await?,
        Commands::Card { agent_id } => {
            let card = dispatcher.agent_card(&agent_id)?;
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        Commands::Tools { provider } => {
            let tools = dispatcher.gateway().list_tools(&provider).await?;
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Commands::Check => unreachable!("handled above"),
    }

    Ok(())
}

async fn build_dispatcher(config: &Config) -> anyhow::Result<Arc<Dispatcher>> {
    let registry_path = PathBuf::from(ConfigLoader::expand_path(&config.registry.path));
    debug!("Opening registry at {:?}", registry_path);

    let store = Arc::new(FileStore::new(registry_path));
    let registry = Arc::new(AgentRegistry::open(store).await?);
    let gateway = Arc::new(ToolGateway::new(config.provider_configs()));

    // Model backends are wired by the embedding service; the CLI only needs
    // the management surface.
    let models = Arc::new(ModelRegistry::new());
    let factory = Arc::new(RuntimeFactory::new(
        models,
        gateway.clone(),
        config.dispatch.max_turns,
    ));

    Ok(Dispatcher::new(
        registry,
        gateway,
        factory,
        DispatchConfig {
            default_model: config.dispatch.default_model.clone(),
            endpoint: config.dispatch.endpoint.clone(),
        },
    ))
}

async fn run_agents(
    dispatcher: &Arc<Dispatcher>,
    config: &Config,
    action: AgentAction,
) -> anyhow::Result<()> {
    match action {
        AgentAction::List {
            skill,
            status,
            model,
            search,
            json,
        } => {
            let mut query = AgentQuery::all();
            if let Some(skill) = skill {
                query = query.with_skill(skill);
            }
            if let Some(status) = status {
                query = query.with_status(parse_status(&status)?);
            }
            if let Some(model) = model {
                query = query.with_model(model);
            }
            if let Some(search) = search {
                query = query.with_search(search);
            }

            let agents = dispatcher.list_agents(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else {
                for agent in &agents {
                    println!(
                        "{:<38} {:<9} {:<20} {}",
                        agent.id, agent.status, agent.model, agent.name
                    );
                }
                println!("{} agent(s)", agents.len());
            }
        }

        AgentAction::Create {
            name,
            description,
            id,
            model,
            skills,
            providers,
            instructions,
        } => {
            for provider in &providers {
                if !config.providers.contains_key(provider) {
                    anyhow::bail!("unknown tool provider: {provider}");
                }
            }
            let mut draft = AgentDraft::new(name, description)
                .with_skills(skills)
                .with_tool_providers(providers);
            draft.id = id;
            draft.model = model;
            draft.instructions = instructions;

            let spec = dispatcher.create_agent(draft).await?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }

        AgentAction::Show { agent_id } => {
            let spec = dispatcher.get_agent(&agent_id)?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }

        AgentAction::Update {
            agent_id,
            name,
            description,
            model,
            skills,
            providers,
        } => {
            let mut patch = AgentSpecPatch::default();
            patch.name = name;
            patch.description = description;
            patch.model = model;
            if !skills.is_empty() {
                patch.skills = Some(skills);
            }
            if !providers.is_empty() {
                patch.tool_providers = Some(providers);
            }

            let spec = dispatcher.update_agent(&agent_id, patch).await?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }

        AgentAction::Delete { agent_id } => {
            dispatcher.delete_agent(&agent_id).await?;
            println!("deleted {agent_id}");
        }
    }
    Ok(())
}

fn parse_status(value: &str) -> anyhow::Result<AgentStatus> {
    match value {
        "created" => Ok(AgentStatus::Created),
        "active" => Ok(AgentStatus::Active),
        "inactive" => Ok(AgentStatus::Inactive),
        other => anyhow::bail!("unknown status '{other}' (expected created, active or inactive)"),
    }
}
