// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::collections::HashMap;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, PluginCommands};
use wisp_core::{ChatOptions, DialogueOrchestrator};
use wisp_memory::{MemoryPipeline, MemoryStore, RuleExtractor};
use wisp_model::{MockProvider, ModelProvider};
use wisp_plugins::PluginSupervisor;
use wisp_skills::SkillService;
use wisp_tools::{CapabilityScheduler, WebFetchAbility, WebSearchAbility};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let config =
        wisp_config::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(Commands::ShowConfig) = &cli.command {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }
    if let Some(Commands::ListModels) = &cli.command {
        for entry in wisp_model::catalog::static_catalog() {
            println!("{:<24} {:<10} {}", entry.id, entry.provider, entry.name);
        }
        return Ok(());
    }

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| dirs::data_dir().map(|d| d.join("wisp")))
        .unwrap_or_else(|| PathBuf::from("./wisp-data"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let bus = Arc::new(wisp_bus::EventBus::new(config.bus.capacity));
    bus.start().await;

    let emotion = Arc::new(wisp_emotion::EmotionService::new(
        &data_dir,
        config.emotion.clone(),
        Arc::clone(&bus),
    ));

    let store = Arc::new(
        MemoryStore::open(&data_dir.join("memory.db")).context("failed to open memory store")?,
    );
    let mut memory_pipeline =
        MemoryPipeline::new(Arc::clone(&store), Arc::clone(&bus), &config.memory)
            .with_extractor(Arc::new(RuleExtractor));
    if config.memory.emotion_on_ingest {
        memory_pipeline = memory_pipeline
            .with_emotion_snapshot(Arc::clone(&emotion) as Arc<dyn wisp_memory::EmotionSnapshot>);
    }
    let memory_pipeline = Arc::new(memory_pipeline);
    subscribe_memory_ingestion(&bus, &memory_pipeline);

    let plugins = Arc::new(PluginSupervisor::new(config.plugins.clone(), Arc::clone(&bus)));

    let mut scheduler = CapabilityScheduler::new();
    scheduler.register_builtin(WebFetchAbility);
    scheduler.register_builtin(WebSearchAbility::default());

    // Plugins are only discovered for commands that actually dispatch
    // abilities; `show-config`/`list-models` never reach here.
    if matches!(
        &cli.command,
        Some(Commands::Plugins { .. }) | Some(Commands::Chat { .. }) | None
    ) {
        plugins.load_all().await;
        for (name, abilities) in plugins.all_abilities().await {
            for ability in abilities {
                scheduler.register_external(
                    wisp_tools::AbilitySource::Plugin(name.clone()),
                    ability.name,
                    ability.description,
                    ability.parameters,
                    Arc::clone(&plugins) as Arc<dyn wisp_tools::ExternalRouter>,
                );
            }
        }
    }
    let scheduler = Arc::new(scheduler);

    let skills_dir = data_dir.join("skills");
    let agents_dir = data_dir.join("agents");
    let skills = Arc::new(SkillService::new(&skills_dir, &agents_dir));

    let command = cli.command.unwrap_or(Commands::Chat {
        provider: None,
        no_tools: false,
    });
    let plugins_were_loaded = matches!(
        &command,
        Commands::Plugins { .. } | Commands::Chat { .. }
    );

    let result = match command {
        Commands::Chat { provider, no_tools } => {
            run_chat(
                provider,
                no_tools,
                scheduler,
                bus,
                memory_pipeline,
                skills,
                emotion,
                config,
            )
            .await
        }
        Commands::ListProviders => {
            println!("mock");
            Ok(())
        }
        Commands::Plugins { command } => run_plugins_command(command, &plugins).await,
        Commands::ShowConfig | Commands::ListModels | Commands::Completions { .. } => {
            unreachable!("handled before config load")
        }
    };

    // Spec §4.4 Lifecycle: "unload_all() on supervisor shutdown; all
    // subprocesses must be terminated within a bounded window." Runs on
    // every exit path from a command that may have loaded plugins,
    // including the chat REPL's Ctrl-D path.
    if plugins_were_loaded {
        plugins.unload_all().await;
    }

    result
}

async fn run_plugins_command(
    command: PluginCommands,
    plugins: &Arc<PluginSupervisor>,
) -> anyhow::Result<()> {
    match command {
        PluginCommands::LoadAll => {
            plugins.load_all().await;
            println!("loaded: {}", plugins.loaded_names().await.join(", "));
        }
        PluginCommands::List => {
            for name in plugins.loaded_names().await {
                let healthy = plugins.health(&name).await;
                println!("{name}  healthy={healthy}");
            }
        }
        PluginCommands::Reload { name } => {
            plugins.reload(&name).await?;
            println!("reloaded {name}");
        }
        PluginCommands::Unload { name } => {
            plugins.unload(&name).await?;
            println!("unloaded {name}");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_chat(
    provider_id: Option<String>,
    no_tools: bool,
    scheduler: Arc<CapabilityScheduler>,
    bus: Arc<wisp_bus::EventBus>,
    memory: Arc<MemoryPipeline>,
    skills: Arc<SkillService>,
    emotion: Arc<wisp_emotion::EmotionService>,
    config: wisp_config::Config,
) -> anyhow::Result<()> {
    let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();
    providers.insert("mock".to_string(), Arc::new(MockProvider));
    let default_provider = provider_id.unwrap_or_else(|| "mock".to_string());

    let orchestrator = DialogueOrchestrator::new(
        providers,
        default_provider,
        scheduler,
        bus,
        config.tools.clone(),
        config.session.clone(),
    )
    .with_memory(memory as Arc<dyn wisp_core::MemoryRecall>)
    .with_skills(skills as Arc<dyn wisp_core::SkillRecall>)
    .with_emotion(emotion);

    let session_id = orchestrator.create_session("local-user", None).await;
    println!("wisp chat — session {session_id} (Ctrl-D to exit)");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let opts = ChatOptions {
            use_tools: !no_tools,
            ..ChatOptions::default()
        };
        match orchestrator.chat(&session_id, text, opts).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

/// Connects the dialogue namespace to memory ingestion: every user message
/// and assistant response is recorded as a [`wisp_memory::MemoryRecord`].
/// The bus only hands subscribers a synchronous callback, so ingestion
/// itself runs on a spawned task rather than blocking dispatch.
fn subscribe_memory_ingestion(bus: &Arc<wisp_bus::EventBus>, memory: &Arc<MemoryPipeline>) {
    for (pattern, role) in [
        (wisp_core::DIALOGUE_USER_MESSAGE, "user"),
        (wisp_core::DIALOGUE_ASSISTANT_RESPONSE, "assistant"),
    ] {
        let memory = Arc::clone(memory);
        bus.subscribe(pattern, move |event| {
            let memory = Arc::clone(&memory);
            let session_id = event
                .data
                .get("session_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let content = event
                .data
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            tokio::spawn(async move {
                if let Err(e) = memory.ingest(session_id, role, content, Default::default()).await {
                    tracing::warn!(error = %e, "memory ingestion failed");
                }
            });
        });
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}
