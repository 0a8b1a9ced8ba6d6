use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use common::{
    storage::store::StorageManager,
    utils::{
        config::{get_config, AppConfig},
        embedding::EmbeddingProvider,
    },
};
use ingestion_pipeline::{CsvIngestionPipeline, ProgressSink};
use retrieval_pipeline::{
    default_analysis_tasks, run_analysis, Agent, AgentRole, AgentTuning, CompletionModel,
    IndexGateway, OpenAiCompletion,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "procura",
    about = "Procurement analytics over an embedded knowledge base"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a procurement CSV into the knowledge base
    Ingest {
        path: PathBuf,
        /// Object name to store the upload under; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Run the full six-agent analysis batch
    Analyze,
    /// Ask one role-bound agent a single question
    Query { role: String, question: String },
    /// Manage uploaded files and their indexed rows
    Files {
        #[command(subcommand)]
        command: FilesCommand,
    },
}

#[derive(Subcommand)]
enum FilesCommand {
    List,
    Delete { name: String },
}

struct AppContext {
    config: AppConfig,
    storage: StorageManager,
    gateway: IndexGateway,
    model: Arc<dyn CompletionModel>,
}

impl AppContext {
    async fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let openai_client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));

        let embedding_provider = Arc::new(EmbeddingProvider::from_config(&config, openai_client));
        info!(
            embedding_backend = embedding_provider.backend_label(),
            embedding_dimension = embedding_provider.dimension(),
            "Embedding provider initialized"
        );

        let storage = StorageManager::new(&config).await?;
        let gateway = IndexGateway::new(config.clone(), embedding_provider);
        let model: Arc<dyn CompletionModel> = Arc::new(OpenAiCompletion::from_config(&config)?);

        Ok(Self {
            config,
            storage,
            gateway,
            model,
        })
    }

    fn tuning(&self) -> AgentTuning {
        AgentTuning {
            context_budget_chars: self.config.llm_context_window_chars,
            ..AgentTuning::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;
    let context = AppContext::from_config(config).await?;

    match cli.command {
        Command::Ingest { path, name } => ingest(&context, &path, name).await,
        Command::Analyze => analyze(&context).await,
        Command::Query { role, question } => query(&context, &role, &question).await,
        Command::Files { command } => files(&context, command).await,
    }
}

async fn ingest(
    context: &AppContext,
    path: &Path,
    name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or("path has no file name")?,
    };
    let raw = tokio::fs::read(path).await?;

    let index = context.gateway.index().await?;
    let pipeline = CsvIngestionPipeline::new(context.storage.clone(), index);

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = receiver.recv().await {
            info!(fraction = update.fraction, "{}", update.label);
        }
    });

    let sink = ProgressSink::new(sender);
    let outcome = pipeline.process(Bytes::from(raw), &file_name, &sink).await?;
    drop(sink);
    printer.await?;

    println!("{}", outcome.message);
    if outcome.success {
        Ok(())
    } else {
        Err(outcome.message.into())
    }
}

async fn analyze(context: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let index = context.gateway.index().await?;
    let tasks = default_analysis_tasks(&index, &context.model, context.tuning());

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = receiver.recv().await {
            info!(completed = update.completed, total = update.total, "{}", update.label);
        }
    });

    let outcome = run_analysis(tasks, Some(sender)).await;
    printer.await?;

    for (key, report) in &outcome.reports {
        let role_name = AgentRole::by_key(key).map_or(key.as_str(), |role| role.name);
        println!("## {role_name}\n{report}\n");
    }
    if let Some(summary) = outcome.executive_summary() {
        println!("## Executive Summary\n{summary}");
    }

    if outcome.is_partial() {
        Err(format!("analysis finished with failed tasks: {}", outcome.failed.join(", ")).into())
    } else {
        Ok(())
    }
}

async fn query(
    context: &AppContext,
    role_key: &str,
    question: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let role = AgentRole::by_key(role_key)
        .ok_or_else(|| format!("unknown agent role '{role_key}'"))?;
    let index = context.gateway.index().await?;

    let agent = Agent::new(*role, index, Arc::clone(&context.model)).with_tuning(context.tuning());
    let answer = agent.run(question).await?;

    println!("{answer}");
    Ok(())
}

async fn files(
    context: &AppContext,
    command: FilesCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        FilesCommand::List => {
            for name in context.storage.list().await? {
                println!("{name}");
            }
            Ok(())
        }
        FilesCommand::Delete { name } => {
            // Indexed rows go first so a failed blob delete never strands
            // unsearchable vectors behind a missing file.
            let index = context.gateway.index().await?;
            index.delete_by_source(&name).await?;

            if context.storage.delete(&name).await? {
                println!("Deleted {name} and its indexed rows.");
            } else {
                println!("No stored file named {name}; removed any indexed rows.");
            }
            Ok(())
        }
    }
}
