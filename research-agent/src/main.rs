use clap::Parser;
use research_agent::{
    build_llm_client, resume_agent, run_agent, CheckpointStore, HttpPageFetcher, LlmProvider,
    ResearchConfig, ResearchError, ResearchPipeline, SqliteCheckpointStore, TavilyClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "research-agent",
    about = "Research a topic on the web and write a markdown report"
)]
struct Cli {
    /// Topic to research
    #[arg(required_unless_present = "resume")]
    topic: Option<String>,

    /// Where to write the final report
    #[arg(short, long, default_value = "research_report.md")]
    output: PathBuf,

    /// LLM provider (overrides LLM_PROVIDER)
    #[arg(long, value_enum)]
    provider: Option<LlmProvider>,

    /// Model name (overrides LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// SQLite file used to checkpoint runs
    #[arg(long, env = "RESEARCH_CHECKPOINT_DB")]
    checkpoint_db: Option<PathBuf>,

    /// Resume a checkpointed run instead of starting a new one
    #[arg(long, requires = "checkpoint_db", conflicts_with = "topic")]
    resume: Option<Uuid>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ResearchConfig::from_env()?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(model) = cli.model {
        config.model = Some(model);
    }

    info!(
        "Using {:?} model {} for research",
        config.provider,
        config.model_name()
    );

    let llm = build_llm_client(&config)?;
    let search = Arc::new(TavilyClient::from_config(&config)?);
    let fetcher = Arc::new(HttpPageFetcher::new(&config.fetch)?);

    let mut builder =
        ResearchPipeline::builder(llm, search, fetcher).fetch_config(config.fetch.clone());
    if let Some(path) = &cli.checkpoint_db {
        let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::open(path).await?);
        builder = builder.checkpoint_store(store);
    }
    let pipeline = builder.build();

    let result = match (cli.resume, cli.topic) {
        (Some(run_id), _) => resume_agent(&pipeline, run_id, &cli.output).await,
        (None, Some(topic)) => run_agent(&pipeline, Uuid::new_v4(), &topic, &cli.output).await,
        (None, None) => Err(ResearchError::InvalidConfig(
            "a topic is required unless --resume is given".to_string(),
        )),
    };

    if let Err(e) = result {
        error!("Research run failed: {}", e);
        return Err(e.into());
    }

    println!("Report saved to {}", cli.output.display());
    Ok(())
}
