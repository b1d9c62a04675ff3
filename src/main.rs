use shop_review_harvester::cli::{Cli, Commands, CrawlArgs};
use shop_review_harvester::logging::init_logging_in_data_dir;
use shop_review_harvester::orchestration::{
    build_harvest, build_harvest_config, run_reset_command, run_summary_command, ConfigError,
    ResetTarget, RunInput, TransportSettings,
};
use shop_review_harvester::StateError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Harvest error: {0}")]
    Harvest(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<Box<dyn std::error::Error>> for MainError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        MainError::Harvest(err.to_string())
    }
}

impl MainError {
    fn exit_code(&self) -> i32 {
        match self {
            MainError::Config(_) => 3,
            _ => 1,
        }
    }
}

async fn run_crawl(args: CrawlArgs) -> Result<(), MainError> {
    let file_input = match &args.input {
        Some(path) => RunInput::from_file(path)?,
        None => RunInput::default(),
    };
    let input = args.overrides().merged_over(file_input);

    // Validation happens before anything touches the data directory.
    let config = build_harvest_config(
        input,
        args.data_dir.clone(),
        TransportSettings {
            user_agent: args.user_agent.clone(),
            timeout_secs: args.timeout,
            same_domain_delay: Duration::from_secs(args.same_domain_delay),
        },
    )?;

    init_logging_in_data_dir(&config.data_dir).map_err(|e| MainError::Logging(e.to_string()))?;

    println!(
        "Harvesting {} shop(s) (quota {}, {} worker(s), {}s timeout)",
        config.seeds.len(),
        config.quota,
        config.workers,
        config.transport.timeout_secs
    );

    let harvest = build_harvest(&config)?;
    let listener = harvest.guard.install();

    let summary = harvest.controller.run().await?;
    listener.abort();

    println!("{}", summary);
    println!("Dataset: {}", config.dataset_path().display());
    if harvest.guard.is_triggered() {
        println!("Interrupted; rerun the same command to resume");
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), MainError> {
    match cli.command {
        Commands::Crawl(args) => run_crawl(args).await?,

        Commands::Summary { data_dir, quota } => run_summary_command(data_dir, quota)?,

        Commands::Reset {
            data_dir,
            shop_url,
            all: _,
        } => {
            let target = match shop_url {
                Some(url) => ResetTarget::Shop(url),
                None => ResetTarget::All,
            };
            run_reset_command(data_dir, target)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
