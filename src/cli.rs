use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::orchestration::config::RunInput;

/// Exit codes: 0=success, 2=invalid arguments, 3=configuration error, 1=runtime failure
#[derive(Parser, Debug)]
#[command(name = "review-harvester")]
#[command(about = "Quota-bounded, restart-safe harvester for shop review listings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest reviews for the given shops, resuming from saved progress.
    Crawl(CrawlArgs),

    /// Print per-shop progress from the saved ledger.
    Summary {
        #[arg(short, long, default_value = "./data", help = "Directory containing harvest state")]
        data_dir: PathBuf,

        #[arg(short, long, help = "Quota to report progress against")]
        quota: Option<u64>,
    },

    /// Forget saved progress for one shop, or for all shops.
    Reset {
        #[arg(short, long, default_value = "./data", help = "Directory containing harvest state")]
        data_dir: PathBuf,

        #[arg(long, help = "Shop URL to reset", conflicts_with = "all", required_unless_present = "all")]
        shop_url: Option<String>,

        #[arg(long, help = "Reset every shop")]
        all: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    #[arg(short, long = "shop-url", help = "Shop review listing URL (repeatable)")]
    pub shop_urls: Vec<String>,

    #[arg(short, long, help = "JSON run input (shopUrl, shopUrls, maxRequestsPerCrawl, quota, workers)")]
    pub input: Option<PathBuf>,

    #[arg(short, long, default_value = "./data", help = "Directory for dataset, state and logs")]
    pub data_dir: PathBuf,

    #[arg(short, long, help = "Maximum reviews kept per shop (unbounded when omitted)")]
    pub quota: Option<u64>,

    #[arg(short, long, help = "Maximum page requests in this run")]
    pub max_requests: Option<u64>,

    #[arg(short, long, help = "Pages fetched concurrently")]
    pub workers: Option<usize>,

    #[arg(short, long, default_value = Config::USER_AGENT, help = "User agent string for requests")]
    pub user_agent: String,

    #[arg(short, long, default_value_t = Config::REQUEST_TIMEOUT_SECS, help = "Request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, default_value_t = Config::SAME_DOMAIN_DELAY_SECS, help = "Seconds between requests to one host")]
    pub same_domain_delay: u64,
}

impl CrawlArgs {
    /// Flags that override the JSON input.
    pub fn overrides(&self) -> RunInput {
        RunInput {
            shop_url: None,
            shop_urls: self.shop_urls.clone(),
            max_requests_per_crawl: self.max_requests,
            quota: self.quota,
            workers: self.workers,
        }
    }
}

impl Cli {
    /// On error, clap prints help and exits with code 2.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_with_repeated_shop_urls() {
        let cli = Cli::try_parse_from([
            "review-harvester",
            "crawl",
            "--shop-url",
            "https://obchody.heureka.cz/kaufland-cz/recenze/",
            "--shop-url",
            "https://obchody.heureka.cz/alza-cz/recenze/",
            "--quota",
            "50",
            "--max-requests",
            "10",
            "--workers",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Crawl(args) => {
                assert_eq!(args.shop_urls.len(), 2);
                assert_eq!(args.quota, Some(50));
                assert_eq!(args.data_dir, PathBuf::from("./data"));
                assert_eq!(args.timeout, Config::REQUEST_TIMEOUT_SECS);
                assert_eq!(args.same_domain_delay, 2);
                let overrides = args.overrides();
                assert_eq!(overrides.max_requests_per_crawl, Some(10));
                assert_eq!(overrides.workers, Some(2));
            }
            _ => panic!("Expected Crawl command"),
        }
    }

    #[test]
    fn test_crawl_defaults_leave_input_fields_unset() {
        let cli = Cli::try_parse_from(["review-harvester", "crawl", "--input", "input.json"]).unwrap();
        match cli.command {
            Commands::Crawl(args) => {
                assert_eq!(args.input, Some(PathBuf::from("input.json")));
                assert_eq!(args.overrides(), RunInput::default());
                assert_eq!(args.user_agent, Config::USER_AGENT);
            }
            _ => panic!("Expected Crawl command"),
        }
    }

    #[test]
    fn test_reset_requires_target() {
        let err = Cli::try_parse_from(["review-harvester", "reset"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let conflict = Cli::try_parse_from([
            "review-harvester",
            "reset",
            "--all",
            "--shop-url",
            "https://a.test/",
        ]);
        assert!(conflict.is_err());

        let cli = Cli::try_parse_from(["review-harvester", "reset", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { all: true, .. }));
    }

    #[test]
    fn test_summary_command() {
        let cli = Cli::try_parse_from(["review-harvester", "summary", "-d", "/tmp/h", "-q", "5"]).unwrap();
        match cli.command {
            Commands::Summary { data_dir, quota } => {
                assert_eq!(data_dir, PathBuf::from("/tmp/h"));
                assert_eq!(quota, Some(5));
            }
            _ => panic!("Expected Summary command"),
        }
    }

    #[test]
    fn test_invalid_command() {
        assert!(Cli::try_parse_from(["review-harvester", "invalid-command"]).is_err());
    }

    #[test]
    fn test_help_does_not_panic() {
        let err = Cli::try_parse_from(["review-harvester", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
