use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "mailtally",
    version,
    about = "Fetch mailbox sender metadata and report top senders"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the KEY=VALUE config file
    #[arg(long, global = true, env = "MAILTALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Log raw responses and other diagnostics
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch messages page by page and write one JSON file per batch
    Fetch(FetchArgs),
    /// Count senders across a directory of batch files
    Report(ReportArgs),
}

#[derive(Debug, Args)]
struct FetchArgs {
    /// Base name for batch files
    #[arg(long, default_value = "emails_batch")]
    output: String,
    /// Parent directory for the per-run output directory
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Number of records requested per page
    #[arg(
        long,
        alias = "batch_size",
        default_value_t = mailtally::fetch::DEFAULT_BATCH_SIZE as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    batch_size: u64,
    /// Total number of records to process
    #[arg(long, alias = "max_records", default_value_t = mailtally::fetch::DEFAULT_MAX_RECORDS)]
    max_records: usize,
    /// Delay between page requests in milliseconds
    #[arg(long, default_value_t = mailtally::fetch::DEFAULT_DELAY_MS)]
    delay_ms: u64,
    /// Per-request timeout in seconds (none by default)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Only check that the token can read the mailbox
    #[arg(long, alias = "test_permissions", default_value_t = false)]
    test_permissions: bool,
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Directory containing the batch JSON files
    #[arg(long, alias = "input_dir")]
    input_dir: PathBuf,
    /// Number of top senders to display
    #[arg(long, alias = "top_n", default_value_t = 10)]
    top_n: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        tracing::Level::DEBUG
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

    commands::dispatch(cli).await
}

mod commands {
    use std::time::Duration;

    use anyhow::{Context, Result};
    use chrono::Utc;
    use tracing::{debug, info};

    use mailtally::auth::acquire_token;
    use mailtally::batch::BatchWriter;
    use mailtally::config::{default_config_path, Config};
    use mailtally::fetch::{fetch_all, FetchOptions};
    use mailtally::graph::{build_http_client, GraphClient};
    use mailtally::output;
    use mailtally::permissions::test_permissions;
    use mailtally::report::build_report;

    use super::{Cli, Commands, FetchArgs, ReportArgs};

    pub async fn dispatch(cli: Cli) -> Result<()> {
        match cli.command {
            Commands::Fetch(args) => handle_fetch(args, cli.config).await,
            Commands::Report(args) => handle_report(args),
        }
    }

    async fn handle_fetch(args: FetchArgs, config_path: Option<std::path::PathBuf>) -> Result<()> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let config = Config::load(&config_path)
            .with_context(|| format!("load config from {}", config_path.display()))?;
        debug!("loaded config: {:?}", config);

        let http = build_http_client(args.timeout_secs.map(Duration::from_secs))?;
        let token = acquire_token(&http, &config).await?;
        info!("token acquired (expires_in={:?})", token.expires_in);
        let target_user = config.target_user.clone();
        let client = GraphClient::new(http, config, token);

        if args.test_permissions {
            let check = test_permissions(&client).await?;
            println!("{}", output::format_permission_check(&target_user, &check));
            return Ok(());
        }

        let options = FetchOptions {
            batch_size: args.batch_size as usize,
            max_records: args.max_records,
            delay: Duration::from_millis(args.delay_ms),
        };
        let mut writer = BatchWriter::new(&args.output_dir, &args.output, Utc::now());
        let first_url = client.messages_url(options.batch_size)?;

        let report = fetch_all(&client, &first_url, &options, &mut writer).await?;
        print!("{}", output::format_fetch_summary(&report));
        Ok(())
    }

    fn handle_report(args: ReportArgs) -> Result<()> {
        let report = build_report(&args.input_dir, args.top_n)
            .with_context(|| format!("build sender report for {}", args.input_dir.display()))?;
        print!("{}", output::format_report(&report));
        Ok(())
    }
}
