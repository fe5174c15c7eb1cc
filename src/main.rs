use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::env;

mod audit;
mod configuration;
mod diagnostics;
mod import;
mod importer;
mod init;
mod output;
mod scheduler;
mod server;
mod settings;
mod source;
mod status;
mod telemetry;
mod util;
mod xml;

#[derive(Parser)]
#[command(name = "xmlfeed", about = "XML feed importer for orders and items")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    Config(configuration::ConfigCmd),
    Import(import::ImportCmd),
    /// Fetch the feed and report its size and first entries
    Check(diagnostics::ConfigArg),
    /// Inspect the raw feed response and suggest fixes
    Debug(diagnostics::ConfigArg),
    /// Poll the feed until it carries data, then import once
    Aggressive(diagnostics::ConfigArg),
    /// Fetch and parse the feed without importing
    Test(diagnostics::ConfigArg),
    Paste(diagnostics::PasteCmd),
    Log(audit::LogCmd),
    Status(status::StatusCmd),
    Schedule(scheduler::ScheduleCmd),
    Serve(server::ServeCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // logs go to stderr; RUST_LOG and XMLFEED_LOG_FORMAT apply
    telemetry::config::init_tracing();
    let dsn = cli
        .dsn
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("provide --dsn or set DATABASE_URL in .env")?;

    let pool = init::connect(&dsn).await?;
    let settings = settings::Settings::from_env();

    match cli.command {
        Commands::Init(args) => init::run(&pool, args).await?,
        Commands::Config(args) => configuration::run(&pool, args).await?,
        Commands::Import(args) => import::run(&pool, &settings, args).await?,
        Commands::Check(args) => diagnostics::run_check(&pool, &settings, args).await?,
        Commands::Debug(args) => diagnostics::run_debug(&pool, &settings, args).await?,
        Commands::Aggressive(args) => diagnostics::run_aggressive(&pool, &settings, args).await?,
        Commands::Test(args) => diagnostics::run_test(&pool, &settings, args).await?,
        Commands::Paste(args) => diagnostics::run_paste(&pool, &settings, args).await?,
        Commands::Log(args) => audit::run(&pool, args).await?,
        Commands::Status(args) => status::run(&pool, args).await?,
        Commands::Schedule(args) => scheduler::run(&pool, &settings, args).await?,
        Commands::Serve(args) => server::run(&pool, &settings, args).await?,
    }

    Ok(())
}
