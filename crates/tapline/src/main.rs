use anyhow::{Context, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tapline_common::plan::parse_plan;
use tapline_common::{AppIdentity, Plan};
use tapline_engine::config::{ConfigLoader, TaplineConfig};
use tapline_engine::planner::{
    FallbackPlanner, HttpPlanner, Planner, identity_or_default, plan_or_fallback,
};
use tapline_engine::runner::{RunSpec, default_run_id, run_all};
use tapline_engine::transport::McpHttpTransport;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tapline", version, about = "Intent-driven mobile UI test runner")]
struct Cli {
    /// Config file (defaults to ./tapline.yaml, then ~/.tapline/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan from requirements and execute on every device
    Run(RunArgs),
    /// Print the plan and app identity the planner produces
    Plan(RequirementsArgs),
}

#[derive(ClapArgs)]
struct RequirementsArgs {
    /// File holding the free-text requirements
    #[arg(long, conflicts_with = "text")]
    requirements: Option<PathBuf>,

    /// Requirements given inline
    #[arg(long)]
    text: Option<String>,
}

#[derive(ClapArgs)]
struct RunArgs {
    #[command(flatten)]
    input: RequirementsArgs,

    /// Device serial to run on (repeatable); replaces configured devices
    #[arg(long = "device")]
    devices: Vec<String>,

    /// Automation server MCP endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Name of the run directory
    #[arg(long)]
    run_id: Option<String>,

    /// Pre-authored plan (JSON); skips the planner
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Package of the app under test; overrides the planner's guess
    #[arg(long)]
    app_package: Option<String>,

    /// Launch activity of the app under test
    #[arg(long)]
    app_activity: Option<String>,

    /// Root directory for run artifacts
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries the run summary.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };

    match cli.command {
        Command::Run(args) => run(&mut config, args).await,
        Command::Plan(args) => plan(&config, args).await,
    }
}

async fn read_requirements(args: &RequirementsArgs) -> anyhow::Result<String> {
    match (&args.requirements, &args.text) {
        (Some(path), _) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        (None, Some(text)) => Ok(text.clone()),
        (None, None) => Ok(String::new()),
    }
}

fn build_planner(config: &TaplineConfig) -> anyhow::Result<Box<dyn Planner>> {
    let planner: Box<dyn Planner> = match HttpPlanner::from_config(&config.planner)? {
        Some(planner) => Box::new(planner),
        None => {
            info!("No planner endpoint configured, using fallback planner");
            Box::new(FallbackPlanner::new())
        }
    };
    Ok(planner)
}

async fn load_plan(path: &Path) -> anyhow::Result<Plan> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    match parse_plan(&raw) {
        Some(plan) => Ok(plan),
        None => bail!("{} does not contain a usable plan", path.display()),
    }
}

async fn run(config: &mut TaplineConfig, args: RunArgs) -> anyhow::Result<ExitCode> {
    if let Some(endpoint) = args.endpoint {
        config.server.endpoint = endpoint;
    }
    if !args.devices.is_empty() {
        config.devices = args.devices;
    }
    if let Some(out) = args.out {
        config.output.root_dir = out;
    }
    if config.devices.is_empty() {
        bail!("no devices given; pass --device or list them under `devices` in the config");
    }

    let requirements = read_requirements(&args.input).await?;
    let planner = build_planner(config)?;

    let plan = match &args.plan {
        Some(path) => load_plan(path).await?,
        None => plan_or_fallback(planner.as_ref(), &requirements).await,
    };
    let mut app: AppIdentity = identity_or_default(planner.as_ref(), &requirements).await;
    if let Some(package) = args.app_package {
        app.app_package = package;
    }
    if let Some(activity) = args.app_activity {
        app.app_activity = activity;
    }

    let config: &TaplineConfig = config;
    let spec = RunSpec {
        run_id: args.run_id.unwrap_or_else(default_run_id),
        requirements: &requirements,
        plan: &plan,
        app: &app,
        planner: planner.as_ref(),
        config,
    };
    let endpoint = config.server.endpoint.clone();
    let report = run_all(&spec, |_| McpHttpTransport::new(&endpoint)).await?;

    for device in &report.devices {
        println!("{}", device.status_line());
    }
    println!("Overall: {}", if report.passed { "PASS" } else { "FAIL" });
    println!("Artifacts: {}", report.run_dir.display());

    Ok(if report.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn plan(config: &TaplineConfig, args: RequirementsArgs) -> anyhow::Result<ExitCode> {
    let requirements = read_requirements(&args).await?;
    let planner = build_planner(config)?;
    let plan = plan_or_fallback(planner.as_ref(), &requirements).await;
    let app = identity_or_default(planner.as_ref(), &requirements).await;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    println!("{}", serde_json::to_string_pretty(&app)?);
    Ok(ExitCode::SUCCESS)
}
