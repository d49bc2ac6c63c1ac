use anyhow::Context;
use clap::Parser;
use navplan_engine::config::ConfigLoader;
use navplan_engine::driver::PageDriver;
use navplan_engine::formatter::format_run_result;
use navplan_engine::planner::{FilePlanner, OpenAiPlanner, Planner};
use navplan_engine::session::{OutputHandlers, Session};
use navplan_h::ChromeDriver;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "navplan", version, about = "Plan and execute a task in a web app")]
struct Args {
    /// What to do, in plain language
    task: String,

    /// App URL (when it starts with http) or login email
    second: Option<String>,

    /// Login email, or password when no URL was given
    third: Option<String>,

    /// Login password
    fourth: Option<String>,

    /// Run a plan from a JSON file instead of asking the model
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Run without a browser window (manual login is impossible)
    #[arg(long)]
    headless: bool,

    /// Directory for per-run screenshot folders
    #[arg(long)]
    screenshots: Option<PathBuf>,

    /// Config file (defaults to ./navplan.yaml, then ~/.navplan/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model used for planning
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
struct Target {
    url: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

fn split_positionals(
    second: Option<String>,
    third: Option<String>,
    fourth: Option<String>,
) -> Target {
    match second {
        Some(url) if url.starts_with("http") => Target {
            url: Some(url),
            email: third,
            password: fourth,
        },
        email => Target {
            url: None,
            email,
            password: third,
        },
    }
}

fn credentials(target: &Target) -> HashMap<String, String> {
    let mut credentials = HashMap::new();
    if let Some(email) = &target.email {
        credentials.insert("email".to_string(), email.clone());
    }
    if let Some(password) = &target.password {
        credentials.insert("password".to_string(), password.clone());
    }
    credentials
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // stdout carries the plan and the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.fourth.is_some() && !args.second.as_deref().is_some_and(|s| s.starts_with("http")) {
        anyhow::bail!("Too many positional arguments: expected <task> [url] [email] [password]");
    }
    let target = split_positionals(args.second, args.third, args.fourth);
    if let Some(url) = &target.url {
        url::Url::parse(url).with_context(|| format!("Invalid app URL '{}'", url))?;
    }

    let mut config = ConfigLoader::load(args.config.as_deref())
        .await
        .context("Failed to load config")?;
    if let Some(dir) = args.screenshots {
        config.artifacts.screenshot_dir = dir;
    }
    if let Some(model) = args.model {
        config.planner.model = model;
    }

    let planner: Box<dyn Planner> = match args.plan {
        Some(path) => Box::new(FilePlanner::new(path)),
        None => Box::new(OpenAiPlanner::from_env(config.planner.clone())?),
    };
    if args.headless {
        tracing::warn!("Headless mode: a login page will time out instead of waiting for you");
    }

    let output = OutputHandlers {
        out: |msg| println!("{}", msg),
        err: |msg| eprintln!("{}", msg),
    };
    let session = Session::new(config, planner, output);

    let mut driver = ChromeDriver::new(!args.headless);
    driver
        .launch()
        .await
        .context("Failed to launch browser")?;

    let outcome = tokio::select! {
        result = session.run_task(
            &mut driver,
            &args.task,
            target.url.as_deref(),
            credentials(&target),
        ) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    if let Err(e) = driver.close().await {
        tracing::warn!("Failed to close browser: {}", e);
    }

    match outcome {
        Some(result) => {
            println!("{}", format_run_result(&result));
            Ok(if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        None => {
            eprintln!("Interrupted.");
            Ok(ExitCode::from(130))
        }
    }
}
