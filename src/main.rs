use anyhow::Context;
use clap::Parser;
use mezon_multiremote::session::ambient;
use mezon_multiremote::{
    build_registry, launch_registry, AmbientGlobals, MultiremoteContext, ParallelReport, Rebinder,
    SessionDriver, SessionName, SessionRegistry, SimulatedSession, SuiteConfig,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Launch one browser per session and run a smoke flow on all of them in parallel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Suite config (JSON) with one capability profile per session
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of auto-configured sessions when no config is given
    #[arg(short, long, default_value_t = 2)]
    sessions: usize,

    /// URL every session opens
    #[arg(short, long, default_value = "https://mezon.ai")]
    url: String,

    /// Element to read through the ambient `$` accessor
    #[arg(long)]
    selector: Option<String>,

    /// Use simulated sessions instead of launching Chrome
    #[arg(long)]
    dry_run: bool,

    /// Fail instead of warning when the driver slot cannot be rebound
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Serialize)]
struct SmokeResult {
    session: SessionName,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    match run(&args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<bool> {
    let config = match &args.config {
        Some(path) => SuiteConfig::from_file(path).await?,
        None => SuiteConfig::auto(args.sessions)?,
    };

    log::info!(
        "Starting {} session(s){}",
        config.sessions.len(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let registry = if args.dry_run {
        simulated_registry(&config, args)?
    } else {
        launch_registry(&config)
            .await
            .context("Failed to launch sessions")?
    };

    let globals = AmbientGlobals::process();
    if let Some(native) = registry.native() {
        globals.bind_native(Arc::clone(native));
    }

    let rebinder = if args.strict {
        Rebinder::strict()
    } else {
        Rebinder::default()
    };
    let context = MultiremoteContext::setup_with(globals, registry, &rebinder)?;
    for warning in context.warnings() {
        log::warn!("{}", warning);
    }

    let flows: Vec<_> = context
        .registry()
        .names()
        .cloned()
        .map(|name| (name, smoke_flow(&args.url, args.selector.as_deref())))
        .collect();
    let report = context.parallel_report(flows).await;
    log::info!(
        "{} passed, {} failed in {:?}",
        report.passed,
        report.failed,
        report.wall_duration
    );

    println!("{}", finish(context, &report).await?);
    Ok(report.is_success())
}

/// Render the report and close every session, even if rendering fails
async fn finish(
    context: MultiremoteContext<'_>,
    report: &ParallelReport,
) -> anyhow::Result<String> {
    let rendered = serde_json::to_string_pretty(report);
    context.teardown().await?;
    Ok(rendered?)
}

async fn smoke_flow(url: &str, selector: Option<&str>) -> anyhow::Result<SmokeResult> {
    let driver = ambient::driver()?;
    driver.navigate(url).await?;
    let title = driver.title().await?;

    let text = match selector {
        Some(selector) => Some(ambient::element(selector).await?.text().await?),
        None => None,
    };

    Ok(SmokeResult {
        session: driver.session().clone(),
        title,
        text,
    })
}

fn simulated_registry(config: &SuiteConfig, args: &Args) -> anyhow::Result<SessionRegistry> {
    let drivers = config
        .sessions
        .iter()
        .map(|profile| {
            let mut session = SimulatedSession::new(profile.name.clone())
                .with_page(&args.url, &format!("Mezon ({})", profile.name));
            if let Some(selector) = &args.selector {
                session = session.with_element(selector, profile.name.as_str());
            }
            Arc::new(session) as Arc<dyn SessionDriver>
        })
        .collect();

    Ok(build_registry(config.is_multiremote(), drivers)?)
}
