use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serp_counter::config::EngineSettings;
use serp_counter::controller::RefreshController;
use serp_counter::dom::Page;
use serp_counter::emulation::MobileEmulation;
use serp_counter::rules::BADGE_URL_ATTR;
use serp_counter::scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "serp-counter", about = "Rank-number badges for saved search result pages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Number the organic results of a saved results page
    Scan {
        /// Saved HTML of the results page
        file: PathBuf,

        /// Address the page was loaded from
        #[arg(long)]
        url: String,

        #[arg(long, default_value_t = serp_counter::dom::DEFAULT_VIEWPORT_WIDTH)]
        viewport: u32,

        #[arg(long)]
        user_agent: Option<String>,

        /// Write the annotated page here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the mobile user-agent header rule update as JSON
    Rule {
        #[arg(long)]
        disable: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Bridge log crate -> tracing (so log::info! etc. work)
    tracing_log::LogTracer::init()?;

    match Cli::parse().command {
        Command::Scan {
            file,
            url,
            viewport,
            user_agent,
            output,
        } => scan(file, &url, viewport, user_agent, output).await,
        Command::Rule { disable } => {
            let emulation = MobileEmulation::from_config(!disable);
            println!("{}", serde_json::to_string_pretty(&emulation.rule_update())?);
            Ok(())
        }
    }
}

async fn scan(
    file: PathBuf,
    url: &str,
    viewport: u32,
    user_agent: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let markup = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut page = Page::parse(&markup, url).context("Failed to load results page")?;
    page.set_viewport_width(viewport);
    if let Some(user_agent) = user_agent {
        page.set_user_agent(&user_agent);
    }

    let controller = RefreshController::new(page, EngineSettings::from_config())
        .context("Failed to build classification rules")?;

    // A saved page never changes: run the document-ready pass and stop.
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    drop(tx);
    let report = Scheduler::new(&controller).run(rx).await;
    log::info!("scheduler report: {report:?}");

    {
        let page = controller.page();
        for badge in page.select(&controller.rules().badge) {
            println!(
                "{}\t{}",
                page.text(badge).trim(),
                page.attr(badge, BADGE_URL_ATTR).unwrap_or("-")
            );
        }
    }

    if let Some(output) = output {
        std::fs::write(&output, controller.page().to_html())
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }
    Ok(())
}
