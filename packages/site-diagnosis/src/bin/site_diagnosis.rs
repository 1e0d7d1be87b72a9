//! CLI for diagnosing websites.
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use site_diagnosis::{Config, MemorySimilarityStore, SimilarityStore, SiteAnalyzer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "site-diagnosis")]
#[command(about = "Scrape a website, extract key facts with an LLM, and find similar sites")]
struct Cli {
    /// Only read the homepage, without following its links
    #[arg(long, global = true)]
    no_links: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the structured diagnosis of a site
    Diagnose {
        url: String,
        /// Print markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },

    /// Compute the embedding of a site
    Embed { url: String },

    /// Index reference sites, then analyze a site against them
    Compare {
        url: String,
        #[arg(long = "reference", required = true)]
        references: Vec<String>,
    },
}

#[derive(Serialize)]
struct EmbeddingOutput<'a> {
    url: &'a str,
    dimension: usize,
    embedding: &'a [f32],
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,site_diagnosis=debug,html5ever=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let analyzer = SiteAnalyzer::from_config(&config)
        .context("Failed to build analyzer")?
        .with_hyperlinks(!cli.no_links);

    match cli.command {
        Commands::Diagnose { url, markdown } => cmd_diagnose(&analyzer, &url, markdown).await,
        Commands::Embed { url } => cmd_embed(&analyzer, &url).await,
        Commands::Compare { url, references } => cmd_compare(analyzer, &url, &references).await,
    }
}

async fn cmd_diagnose(analyzer: &SiteAnalyzer, url: &str, markdown: bool) -> Result<()> {
    let site = analyzer.parse(url).await;
    let diagnosis = analyzer
        .diagnose(&site)
        .await
        .with_context(|| format!("Failed to diagnose {}", url))?;

    if markdown {
        print!("{}", diagnosis.to_markdown());
        Ok(())
    } else {
        output(&diagnosis)
    }
}

async fn cmd_embed(analyzer: &SiteAnalyzer, url: &str) -> Result<()> {
    let site = analyzer.parse(url).await;
    let embedding = analyzer
        .embed(&site)
        .await
        .with_context(|| format!("Failed to embed {}", url))?;

    output(&EmbeddingOutput {
        url: site.url().as_str(),
        dimension: embedding.dimension(),
        embedding: embedding.as_slice(),
    })
}

async fn cmd_compare(analyzer: SiteAnalyzer, url: &str, references: &[String]) -> Result<()> {
    let store = Arc::new(MemorySimilarityStore::new());

    for reference in references {
        analyzer
            .index_into(store.as_ref(), reference.as_str())
            .await
            .with_context(|| format!("Failed to index {}", reference))?;
    }
    tracing::info!(indexed = store.len().await?, "Reference sites indexed");

    let report = analyzer
        .with_store(store)
        .analyze(url)
        .await
        .with_context(|| format!("Failed to analyze {}", url))?;

    output(&report)
}
