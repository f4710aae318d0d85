use clap::Parser;
use futures::StreamExt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use github_resync::config::Config;
use github_resync::fetch::{ExpireAfter, Fetcher};
use github_resync::report::{self, Outcome, ResourceSummary};
use github_resync::resync::{self, ResourceConfig, ResourceKind, Resyncer};
use github_resync::{GitHubClient, PullRequestState, RepositoryType};

/// github-resync: pull GitHub organizations, repositories and pull requests
/// as a stream of JSON batches, one line per batch.
#[derive(Parser, Debug)]
#[command(name = "github-resync", version, about)]
struct Cli {
    /// Config file (defaults to .github-resync.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only resync these kinds. With --org, defaults to every kind.
    #[arg(short, long, value_enum)]
    kind: Vec<ResourceKind>,

    /// Resync these organizations instead of the configured resources
    #[arg(long = "org")]
    orgs: Vec<String>,

    /// Repository type filter used with --org
    #[arg(long, value_enum, default_value_t = RepositoryType::All)]
    repo_type: RepositoryType,

    /// Pull request state filter used with --org
    #[arg(long, value_enum, default_value_t = PullRequestState::Open)]
    state: PullRequestState,

    /// Write batches (NDJSON) to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the run summary as markdown to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let resources = select_resources(&cli, &config);
    if resources.is_empty() {
        warn!("nothing to resync: no resources configured and no --org given");
        return Ok(());
    }

    let client = GitHubClient::new(&config.client_settings()?)?;
    info!(
        base_url = %client.base_url(),
        budget = client.limiter().budget().max_requests,
        "created GitHub client"
    );
    let mut fetcher = Fetcher::new(client).with_merge_options(config.merge_options());
    if let Some(ttl) = config.cache_ttl() {
        fetcher = fetcher.with_cache_policy(ExpireAfter(ttl));
    }
    let resyncer = Resyncer::new(fetcher);

    let mut sink: Box<dyn Write> = match cli.output.as_deref() {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut summaries = Vec::with_capacity(resources.len());
    for resource in &resources {
        let span = info_span!("resync", kind = %resource.kind());
        let summary = resync_one(&resyncer, resource, &mut sink).instrument(span).await?;
        let cancelled = summary.outcome == Outcome::Cancelled;
        summaries.push(summary);
        if cancelled {
            warn!("interrupted, skipping remaining resources");
            break;
        }
    }
    sink.flush()?;

    let built_report = report::build(summaries);
    report::output(&built_report, cli.report.as_deref())?;
    info!(records = built_report.total_records, success = built_report.success, "done");

    if built_report.success {
        Ok(())
    } else {
        Err("one or more resources did not complete".into())
    }
}

/// Resources from --org flags when given, otherwise from config, filtered by --kind.
fn select_resources(cli: &Cli, config: &Config) -> Vec<ResourceConfig> {
    if !cli.orgs.is_empty() {
        let kinds: &[ResourceKind] = if cli.kind.is_empty() {
            &ResourceKind::ALL
        } else {
            &cli.kind
        };
        return kinds
            .iter()
            .map(|kind| ResourceConfig::from_parts(*kind, cli.orgs.clone(), cli.repo_type, cli.state))
            .collect();
    }

    config
        .resources
        .iter()
        .filter(|resource| cli.kind.is_empty() || cli.kind.contains(&resource.kind()))
        .cloned()
        .collect()
}

/// Drain one resource into `sink`, stopping early on Ctrl-C.
async fn resync_one(
    resyncer: &Resyncer,
    resource: &ResourceConfig,
    sink: &mut dyn Write,
) -> Result<ResourceSummary, Box<dyn std::error::Error>> {
    let kind = resource.kind();
    let started = Instant::now();
    let (mut batches, abort) = resync::cancellable(resyncer.resync(resource));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let mut summary = ResourceSummary {
        kind,
        organizations: resource.organizations().to_vec(),
        batches: 0,
        records: 0,
        elapsed: started.elapsed(),
        outcome: Outcome::Completed,
    };

    while let Some(batch) = batches.next().await {
        match batch {
            Ok(records) => {
                summary.batches += 1;
                summary.records += records.len();
                serde_json::to_writer(
                    &mut *sink,
                    &serde_json::json!({ "kind": kind.as_str(), "records": records }),
                )?;
                sink.write_all(b"\n")?;
            }
            Err(err) => {
                warn!(error = %err, "resync failed");
                summary.outcome = Outcome::Failed(err.to_string());
                break;
            }
        }
    }
    interrupt.abort();

    if batches.is_aborted() {
        summary.outcome = Outcome::Cancelled;
    }
    summary.elapsed = started.elapsed();
    debug!(batches = summary.batches, records = summary.records, outcome = %summary.outcome, "resource finished");
    Ok(summary)
}
