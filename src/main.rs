//! domainwatch CLI entrypoint: loads configuration, opens the store, and
//! dispatches one subcommand through `control::DomainWatch`.

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domainwatch::cli::{Cli, Command};
use domainwatch::config::Config;
use domainwatch::model::{DiffType, SearchMode, SortColumn, SortDirection};
use domainwatch::store::query::BrowseParams;
use domainwatch::DomainWatch;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env();
    let watch = DomainWatch::open(config).await.context("failed to open snapshot store")?;

    match cli.command {
        Command::Harvest { name } => {
            watch.start_harvest(name.clone())?;
            info!(snapshot_name = %name, "harvest started");
        }
        Command::Status => {
            let status = watch.harvest_status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Stop => {
            watch.stop_harvest();
            info!("harvest stop requested");
        }
        Command::List => {
            let snapshots = watch.list_snapshots().await?;
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
        Command::Delete { snapshot_id } => {
            let deleted = watch.delete_snapshot(snapshot_id).await?;
            println!("{{\"deleted\": {deleted}}}");
        }
        Command::Browse {
            snapshot_id,
            search,
            search_mode,
            min_price,
            max_price,
            min_length,
            max_length,
            sort,
            direction,
            limit,
            offset,
        } => {
            let search_mode_parsed = match search_mode.as_str() {
                "exact" => SearchMode::Exact,
                "contains" => SearchMode::Contains,
                _ => SearchMode::Prefix,
            };
            let params = BrowseParams {
                snapshot_id,
                search_mode: search.as_ref().map(|_| search_mode_parsed),
                search_term: search.as_deref(),
                min_price: min_price.as_deref().map(Decimal::from_str).transpose()?,
                max_price: max_price.as_deref().map(Decimal::from_str).transpose()?,
                min_length,
                max_length,
                sort_column: SortColumn::from_str_or_domain(&sort),
                sort_direction: SortDirection::from_str_or_asc(&direction),
                limit,
                offset,
            };
            let result = watch.query_rows(params).await?;
            println!("{}", serde_json::to_string_pretty(&result.rows)?);
            info!(total = result.total_count, elapsed_ms = result.elapsed_ms, "browse complete");
        }
        Command::Diff { snapshot_a, snapshot_b, diff_type, limit, offset } => {
            let diff_type_parsed = match diff_type.as_str() {
                "new" => DiffType::New,
                "deleted" => DiffType::Deleted,
                "changed" => DiffType::Changed,
                _ => DiffType::All,
            };
            let result = watch.query_diff(snapshot_a, snapshot_b, diff_type_parsed, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&result.rows)?);
        }
        Command::History { domain_id } => {
            let result = watch.domain_history(domain_id).await?;
            println!("{}", serde_json::to_string_pretty(&result.rows)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "domainwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
