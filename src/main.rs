use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use zone_health::equipment::compute_equipment_health;
use zone_health::health::{compute_station_health, zone_health_by_label};
use zone_health::roles::{RoleRuleEngine, RuleSource};
use zone_health::series::Snapshot;
use zone_health::time::TimeRange;
use zone_health::zone_pairs::{build_index, find, normalize_zone_query};
use zone_health::{cli, config};

fn load_snapshot(path: &std::path::Path) -> Result<Snapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse snapshot {}", path.display()))
}

fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,zone_health=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let service = config::ServiceConfig::from_env()?;
    let diagnostics = service.diagnostics()?;
    let engine = RoleRuleEngine::new(RuleSource::from_optional_path(
        args.rules.clone().or_else(|| service.role_rules_path.clone()),
    ));

    let store = load_snapshot(&args.snapshot)?.into_store();
    let index = build_index(&store.catalog(), &engine);

    let end = args
        .end
        .or_else(|| store.latest_timestamp(&args.station))
        .unwrap_or_else(Utc::now);
    let hours = args.hours.unwrap_or(service.window_hours);
    let range = TimeRange::trailing_hours(end, hours).context("invalid reporting window")?;
    tracing::info!(
        station = %args.station,
        start = %range.start,
        end = %range.end,
        zones = index.get(&args.station).map_or(0, |zones| zones.len()),
        "computing health"
    );

    let output = if args.equipment {
        let pairs: Vec<_> = match &args.zone {
            Some(label) => {
                let zone_root = normalize_zone_query(label);
                let pair = find(&index, &args.station, &zone_root)
                    .with_context(|| format!("no zone {zone_root} at station {}", args.station))?;
                vec![pair]
            }
            None => index
                .get(&args.station)
                .map(|zones| zones.values().collect())
                .unwrap_or_default(),
        };
        let mut results = Vec::with_capacity(pairs.len());
        for pair in pairs {
            results.push(compute_equipment_health(
                &store,
                &args.station,
                pair,
                &diagnostics,
                range,
            )?);
        }
        serde_json::to_value(results)?
    } else {
        match &args.zone {
            Some(label) => serde_json::to_value(zone_health_by_label(
                &store,
                &index,
                &args.station,
                label,
                &diagnostics,
                range,
            )?)?,
            None => serde_json::to_value(compute_station_health(
                &store,
                &index,
                &args.station,
                &diagnostics,
                range,
            )?)?,
        }
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}
