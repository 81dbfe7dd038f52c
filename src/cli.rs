use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "zone-health",
    version,
    about = "Zone and equipment health diagnostics over a telemetry snapshot"
)]
pub struct Args {
    /// JSON snapshot with `catalog` and `series`.
    #[arg(long)]
    pub snapshot: PathBuf,
    #[arg(long)]
    pub station: String,
    /// Zone label ("VAV 1-01"); all zones of the station when omitted.
    #[arg(long)]
    pub zone: Option<String>,
    /// Report fan, cooling and discharge-air health instead of zone health.
    #[arg(long, default_value_t = false)]
    pub equipment: bool,
    /// Window length; defaults to ZONE_HEALTH_WINDOW_HOURS or 24.
    #[arg(long)]
    pub hours: Option<i64>,
    /// Window end (RFC 3339); defaults to the newest sample in the snapshot.
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
    /// Role rule file; overrides ZONE_HEALTH_ROLE_RULES_PATH.
    #[arg(long)]
    pub rules: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}
