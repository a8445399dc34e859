//! Persistent report storage — `~/.contrafuzz/reports/`
//!
//! Every `contrafuzz fuzz` run is saved regardless of `--output` mode.
//! Directory layout: `{host_port}_{timestamp}/` with the config snapshot,
//! the run summary, and the clustered failure report.

use std::path::PathBuf;
use std::time::SystemTime;

use contrafuzz_core::Config;
use contrafuzz_runner::RunOutcome;

/// Everything needed to persist one fuzz session.
pub struct ReportData<'a> {
    pub config: &'a Config,
    pub outcome: &'a RunOutcome,
    pub exit_code: i32,
    pub duration_secs: f64,
}

/// Save a run to `~/.contrafuzz/reports/{host_port}_{timestamp}/`.
///
/// Returns the report directory path on success.
pub fn save_report(data: &ReportData) -> Result<PathBuf, std::io::Error> {
    let base = report_base_dir()?;
    let dir_name = build_dir_name(&data.config.base_url);
    let report_dir = base.join(&dir_name);
    std::fs::create_dir_all(&report_dir)?;

    // config.toml — snapshot of the config used
    let config_toml =
        toml::to_string_pretty(data.config).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(report_dir.join("config.toml"), config_toml)?;

    // summary.json — counters + metadata
    let stats = &data.outcome.stats;
    let summary = serde_json::json!({
        "exit_code": data.exit_code,
        "stats": stats,
        "meta": {
            "timestamp": timestamp_iso(),
            "duration_secs": data.duration_secs,
            "base_url": data.config.base_url,
            "spec": data.config.spec.display().to_string(),
            "total_tests": stats.total(),
        },
    });
    std::fs::write(
        report_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary).unwrap_or_default(),
    )?;

    // clusters.json — the grouped failure report (only if present)
    if !data.outcome.report.is_empty() {
        std::fs::write(
            report_dir.join("clusters.json"),
            serde_json::to_string_pretty(&data.outcome.report).unwrap_or_default(),
        )?;
    }

    // tests.json — every retained test summary, for drill-down
    std::fs::write(
        report_dir.join("tests.json"),
        serde_json::to_string_pretty(&data.outcome.summaries).unwrap_or_default(),
    )?;

    Ok(report_dir)
}

fn report_base_dir() -> Result<PathBuf, std::io::Error> {
    let home = std::env::var("HOME")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".contrafuzz").join("reports"))
}

/// `{host_port}_{timestamp}` e.g. `localhost_8080_20260806T193000`
fn build_dir_name(base_url: &str) -> String {
    format!("{}_{}", extract_host_port(base_url), timestamp_compact())
}

/// `"http://localhost:8080/path"` → `"localhost_8080"`
fn extract_host_port(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .replace(':', "_")
}

/// `"20260806T193000"` — filesystem-safe compact timestamp.
fn timestamp_compact() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}{mo:02}{d:02}T{h:02}{mi:02}{s:02}")
}

/// `"2026-08-06T19:30:00Z"` — ISO 8601 for JSON.
fn timestamp_iso() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

/// Current UTC date-time from epoch. No external crate needed.
fn utc_now() -> (i32, u32, u32, u32, u32, u32) {
    let epoch_secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let days = (epoch_secs / 86400) as i64;
    let tod = epoch_secs % 86400;
    let (y, m, d) = civil_from_days(days);
    (
        y,
        m,
        d,
        (tod / 3600) as u32,
        ((tod % 3600) / 60) as u32,
        (tod % 60) as u32,
    )
}

/// Howard Hinnant's `civil_from_days` — epoch days → (year, month, day).
///
/// Reference: <https://howardhinnant.github.io/date_algorithms.html#civil_from_days>
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
