//! Startup banner and run summary display.

use std::time::Duration;

use crate::consts::format_number;
use crate::controller::RunSnapshot;

/// Session configuration for display in the startup banner.
pub struct BannerInfo {
    pub delay: Duration,
    pub jitter: Duration,
    pub approval_rate: f64,
    pub failure_rate: f64,
    pub timeout: Option<Duration>,
}

fn format_timeout(timeout: Option<Duration>) -> String {
    match timeout {
        Some(t) => format!("{}s", t.as_secs_f64()),
        None => "none".to_string(),
    }
}

/// Print the startup banner with session info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║          B A T C H C H E C K          ║
   ║      one record at a time, in order   ║
   ╚═══════════════════════════════════════╝

   version   {}
   latency   {}ms (+ up to {}ms)
   approve   {:.1}%
   faults    {:.1}%
   timeout   {}

   type records one per line, then /start. /help lists commands.
"#,
        env!("CARGO_PKG_VERSION"),
        info.delay.as_millis(),
        info.jitter.as_millis(),
        info.approval_rate * 100.0,
        info.failure_rate * 100.0,
        format_timeout(info.timeout),
    );
}

/// Summary lines for a run.
pub fn run_summary(snapshot: &RunSnapshot) -> String {
    if snapshot.total_count == 0 {
        return "no run".to_string();
    }
    format!(
        "{}: {} of {} checked, {} approved, {} declined",
        snapshot.status,
        format_number(snapshot.processed_count as u64),
        format_number(snapshot.total_count as u64),
        format_number(snapshot.approved_count as u64),
        format_number(snapshot.declined_count as u64),
    )
}

/// Print the run summary.
pub fn print_run_summary(snapshot: &RunSnapshot) {
    println!("{}", run_summary(snapshot));
}
