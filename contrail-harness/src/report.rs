use std::io;
use std::path::Path;

use contrail_core::metrics::MetricsSnapshot;

/// Render the shutdown report: every anomaly line observed during the run,
/// then the final status block.
pub fn render_report(snapshot: &MetricsSnapshot, anomalies: &[String]) -> String {
    let mut out = String::new();
    for line in anomalies {
        out.push_str(line);
        out.push('\n');
    }
    if !anomalies.is_empty() {
        out.push('\n');
    }
    out.push_str(&snapshot.render());
    out
}

pub fn write_report(
    path: &Path,
    snapshot: &MetricsSnapshot,
    anomalies: &[String],
) -> io::Result<()> {
    std::fs::write(path, render_report(snapshot, anomalies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contrail_core::metrics::Recorder;
    use contrail_core::outcome::Outcome;

    #[test]
    fn test_report_lists_anomalies_before_status() {
        let recorder = Recorder::new();
        recorder.record_outcome(Outcome::Success);
        recorder.note_anomaly(Outcome::CancelNotApplied, "seat 1 still taken".into());
        recorder.record_outcome(Outcome::CancelNotApplied);

        let rendered = render_report(&recorder.snapshot(), &recorder.anomaly_log());
        let anomaly_pos = rendered.find("cancel_not_applied").expect("anomaly line");
        let status_pos = rendered.find("=== status ===").expect("status block");
        assert!(anomaly_pos < status_pos);
    }

    #[test]
    fn test_report_without_anomalies_is_just_the_status_block() {
        let recorder = Recorder::new();
        let rendered = render_report(&recorder.snapshot(), &[]);
        assert!(rendered.starts_with("=== status ==="));
    }
}
