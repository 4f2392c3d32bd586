//! Console rendering for the operator-facing output.

use chrono::{DateTime, Local};

use drivemon_client::sample::PollSample;
use drivemon_client::sweep::SweepEntry;

/// Render the one-shot check report.
pub fn check_report(sample: &PollSample) -> String {
    let mut lines = vec![
        format!("Drive responding ({})", format_clock(sample.timestamp)),
        format!("  Frequency: {:6.2} Hz", sample.measurement.frequency_hz),
        format!("  Current:   {:6.2} A", sample.measurement.current_a),
        format!("  State:     {}", sample.status.operating_state()),
    ];

    if sample.status.faulted {
        lines.push(format!("  FAULT: {}", sample.status.fault_code));
    } else {
        lines.push("  No active fault".to_string());
    }

    if sample.status.alarmed {
        lines.push("  WARNING: alarm bit set".to_string());
    }

    lines.join("\n")
}

/// Render one monitoring status line (printed over the previous one).
pub fn monitor_line(sample: &PollSample) -> String {
    let mut line = format!(
        "{} | Freq: {:6.2} Hz | Amp: {:5.2} A | State: {}",
        format_clock(sample.timestamp),
        sample.measurement.frequency_hz,
        sample.measurement.current_a,
        sample.status.operating_state()
    );

    if sample.status.faulted && sample.status.fault_code.is_available() {
        line.push_str(&format!(" [{}]", sample.status.fault_code));
    }

    if sample.status.alarmed {
        line.push_str(" [ALARM]");
    }

    line
}

/// Render one register sweep row.
pub fn sweep_line(entry: &SweepEntry) -> String {
    let alarm = if entry.status.alarmed { " [ALARM]" } else { "" };
    format!(
        "register {:>3} -> {:>5}  [{}]{}",
        entry.address,
        entry.value,
        entry.status.operating_state(),
        alarm
    )
}

/// Format a Unix timestamp (milliseconds) as a local wall-clock time.
fn format_clock(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
