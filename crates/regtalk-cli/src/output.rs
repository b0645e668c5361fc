use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use regtalk_core::executor::{Outcome, RunSummary};
use regtalk_core::protocol::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines and tables
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    summary: &'a RunSummary,
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_outcome(outcome: &Outcome, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{outcome}"),
        OutputFormat::Json => print_json(outcome),
    }
}

pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", summary_line(summary)),
        OutputFormat::Json => print_json(&SummaryOutput { summary }),
    }
}

fn summary_line(summary: &RunSummary) -> String {
    let mut line = format!(
        "{} pass(es): {} read, {} verified",
        summary.passes, summary.reads, summary.verified
    );
    for (count, label) in [
        (summary.mismatches, "mismatched"),
        (summary.timeouts, "timed out"),
        (summary.rejected, "rejected"),
    ] {
        if count > 0 {
            line.push_str(&format!(", {count} {label}"));
        }
    }
    if summary.end == regtalk_core::executor::BatchEnd::Cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ports),
        OutputFormat::Text => {
            if ports.is_empty() {
                println!("no serial ports found");
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "VID:PID", "MANUFACTURER", "PRODUCT"]);
            for port in ports {
                let ids = match (port.vid, port.pid) {
                    (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
                    _ => String::new(),
                };
                table.add_row(vec![
                    port.name.clone(),
                    ids,
                    port.manufacturer.clone().unwrap_or_default(),
                    port.product.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use regtalk_core::executor::BatchEnd;

    #[test]
    fn summary_line_lists_failures_only_when_present() {
        let clean = RunSummary {
            passes: 1,
            reads: 2,
            verified: 1,
            ..Default::default()
        };
        assert_eq!(summary_line(&clean), "1 pass(es): 2 read, 1 verified");

        let cancelled = RunSummary {
            end: BatchEnd::Cancelled,
            passes: 4,
            reads: 4,
            timeouts: 1,
            ..Default::default()
        };
        assert_eq!(
            summary_line(&cancelled),
            "4 pass(es): 4 read, 0 verified, 1 timed out (cancelled)"
        );
    }

    #[test]
    fn outcome_json_is_tagged() {
        let json = serde_json::to_value(Outcome::ReadValue {
            address: 0x10,
            value: 0x20,
        })
        .unwrap();
        assert_eq!(json["outcome"], "read_value");
        assert_eq!(json["address"], 16);
    }
}
