use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use liftctl_engine::{AccessState, BatchSummary, CommandAck, DeviceStatus, EngineEvent, Severity};
use liftctl_frame::hex_dump;
use liftctl_macro::{BatchJob, ValidationErrors};
use liftctl_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn access_text(access: Option<AccessState>) -> String {
    match access {
        Some(AccessState::Known(channel)) => channel.to_string(),
        Some(AccessState::Unknown(raw)) => format!("unknown (0x{raw:02X})"),
        None => "-".to_string(),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    port: &'a str,
    panel_locked: bool,
    status: &'a DeviceStatus,
}

pub fn print_status(port: &str, status: &DeviceStatus, panel_locked: bool, format: OutputFormat) {
    let rows = [
        ("switch", or_dash(status.switch)),
        ("access channel", access_text(status.access_channel)),
        ("max channel", or_dash(status.max_channel)),
        ("channel", or_dash(status.channel)),
        ("action", or_dash(status.action)),
        ("A/F mode", or_dash(status.af_mode)),
    ];
    match format {
        OutputFormat::Json => print_json(&StatusOutput {
            port,
            panel_locked,
            status,
        }),
        OutputFormat::Table => {
            let mut table = table(vec!["FIELD", "VALUE"]);
            for (field, value) in rows {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = rows
                .iter()
                .map(|(field, value)| format!("{}={value}", field.replace(' ', "_")))
                .collect();
            println!("port={port} {}", fields.join(" "));
        }
    }
}

#[derive(Serialize)]
struct AckOutput<'a> {
    label: &'a str,
    attempts: u32,
    response: String,
}

pub fn print_ack(ack: &CommandAck, format: OutputFormat) {
    let response = hex_dump(&ack.response.encode(true));
    match format {
        OutputFormat::Json => print_json(&AckOutput {
            label: &ack.label,
            attempts: ack.attempts,
            response,
        }),
        OutputFormat::Table => {
            let mut table = table(vec!["COMMAND", "ATTEMPTS", "RESPONSE"]);
            table.add_row(vec![ack.label.clone(), ack.attempts.to_string(), response]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}: acknowledged after {} attempt(s), response {response}",
                ack.label, ack.attempts
            );
        }
    }
}

pub fn print_event(event: &EngineEvent, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(event);
        return;
    }
    let line = match event {
        EngineEvent::Log(line) => format!("{} {}", severity_tag(line.severity), line.message),
        EngineEvent::Status(update) => format!(
            "[STATUS] {}",
            serde_json::to_string(update).unwrap_or_default()
        ),
        EngineEvent::PanelLock(true) => "[PANEL] locked".to_string(),
        EngineEvent::PanelLock(false) => "[PANEL] unlocked".to_string(),
    };
    println!("{line}");
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "[INFO]",
        Severity::Success => "[OK]",
        Severity::Warning => "[WARN]",
        Severity::Error => "[ERROR]",
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    description: &'a str,
    manufacturer: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    description: &p.description,
                    manufacturer: p.manufacturer.as_deref(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = table(vec!["PORT", "DESCRIPTION", "MANUFACTURER"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.description.clone(),
                    or_dash(port.manufacturer.as_deref()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{} ({})", port.name, port.description);
            }
        }
    }
}

pub fn print_job(job: &BatchJob, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(job),
        OutputFormat::Table => {
            let mut table = table(vec!["ROW", "ACCESS", "CHANNEL", "ACTION", "DELAY (s)"]);
            for (idx, row) in job.rows.iter().enumerate() {
                table.add_row(vec![
                    (idx + 1).to_string(),
                    row.access_channel.to_string(),
                    row.channel_number.to_string(),
                    row.action.to_string(),
                    row.delay_seconds.to_string(),
                ]);
            }
            println!("{table}");
            println!("loop count: {}", job.repeat_count);
        }
        OutputFormat::Pretty => {
            println!(
                "{} row(s), loop count {}, {} transmission(s)",
                job.rows.len(),
                job.repeat_count,
                job.total_transmissions()
            );
        }
    }
}

#[derive(Serialize)]
struct ViolationOutput {
    row: usize,
    column: Option<String>,
    reason: String,
}

pub fn print_violations(errors: &ValidationErrors, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<ViolationOutput> = errors
                .iter()
                .map(|e| ViolationOutput {
                    row: e.row,
                    column: e.column.map(|c| c.to_string()),
                    reason: e.reason.clone(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = table(vec!["ROW", "COLUMN", "REASON"]);
            for e in errors.iter() {
                table.add_row(vec![e.row.to_string(), or_dash(e.column), e.reason.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for e in errors.iter() {
                println!("{e}");
            }
        }
    }
}

pub fn print_summary(summary: &BatchSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            let mut table = table(vec!["ACKED", "ABANDONED", "PASSES", "CANCELLED"]);
            table.add_row(vec![
                summary.rows_acked.to_string(),
                summary.rows_abandoned.to_string(),
                summary.passes_completed.to_string(),
                summary.cancelled.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "acked={} abandoned={} passes={} cancelled={}",
                summary.rows_acked,
                summary.rows_abandoned,
                summary.passes_completed,
                summary.cancelled
            );
        }
    }
}
