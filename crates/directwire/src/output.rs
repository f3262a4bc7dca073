use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use directwire_frame::{Envelope, ResponseContent, ResponseHeader, ResponseRecord, ValueType};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

pub fn print_record(record: &ResponseRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table
                .add_row(vec!["status".to_string(), record.status.to_string()])
                .add_row(vec!["activity id".to_string(), record.activity_id.to_string()])
                .add_row(vec![
                    "transport request id".to_string(),
                    record.transport_request_id.to_string(),
                ]);
            for (name, value) in &record.headers {
                table.add_row(vec![name.clone(), value.clone()]);
            }
            table.add_row(vec![
                "content".to_string(),
                content_preview(record.content.as_ref()),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "status={} activity={} request={} headers={} content={}",
                record.status,
                record.activity_id,
                record.transport_request_id,
                record.headers.len(),
                content_preview(record.content.as_ref())
            );
        }
        OutputFormat::Raw => {
            if let Some(content) = &record.content {
                print_raw(content.as_bytes());
            }
        }
    }
}

pub fn print_envelope(envelope: &Envelope, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{envelope}"),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ID", "NAME", "TYPE", "VALUE"]);
            for entry in envelope.headers().iter() {
                table.add_row(vec![
                    format!("0x{:04x}", entry.id),
                    entry
                        .known()
                        .map(ResponseHeader::name)
                        .unwrap_or("<unknown>")
                        .to_string(),
                    format!("{:?}", entry.value_type()),
                    entry.value.to_string(),
                ]);
            }
            println!(
                "status={} correlation={} length={} refs={}",
                envelope.status(),
                envelope.correlation_id(),
                envelope.message_length(),
                envelope.ref_count()
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let json = serde_json::to_string_pretty(envelope).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
        OutputFormat::Raw => print_raw(envelope.payload()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistryEntry {
    name: &'static str,
    id: String,
    value_type: ValueType,
    http_name: &'static str,
}

pub fn print_registry(format: OutputFormat) {
    let entries: Vec<RegistryEntry> = ResponseHeader::ALL
        .iter()
        .map(|header| RegistryEntry {
            name: header.name(),
            id: format!("0x{:04x}", header.id()),
            value_type: header.value_type(),
            http_name: header.http_name(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ID", "NAME", "TYPE", "HTTP NAME"]);
            for entry in &entries {
                table.add_row(vec![
                    entry.id.clone(),
                    entry.name.to_string(),
                    format!("{:?}", entry.value_type),
                    entry.http_name.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in &entries {
                println!(
                    "{} {} ({:?}) {}",
                    entry.id, entry.name, entry.value_type, entry.http_name
                );
            }
        }
        OutputFormat::Raw => {
            for entry in &entries {
                println!("{}", entry.name);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn content_preview(content: Option<&ResponseContent>) -> String {
    match content {
        None => "<none>".to_string(),
        Some(ResponseContent::Text(text)) => text.clone(),
        Some(ResponseContent::Binary(bytes)) => format!("<binary {} bytes>", bytes.len()),
    }
}
