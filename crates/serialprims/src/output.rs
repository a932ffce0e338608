use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::value::RawValue;
use serialprims_schema::VerifiedRequest;

use crate::exit::{CliError, CliResult, INTERNAL};

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

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    kind_id: u8,
    size: usize,
    payload: &'a RawValue,
    peer: &'a str,
    timestamp: String,
}

/// Print one verified envelope.
pub fn print_message(
    message: &VerifiedRequest<'_>,
    peer: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let kind = message.kind();
    match format {
        OutputFormat::Json => {
            let rendered = render_json(message, peer).map_err(|err| {
                CliError::new(INTERNAL, format!("output serialization failed: {err}"))
            })?;
            println!("{rendered}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    kind.name().to_string(),
                    message.view().size().to_string(),
                    peer.to_string(),
                    message.raw_payload().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} ({}) size={} peer={} payload={}",
                kind.as_u8(),
                kind,
                message.view().size(),
                peer,
                message.raw_payload()
            );
        }
        OutputFormat::Raw => print_raw(message.view().data()),
    }
    Ok(())
}

fn render_json(message: &VerifiedRequest<'_>, peer: &str) -> serde_json::Result<String> {
    let kind = message.kind();
    serde_json::to_string(&MessageOutput {
        kind: kind.name(),
        kind_id: kind.as_u8(),
        size: message.view().size(),
        payload: message.raw_value(),
        peer,
        timestamp: now_unix_seconds(),
    })
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
