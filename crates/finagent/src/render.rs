//! Turning an agent reply into answer text
//!
//! Narrated replies pass through. Raw payloads from direct tools map each
//! symbol to a JSON record list; those are flattened into one text table with
//! a trailing `symbol` column. Anything that does not fit that shape falls
//! back to the payload's JSON text.

use chrono::DateTime;
use comfy_table::{Table, presets};
use finagent_core::AgentReply;
use finagent_market::vn_offset;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Why a raw payload could not be rendered as a table
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not an object keyed by symbol")]
    NotAnObject,

    #[error("value for {0} is not a JSON string")]
    NotText(String),

    #[error("value for {symbol} is not a record list: {source}")]
    InvalidRecords {
        symbol: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value for {0} contains a non-object record")]
    NotARecord(String),

    #[error("time {0} is out of range")]
    InvalidTime(i64),

    #[error("payload has no records")]
    Empty,
}

/// Final answer text for one agent reply
pub fn extract_answer(reply: AgentReply) -> String {
    match reply {
        AgentReply::Narrated(text) => text,
        // validation messages from direct tools
        AgentReply::RawPayload(Value::String(message)) => message,
        AgentReply::RawPayload(payload) => render_payload(&payload).unwrap_or_else(|e| {
            warn!(error = %e, "Raw payload not renderable, returning JSON text");
            payload.to_string()
        }),
    }
}

/// Flatten `{symbol: "[{...}, ...]"}` into a text table
pub fn render_payload(payload: &Value) -> Result<String, PayloadError> {
    let by_symbol = payload.as_object().ok_or(PayloadError::NotAnObject)?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<(String, Map<String, Value>)> = Vec::new();
    for (symbol, value) in by_symbol {
        let text = value
            .as_str()
            .ok_or_else(|| PayloadError::NotText(symbol.clone()))?;
        let records: Vec<Value> =
            serde_json::from_str(text).map_err(|source| PayloadError::InvalidRecords {
                symbol: symbol.clone(),
                source,
            })?;

        for record in records {
            let Value::Object(record) = record else {
                return Err(PayloadError::NotARecord(symbol.clone()));
            };
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
            rows.push((symbol.clone(), record));
        }
    }

    if rows.is_empty() {
        return Err(PayloadError::Empty);
    }

    let mut table = Table::new();
    table.load_preset(presets::ASCII_MARKDOWN);
    let mut header = columns.clone();
    header.push("symbol".to_string());
    table.set_header(header);

    for (symbol, record) in &rows {
        let mut cells = Vec::with_capacity(columns.len() + 1);
        for column in &columns {
            let cell = match record.get(column) {
                Some(value) if column == "time" => format_time(value)?,
                Some(value) => format_cell(value),
                None => String::new(),
            };
            cells.push(cell);
        }
        cells.push(symbol.clone());
        table.add_row(cells);
    }

    Ok(table.to_string())
}

/// Epoch milliseconds as local Vietnam time
fn format_time(value: &Value) -> Result<String, PayloadError> {
    let Some(millis) = value.as_i64() else {
        return Ok(format_cell(value));
    };
    let time = DateTime::from_timestamp_millis(millis).ok_or(PayloadError::InvalidTime(millis))?;
    Ok(time.with_timezone(&vn_offset()).format(TIME_FORMAT).to_string())
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
