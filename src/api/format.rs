//! Response encodings for ranked entries.

use std::str::FromStr;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::engine::types::RankedEntry;

const CSV_HEADER: [&str; 4] = ["rank", "symbol", "price_USD", "timestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown output format {0:?}")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv output was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encoded body plus its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: String,
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

pub fn render(format: OutputFormat, entries: &[RankedEntry]) -> Result<Rendered, RenderError> {
    match format {
        OutputFormat::Json => Ok(Rendered {
            content_type: "application/json",
            body: serde_json::to_string(entries)?,
        }),
        OutputFormat::Csv => Ok(Rendered {
            content_type: "text/csv; charset=utf-8",
            body: to_csv(entries)?,
        }),
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    rank: u32,
    symbol: &'a str,
    price_usd: f64,
    timestamp: String,
}

fn to_csv(entries: &[RankedEntry]) -> Result<String, RenderError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    // written by hand so an empty result still carries the header
    writer.write_record(CSV_HEADER)?;
    for entry in entries {
        writer.serialize(CsvRow {
            rank: entry.rank,
            symbol: &entry.name,
            price_usd: entry.value,
            timestamp: entry.timestamp.to_rfc3339(),
        })?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}
