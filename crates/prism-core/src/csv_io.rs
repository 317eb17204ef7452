//! CSV import of items and styling guides, and CSV export of results.

use crate::error::{PrismError, Result};
use crate::llm::ProviderOutcome;
use crate::parse;
use crate::template::ItemContext;
use crate::types::EnrichmentResponse;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;

/// Header of the results export.
pub const RESULT_COLUMNS: [&str; 6] = ["item_key", "task", "provider", "status", "output", "error"];

/// Read listings from a CSV file.
///
/// Recognised columns are `item_id`, `item_title`, `short_description`,
/// `long_description` and `item_product_type`; any other column becomes a
/// metadata entry.
pub fn read_items(path: &Path) -> Result<Vec<ItemContext>> {
    let file = std::fs::File::open(path)?;
    let items = read_items_from(file)?;
    tracing::debug!("Read {} items from {:?}", items.len(), path);
    Ok(items)
}

/// [`read_items`] over any reader.
pub fn read_items_from<R: Read>(reader: R) -> Result<Vec<ItemContext>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if !headers.iter().any(|h| h == "item_title") {
        return Err(PrismError::InvalidInput(
            "items CSV needs an item_title column".to_string(),
        ));
    }

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut item = ItemContext::default();
        for (header, value) in headers.iter().zip(record.iter()) {
            match header.as_str() {
                "item_id" if !value.is_empty() => item.item_id = Some(value.to_string()),
                "item_id" => {}
                "item_title" => item.item_title = value.to_string(),
                "short_description" => item.short_description = value.to_string(),
                "long_description" => item.long_description = value.to_string(),
                "item_product_type" => item.item_product_type = value.to_string(),
                other => {
                    item.metadata
                        .insert(other.to_string(), Value::String(value.to_string()));
                }
            }
        }
        items.push(item);
    }
    Ok(items)
}

/// Read `product_type,guide` rows. Rows with an empty product type are skipped.
pub fn read_styling_guides(path: &Path) -> Result<Vec<(String, String)>> {
    let file = std::fs::File::open(path)?;
    read_styling_guides_from(file)
}

/// [`read_styling_guides`] over any reader.
pub fn read_styling_guides_from<R: Read>(reader: R) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            PrismError::InvalidInput(format!("styling guide CSV needs a {name} column"))
        })
    };
    let product_type_idx = column("product_type")?;
    let guide_idx = column("guide")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let product_type = record.get(product_type_idx).unwrap_or_default();
        if product_type.is_empty() {
            continue;
        }
        let guide = record.get(guide_idx).unwrap_or_default();
        rows.push((product_type.to_string(), guide.to_string()));
    }
    Ok(rows)
}

/// Write one row per item, task and provider.
pub fn write_results(path: &Path, responses: &[EnrichmentResponse]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_results_to(file, responses)
}

/// [`write_results`] over any writer.
pub fn write_results_to<W: Write>(writer: W, responses: &[EnrichmentResponse]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(RESULT_COLUMNS)?;
    for response in responses {
        for (task, providers) in &response.results {
            for (provider, outcome) in providers {
                let (status, output, error) = match outcome {
                    ProviderOutcome::Success { text, parsed, .. } => {
                        let output = match parsed {
                            Some(value) if !parse::is_sentinel(value) => value.to_string(),
                            _ => text.clone(),
                        };
                        ("success", output, String::new())
                    }
                    ProviderOutcome::Failure { kind, error, .. } => {
                        ("failure", String::new(), format!("{}: {error}", kind.as_str()))
                    }
                };
                writer.write_record([
                    response.item_key.as_str(),
                    task.as_str(),
                    provider.as_str(),
                    status,
                    output.as_str(),
                    error.as_str(),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
