use std::io::Write;

use serde_json::{Map, Value};

/// Column order of the tabular export; also the header the importer expects.
pub const EXPORT_COLUMNS: [&str; 15] = [
    "name",
    "organization_name",
    "goals",
    "potential_experimentation",
    "access_url",
    "operator_count",
    "operator_count_comment",
    "user_count",
    "user_count_comment",
    "monthly_connection_count",
    "monthly_connection_count_comment",
    "context_email",
    "validation_date",
    "historic",
    "owners",
];

/// Writes `to_export` rows as CSV. Null cells are left empty.
pub fn write_export<W: Write>(rows: &[Map<String, Value>], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EXPORT_COLUMNS)?;

    for row in rows {
        let cells = EXPORT_COLUMNS
            .iter()
            .map(|column| render_cell(row.get(*column)));
        csv_writer.write_record(cells)?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
