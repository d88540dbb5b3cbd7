use std::collections::BTreeMap;
use std::io::Read;

use serde::Serialize;

use super::domain::ApplicationId;
use super::repository::{ResolutionError, UserDirectory};
use super::service::CatalogError;
use super::validation::ApplicationField;
use super::value::{FieldValue, OwnerRef, Record};

/// One row of a tabular import, keyed by column header.
pub type ImportRecord = BTreeMap<String, String>;

/// Reads a headed CSV export into raw records. Cells are trimmed.
pub fn parse_import_records<R: Read>(reader: R) -> Result<Vec<ImportRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for record in csv_reader.deserialize::<ImportRecord>() {
        records.push(record?);
    }

    Ok(records)
}

/// Turns a raw import row into a [`Record`] ready for
/// [`Application::from_dict`](super::Application::from_dict).
///
/// Empty cells become null and `validation_date` is parsed when it matches a
/// known layout. `owners` holds comma-separated e-mails, each of which must
/// belong to a user; a missing or empty cell means no owners.
pub fn filter_import_record<U>(raw: &ImportRecord, users: &U) -> Result<Record, CatalogError>
where
    U: UserDirectory + ?Sized,
{
    let owners_key = ApplicationField::Owners.key();
    let mut record = Record::new();

    for (key, value) in raw {
        let key = key.trim();
        if key.is_empty() || key == owners_key {
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            record.insert(key, FieldValue::Null);
        } else {
            record.insert(key, value);
        }
    }
    record.parse_validation_date();

    let owner_emails = raw
        .get(owners_key)
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty());

    let mut owners = Vec::new();
    if let Some(cell) = owner_emails {
        for email in cell.split(',').map(str::trim) {
            let user = users
                .user_by_email(email)?
                .ok_or_else(|| ResolutionError::UnknownOwnerEmail(email.to_string()))?;
            owners.push(OwnerRef::User(user));
        }
    }
    record.insert(owners_key, FieldValue::Owners(owners));

    Ok(record)
}

/// Outcome of a tabular import. Rows are imported independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<ApplicationId>,
    pub rejected: Vec<ImportRejection>,
}

/// A row that could not be imported. `line` counts data rows from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRejection {
    pub line: usize,
    pub error: String,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}
