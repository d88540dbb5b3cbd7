use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::domain::{User, UserId};
use super::validation::{ApplicationField, FieldError, FieldErrorKind};

/// Loosely typed value read from a dictionary before field validation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Owners(Vec<OwnerRef>),
    Json(Value),
}

/// Reference to an owner inside a dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnerRef {
    /// Surrogate identifier, as sent by API clients.
    Id(UserId),
    /// A user already resolved by natural key during import filtering.
    User(User),
}

impl FieldValue {
    /// Null, `false`, zero, empty text and empty collections count as unset.
    pub fn is_falsy(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(value) => !value,
            FieldValue::Int(value) => *value == 0,
            FieldValue::Float(value) => *value == 0.0,
            FieldValue::Text(value) => value.is_empty(),
            FieldValue::Date(_) => false,
            FieldValue::Owners(owners) => owners.is_empty(),
            FieldValue::Json(Value::Array(items)) => items.is_empty(),
            FieldValue::Json(Value::Object(map)) => map.is_empty(),
            FieldValue::Json(Value::Null) => true,
            FieldValue::Json(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Accepts the two calendar layouts the catalog emits and consumes.
    pub fn parse_date(raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim();
        NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
            .ok()
    }

    fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(flag) => FieldValue::Bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => FieldValue::Int(int),
                None => number
                    .as_f64()
                    .map(FieldValue::Float)
                    .unwrap_or(FieldValue::Json(Value::Number(number))),
            },
            Value::String(text) => FieldValue::Text(text),
            other => FieldValue::Json(other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

static NULL: FieldValue = FieldValue::Null;

/// Dictionary exchanged by the factory, the bulk update and the import filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    /// Absent keys read as [`FieldValue::Null`].
    pub fn get(&self, key: &str) -> &FieldValue {
        self.fields.get(key).unwrap_or(&NULL)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts a JSON object into a record. `owners` entries are either
    /// `{"id": n, ...}` objects or bare integers. Dates stay as text.
    pub fn from_json(object: Map<String, Value>) -> Result<Self, FieldError> {
        let mut fields = BTreeMap::new();
        for (key, value) in object {
            let converted = if key == ApplicationField::Owners.key() {
                owners_from_json(value)?
            } else {
                FieldValue::from_json(value)
            };
            fields.insert(key, converted);
        }
        Ok(Self { fields })
    }

    /// Replaces a textual `validation_date` with a parsed date when the text
    /// matches `dd/mm/yyyy` or `yyyy-mm-dd`. Other text is left for the
    /// validator to reject.
    pub fn parse_validation_date(&mut self) {
        let key = ApplicationField::ValidationDate.key();
        let parsed = self
            .get(key)
            .as_text()
            .and_then(FieldValue::parse_date);
        if let Some(date) = parsed {
            self.insert(key, date);
        }
    }
}

fn owners_from_json(value: Value) -> Result<FieldValue, FieldError> {
    let items = match value {
        Value::Null => return Ok(FieldValue::Null),
        Value::Array(items) => items,
        _ => {
            return Err(FieldError::new(
                ApplicationField::Owners,
                FieldErrorKind::UnexpectedType,
            ))
        }
    };

    let mut owners = Vec::with_capacity(items.len());
    for item in items {
        let id = match &item {
            Value::Object(owner) => owner.get("id").and_then(Value::as_i64),
            other => other.as_i64(),
        };
        match id {
            Some(id) => owners.push(OwnerRef::Id(UserId(id))),
            None => {
                return Err(FieldError::new(
                    ApplicationField::Owners,
                    FieldErrorKind::MissingOwnerId,
                ))
            }
        }
    }
    Ok(FieldValue::Owners(owners))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_keys_read_as_null() {
        let record = Record::new().with("name", "Portail");
        assert_eq!(record.get("goals"), &FieldValue::Null);
        assert!(!record.contains_key("goals"));
    }

    #[test]
    fn falsy_follows_dynamic_truthiness() {
        assert!(FieldValue::Null.is_falsy());
        assert!(FieldValue::Int(0).is_falsy());
        assert!(FieldValue::Text(String::new()).is_falsy());
        assert!(FieldValue::Owners(Vec::new()).is_falsy());
        assert!(!FieldValue::Text("0".to_string()).is_falsy());
        assert!(!FieldValue::Int(-1).is_falsy());
    }

    #[test]
    fn from_json_reads_owner_objects_and_ids() {
        let object = json!({
            "name": "Portail",
            "operator_count": 4,
            "owners": [{"id": 3, "email": "a@b.fr"}, 7],
        });
        let Value::Object(map) = object else {
            unreachable!()
        };
        let record = Record::from_json(map).expect("record converts");

        assert_eq!(record.get("operator_count"), &FieldValue::Int(4));
        assert_eq!(
            record.get("owners"),
            &FieldValue::Owners(vec![OwnerRef::Id(UserId(3)), OwnerRef::Id(UserId(7))])
        );
    }

    #[test]
    fn from_json_rejects_owner_without_id() {
        let Value::Object(map) = json!({ "owners": [{"email": "a@b.fr"}] }) else {
            unreachable!()
        };
        let error = Record::from_json(map).expect_err("owner id required");
        assert_eq!(error.kind, FieldErrorKind::MissingOwnerId);
    }

    #[test]
    fn parse_validation_date_accepts_both_layouts() {
        let mut record = Record::new().with("validation_date", "05/03/2021");
        record.parse_validation_date();
        assert_eq!(
            record.get("validation_date"),
            &FieldValue::Date(NaiveDate::from_ymd_opt(2021, 3, 5).expect("valid"))
        );

        let mut record = Record::new().with("validation_date", "2021-03-05");
        record.parse_validation_date();
        assert!(matches!(record.get("validation_date"), FieldValue::Date(_)));

        let mut record = Record::new().with("validation_date", "mars 2021");
        record.parse_validation_date();
        assert_eq!(record.get("validation_date").as_text(), Some("mars 2021"));
    }
}
