//! Field validators run on every assignment to an [`Application`](super::Application).
//!
//! Each validator returns the normalized value to store or a [`FieldError`]
//! carrying the user-facing message. Messages are in French, the language of
//! the catalog's users.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use super::value::FieldValue;

/// Mutable fields of an application, keyed the way dictionaries name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationField {
    Id,
    Name,
    OrganizationId,
    OrganizationName,
    Goals,
    PotentialExperimentation,
    AccessUrl,
    OperatorCount,
    OperatorCountComment,
    UserCount,
    UserCountComment,
    MonthlyConnectionCount,
    MonthlyConnectionCountComment,
    ContextEmail,
    ValidationDate,
    Historic,
    Owners,
}

impl ApplicationField {
    pub const fn key(self) -> &'static str {
        match self {
            ApplicationField::Id => "id",
            ApplicationField::Name => "name",
            ApplicationField::OrganizationId => "organization_id",
            ApplicationField::OrganizationName => "organization_name",
            ApplicationField::Goals => "goals",
            ApplicationField::PotentialExperimentation => "potential_experimentation",
            ApplicationField::AccessUrl => "access_url",
            ApplicationField::OperatorCount => "operator_count",
            ApplicationField::OperatorCountComment => "operator_count_comment",
            ApplicationField::UserCount => "user_count",
            ApplicationField::UserCountComment => "user_count_comment",
            ApplicationField::MonthlyConnectionCount => "monthly_connection_count",
            ApplicationField::MonthlyConnectionCountComment => "monthly_connection_count_comment",
            ApplicationField::ContextEmail => "context_email",
            ApplicationField::ValidationDate => "validation_date",
            ApplicationField::Historic => "historic",
            ApplicationField::Owners => "owners",
        }
    }
}

/// What went wrong with a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    UnexpectedType,
    MissingOwnerId,
    InvalidUrl,
    MissingAt,
    EmptyLocalPart,
    EmptyDomainPart,
    MultipleAt,
    LocalPartSpace,
    ForbiddenDomainChar(char),
    NotAnInteger,
    InvalidDateFormat,
}

/// Field-scoped validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: ApplicationField,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: ApplicationField, kind: FieldErrorKind) -> Self {
        Self { field, kind }
    }

    pub fn message(&self) -> String {
        match (&self.kind, self.field) {
            (FieldErrorKind::Required, ApplicationField::OrganizationName) => {
                "L'organisation est un champ obligatoire.".to_string()
            }
            (FieldErrorKind::Required, ApplicationField::Name) => {
                "Le nom de l'application est un champ obligatoire.".to_string()
            }
            (FieldErrorKind::Required, ApplicationField::Goals) => {
                "Les objectifs de l'application sont un champ obligatoire.".to_string()
            }
            (FieldErrorKind::Required, field) => {
                format!("Le champ '{}' est obligatoire.", field.key())
            }
            (FieldErrorKind::UnexpectedType, field) => {
                format!("Le champ '{}' contient une valeur inattendue.", field.key())
            }
            (FieldErrorKind::MissingOwnerId, _) => {
                "Chaque propriétaire doit comporter un identifiant.".to_string()
            }
            (FieldErrorKind::InvalidUrl, _) => "Veuillez saisir un url valide".to_string(),
            (FieldErrorKind::MissingAt, _) => {
                "Veuillez inclure le caractère @ dans l'adresse mail".to_string()
            }
            (FieldErrorKind::EmptyLocalPart, _) => {
                "Veuillez inclure des caractères avant le @ dans l'adresse mail".to_string()
            }
            (FieldErrorKind::EmptyDomainPart, _) => {
                "Veuillez inclure des caractères après le @ dans l'adresse mail".to_string()
            }
            (FieldErrorKind::MultipleAt, _) => {
                "Veuillez n'inclure qu'un seul caractère @ dans l'adresse mail".to_string()
            }
            (FieldErrorKind::LocalPartSpace, _) => {
                "Veuillez ne pas inclure le caractère \" \" avant le @ dans l'adresse mail"
                    .to_string()
            }
            (FieldErrorKind::ForbiddenDomainChar(forbidden), _) => format!(
                "Veuillez ne pas inclure le caractère \"{forbidden}\" après le @ dans l'adresse mail"
            ),
            (FieldErrorKind::NotAnInteger, ApplicationField::OperatorCount) => {
                "Le nombre d'opérateurs dans la base de données doit être un entier".to_string()
            }
            (FieldErrorKind::NotAnInteger, ApplicationField::UserCount) => {
                "Le nombre d'utilisateurs dans la base de données doit être un entier".to_string()
            }
            (FieldErrorKind::NotAnInteger, ApplicationField::MonthlyConnectionCount) => {
                "La production mensuelle dans la base de données doit être un entier".to_string()
            }
            (FieldErrorKind::NotAnInteger, ApplicationField::Historic) => {
                "L'historique dans la base de données doit être une année".to_string()
            }
            (FieldErrorKind::NotAnInteger, field) => {
                format!("Le champ '{}' doit être un entier", field.key())
            }
            (FieldErrorKind::InvalidDateFormat, _) => {
                "La date de validation doit être sous le format jj/mm/aaaa".to_string()
            }
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for FieldError {}

/// Every field failure found by a batch validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    /// Stores the value on success, records the error otherwise.
    pub(crate) fn collect<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: ApplicationField) -> bool {
        self.0.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(FieldError::message).collect();
        write!(f, "{}", messages.join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

/// Free-form text. Scalars are stringified; structured values are rejected.
pub fn validate_text(
    field: ApplicationField,
    value: &FieldValue,
) -> Result<Option<String>, FieldError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Text(text) => Ok(Some(text.clone())),
        FieldValue::Int(number) => Ok(Some(number.to_string())),
        FieldValue::Float(number) => Ok(Some(number.to_string())),
        FieldValue::Bool(flag) => Ok(Some(flag.to_string())),
        _ => Err(FieldError::new(field, FieldErrorKind::UnexpectedType)),
    }
}

/// Falsy values pass through; anything else must contain `http`.
pub fn validate_access_url(value: &FieldValue) -> Result<Option<String>, FieldError> {
    let error = FieldError::new(ApplicationField::AccessUrl, FieldErrorKind::InvalidUrl);
    match value {
        FieldValue::Text(url) if url.is_empty() || url.contains("http") => Ok(Some(url.clone())),
        other if other.is_falsy() => Ok(None),
        _ => Err(error),
    }
}

const FORBIDDEN_DOMAIN_CHARS: [char; 5] = [' ', '/', '\\', ';', ','];

pub fn validate_context_email(value: &FieldValue) -> Result<Option<String>, FieldError> {
    let email = match value {
        FieldValue::Text(email) if email.is_empty() => return Ok(Some(String::new())),
        FieldValue::Text(email) => email,
        other if other.is_falsy() => return Ok(None),
        _ => {
            return Err(FieldError::new(
                ApplicationField::ContextEmail,
                FieldErrorKind::UnexpectedType,
            ))
        }
    };

    check_email_shape(email)
        .map(|()| Some(email.clone()))
        .map_err(|kind| FieldError::new(ApplicationField::ContextEmail, kind))
}

fn check_email_shape(email: &str) -> Result<(), FieldErrorKind> {
    let index = email.find('@').ok_or(FieldErrorKind::MissingAt)?;
    if index == 0 {
        return Err(FieldErrorKind::EmptyLocalPart);
    }
    if index + 1 == email.len() {
        return Err(FieldErrorKind::EmptyDomainPart);
    }

    let (local, domain) = email.split_at(index);
    if domain[1..].contains('@') {
        return Err(FieldErrorKind::MultipleAt);
    }
    if local.contains(' ') {
        return Err(FieldErrorKind::LocalPartSpace);
    }
    if let Some(forbidden) = FORBIDDEN_DOMAIN_CHARS
        .iter()
        .copied()
        .find(|forbidden| domain.contains(*forbidden))
    {
        return Err(FieldErrorKind::ForbiddenDomainChar(forbidden));
    }
    Ok(())
}

fn coerce_integer(field: ApplicationField, value: &FieldValue) -> Result<i64, FieldError> {
    let error = || FieldError::new(field, FieldErrorKind::NotAnInteger);
    match value {
        FieldValue::Int(number) => Ok(*number),
        FieldValue::Bool(flag) => Ok(i64::from(*flag)),
        FieldValue::Float(number) if number.is_finite() => Ok(number.trunc() as i64),
        FieldValue::Text(text) => text.trim().parse::<i64>().map_err(|_| error()),
        _ => Err(error()),
    }
}

/// Surrogate keys read from dictionaries: falsy means unset.
pub fn validate_identifier(
    field: ApplicationField,
    value: &FieldValue,
) -> Result<Option<i64>, FieldError> {
    match value {
        other if other.is_falsy() => Ok(None),
        FieldValue::Int(number) => Ok(Some(*number)),
        FieldValue::Text(text) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| FieldError::new(field, FieldErrorKind::UnexpectedType)),
        _ => Err(FieldError::new(field, FieldErrorKind::UnexpectedType)),
    }
}

/// Shared by `operator_count`, `user_count` and `historic`: an explicit zero
/// is indistinguishable from unset and normalizes to null.
fn validate_optional_integer(
    field: ApplicationField,
    value: &FieldValue,
) -> Result<Option<i64>, FieldError> {
    if value.is_falsy() {
        return Ok(None);
    }
    coerce_integer(field, value).map(Some)
}

pub fn validate_operator_count(value: &FieldValue) -> Result<Option<i64>, FieldError> {
    validate_optional_integer(ApplicationField::OperatorCount, value)
}

pub fn validate_user_count(value: &FieldValue) -> Result<Option<i64>, FieldError> {
    validate_optional_integer(ApplicationField::UserCount, value)
}

pub fn validate_historic(value: &FieldValue) -> Result<Option<i64>, FieldError> {
    validate_optional_integer(ApplicationField::Historic, value)
}

/// Unlike the other counters, a falsy number is kept as is, so `0` stays `0`.
pub fn validate_monthly_connection_count(value: &FieldValue) -> Result<Option<i64>, FieldError> {
    if value.is_falsy() {
        return Ok(match value {
            FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => Some(0),
            _ => None,
        });
    }
    coerce_integer(ApplicationField::MonthlyConnectionCount, value).map(Some)
}

/// Only already-parsed dates are accepted; text is never parsed here.
pub fn validate_validation_date(value: &FieldValue) -> Result<Option<NaiveDate>, FieldError> {
    match value {
        FieldValue::Date(date) => Ok(Some(*date)),
        other if other.is_falsy() => Ok(None),
        _ => Err(FieldError::new(
            ApplicationField::ValidationDate,
            FieldErrorKind::InvalidDateFormat,
        )),
    }
}

/// Returns the organization display name to resolve.
pub fn validate_organization_name(value: &FieldValue) -> Result<&str, FieldError> {
    match value {
        other if other.is_falsy() => Err(FieldError::new(
            ApplicationField::OrganizationName,
            FieldErrorKind::Required,
        )),
        FieldValue::Text(name) => Ok(name.as_str()),
        _ => Err(FieldError::new(
            ApplicationField::OrganizationName,
            FieldErrorKind::UnexpectedType,
        )),
    }
}

pub fn validate_required(field: ApplicationField, value: Option<&str>) -> Result<(), FieldError> {
    match value {
        Some(text) if !text.is_empty() => Ok(()),
        _ => Err(FieldError::new(field, FieldErrorKind::Required)),
    }
}
