use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::domain::{ApplicationId, DataSource, DataSourceRole, OrganizationId, User};
use super::normalizer::remove_accent;
use super::repository::{
    ApplicationRepository, DataSourceRepository, OrganizationDirectory, OwnershipRepository,
    RepositoryError, ResolutionError, UserDirectory,
};
use super::service::CatalogError;
use super::validation::{
    validate_access_url, validate_context_email, validate_historic, validate_identifier,
    validate_monthly_connection_count, validate_operator_count, validate_organization_name,
    validate_required, validate_text, validate_user_count, validate_validation_date,
    ApplicationField, FieldError, FieldErrorKind, ValidationErrors,
};
use super::value::{FieldValue, OwnerRef, Record};

/// Layout of `validation_date` in dictionaries and exports.
pub const VALIDATION_DATE_FORMAT: &str = "%d/%m/%Y";

/// Nested collections included by [`Application::to_dict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DictOptions {
    #[serde(default)]
    pub populate_data_sources: bool,
    #[serde(default = "populate_owners_default")]
    pub populate_owners: bool,
}

fn populate_owners_default() -> bool {
    true
}

impl Default for DictOptions {
    fn default() -> Self {
        Self {
            populate_data_sources: false,
            populate_owners: true,
        }
    }
}

/// One organizational application record.
///
/// Every setter re-runs the field's validator, so a stored value is always
/// normalized or null. `name` and `goals` are only required when saving, see
/// [`Application::validate_for_save`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Application {
    id: Option<ApplicationId>,
    name: Option<String>,
    organization_id: Option<OrganizationId>,
    goals: Option<String>,
    potential_experimentation: Option<String>,
    access_url: Option<String>,
    operator_count: Option<i64>,
    operator_count_comment: Option<String>,
    user_count: Option<i64>,
    user_count_comment: Option<String>,
    monthly_connection_count: Option<i64>,
    monthly_connection_count_comment: Option<String>,
    context_email: Option<String>,
    validation_date: Option<NaiveDate>,
    historic: Option<i64>,
    owners: Vec<User>,
}

/// Whether the `owners` entry of a dictionary replaces the current owners.
#[derive(Debug, Clone, Copy)]
enum OwnersUpdate {
    /// Key present, even if empty.
    WhenPresent,
    /// Value present and non-empty.
    WhenNonEmpty,
}

/// Outcome of reading the organization entries of a dictionary.
enum OrganizationUpdate<'a> {
    Id(Option<OrganizationId>),
    Name(&'a str),
    Clear,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<ApplicationId> {
        self.id
    }

    /// Used by storage when a row receives its key.
    pub fn set_id(&mut self, id: Option<ApplicationId>) {
        self.id = id;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.name = validate_text(ApplicationField::Name, &value.into())?;
        Ok(())
    }

    pub fn goals(&self) -> Option<&str> {
        self.goals.as_deref()
    }

    pub fn set_goals(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.goals = validate_text(ApplicationField::Goals, &value.into())?;
        Ok(())
    }

    pub fn potential_experimentation(&self) -> Option<&str> {
        self.potential_experimentation.as_deref()
    }

    pub fn set_potential_experimentation(
        &mut self,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.potential_experimentation =
            validate_text(ApplicationField::PotentialExperimentation, &value.into())?;
        Ok(())
    }

    pub fn access_url(&self) -> Option<&str> {
        self.access_url.as_deref()
    }

    pub fn set_access_url(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.access_url = validate_access_url(&value.into())?;
        Ok(())
    }

    pub fn operator_count(&self) -> Option<i64> {
        self.operator_count
    }

    pub fn set_operator_count(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.operator_count = validate_operator_count(&value.into())?;
        Ok(())
    }

    pub fn operator_count_comment(&self) -> Option<&str> {
        self.operator_count_comment.as_deref()
    }

    pub fn set_operator_count_comment(
        &mut self,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.operator_count_comment =
            validate_text(ApplicationField::OperatorCountComment, &value.into())?;
        Ok(())
    }

    pub fn user_count(&self) -> Option<i64> {
        self.user_count
    }

    pub fn set_user_count(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.user_count = validate_user_count(&value.into())?;
        Ok(())
    }

    pub fn user_count_comment(&self) -> Option<&str> {
        self.user_count_comment.as_deref()
    }

    pub fn set_user_count_comment(
        &mut self,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.user_count_comment = validate_text(ApplicationField::UserCountComment, &value.into())?;
        Ok(())
    }

    pub fn monthly_connection_count(&self) -> Option<i64> {
        self.monthly_connection_count
    }

    pub fn set_monthly_connection_count(
        &mut self,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.monthly_connection_count = validate_monthly_connection_count(&value.into())?;
        Ok(())
    }

    pub fn monthly_connection_count_comment(&self) -> Option<&str> {
        self.monthly_connection_count_comment.as_deref()
    }

    pub fn set_monthly_connection_count_comment(
        &mut self,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.monthly_connection_count_comment =
            validate_text(ApplicationField::MonthlyConnectionCountComment, &value.into())?;
        Ok(())
    }

    pub fn context_email(&self) -> Option<&str> {
        self.context_email.as_deref()
    }

    pub fn set_context_email(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.context_email = validate_context_email(&value.into())?;
        Ok(())
    }

    pub fn validation_date(&self) -> Option<NaiveDate> {
        self.validation_date
    }

    pub fn set_validation_date(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.validation_date = validate_validation_date(&value.into())?;
        Ok(())
    }

    pub fn historic(&self) -> Option<i64> {
        self.historic
    }

    pub fn set_historic(&mut self, value: impl Into<FieldValue>) -> Result<(), FieldError> {
        self.historic = validate_historic(&value.into())?;
        Ok(())
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    /// Display name of the referenced organization.
    pub fn organization_name<D>(&self, directory: &D) -> Result<Option<String>, RepositoryError>
    where
        D: OrganizationDirectory + ?Sized,
    {
        let Some(id) = self.organization_id else {
            return Ok(None);
        };
        Ok(directory
            .organization(id)?
            .map(|organization| organization.value))
    }

    /// Resolves `value` by display name and stores the organization's id. On
    /// failure the entity is left untouched.
    pub fn set_organization_name<D>(
        &mut self,
        value: impl Into<FieldValue>,
        directory: &D,
    ) -> Result<(), CatalogError>
    where
        D: OrganizationDirectory + ?Sized,
    {
        let value = value.into();
        let name = validate_organization_name(&value)?;
        self.organization_id = Some(resolve_organization_name(name, directory)?);
        Ok(())
    }

    pub fn owners(&self) -> &[User] {
        &self.owners
    }

    /// Replaces the owner set. Duplicate users are dropped, keeping the first.
    pub fn set_owners(&mut self, owners: Vec<User>) {
        let mut unique: Vec<User> = Vec::with_capacity(owners.len());
        for owner in owners {
            if !unique.iter().any(|existing| existing.id == owner.id) {
                unique.push(owner);
            }
        }
        self.owners = unique;
    }

    pub fn data_sources<S>(&self, store: &S) -> Result<Vec<DataSource>, RepositoryError>
    where
        S: DataSourceRepository + ?Sized,
    {
        self.related_data_sources(store, DataSourceRole::Owned)
    }

    pub fn origin_data_sources<S>(&self, store: &S) -> Result<Vec<DataSource>, RepositoryError>
    where
        S: DataSourceRepository + ?Sized,
    {
        self.related_data_sources(store, DataSourceRole::Origin)
    }

    fn related_data_sources<S>(
        &self,
        store: &S,
        role: DataSourceRole,
    ) -> Result<Vec<DataSource>, RepositoryError>
    where
        S: DataSourceRepository + ?Sized,
    {
        match self.id {
            Some(id) => store.data_sources_for(id, role),
            None => Ok(Vec::new()),
        }
    }

    /// Checks the columns that may not be null in storage.
    pub fn validate_for_save(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.collect(validate_required(ApplicationField::Name, self.name()));
        errors.collect(validate_required(ApplicationField::Goals, self.goals()));
        errors.into_result()
    }

    pub fn to_dict<S>(
        &self,
        store: &S,
        options: DictOptions,
    ) -> Result<Map<String, Value>, RepositoryError>
    where
        S: OrganizationDirectory + DataSourceRepository + ?Sized,
    {
        let mut result = Map::new();
        result.insert("id".to_string(), json!(self.id.map(|id| id.0)));
        result.insert("name".to_string(), json!(self.name));
        result.insert(
            "potential_experimentation".to_string(),
            json!(self.potential_experimentation),
        );
        result.insert(
            "organization_name".to_string(),
            json!(self.organization_name(store)?),
        );
        result.insert("goals".to_string(), json!(self.goals));
        result.insert("access_url".to_string(), json!(self.access_url));
        result.insert("operator_count".to_string(), json!(self.operator_count));
        result.insert("user_count".to_string(), json!(self.user_count));
        result.insert(
            "monthly_connection_count".to_string(),
            json!(self.monthly_connection_count),
        );
        result.insert(
            "operator_count_comment".to_string(),
            json!(self.operator_count_comment),
        );
        result.insert(
            "user_count_comment".to_string(),
            json!(self.user_count_comment),
        );
        result.insert(
            "monthly_connection_count_comment".to_string(),
            json!(self.monthly_connection_count_comment),
        );
        result.insert("context_email".to_string(), json!(self.context_email));
        result.insert(
            "validation_date".to_string(),
            json!(self
                .validation_date
                .map(|date| date.format(VALIDATION_DATE_FORMAT).to_string())),
        );
        result.insert("historic".to_string(), json!(self.historic));

        if options.populate_data_sources {
            let mut data_sources = self.data_sources(store)?;
            data_sources.sort_by_cached_key(|data_source| remove_accent(&data_source.name));
            let rendered: Vec<Value> = data_sources
                .iter()
                .map(|data_source| Value::Object(data_source.to_dict()))
                .collect();
            result.insert("data_sources".to_string(), Value::Array(rendered));
        }
        if options.populate_owners {
            let mut owners = self.owners.clone();
            owners.sort_by_cached_key(|owner| remove_accent(&owner.last_name));
            let rendered: Vec<Value> = owners
                .iter()
                .map(|owner| Value::Object(owner.to_dict()))
                .collect();
            result.insert("owners".to_string(), Value::Array(rendered));
        }
        Ok(result)
    }

    /// Flat row for tabular export: owners become a comma-joined list of
    /// e-mails and the id is dropped.
    pub fn to_export<S>(&self, store: &S) -> Result<Map<String, Value>, RepositoryError>
    where
        S: OrganizationDirectory + DataSourceRepository + ?Sized,
    {
        let mut row = self.to_dict(
            store,
            DictOptions {
                populate_data_sources: false,
                populate_owners: true,
            },
        )?;

        let emails: Vec<String> = match row.get("owners") {
            Some(Value::Array(owners)) => owners
                .iter()
                .filter_map(|owner| owner.get("email").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        row.insert("owners".to_string(), Value::String(emails.join(",")));
        row.remove("id");
        Ok(row)
    }

    /// Overwrites every mutable field from `data`; an absent key means null.
    /// When an `owners` key is present the owner set is replaced wholesale.
    /// Nothing is changed unless the whole dictionary is valid.
    pub fn update_from_dict<D>(&mut self, data: &Record, directory: &D) -> Result<(), CatalogError>
    where
        D: UserDirectory + OrganizationDirectory + ?Sized,
    {
        let mut staged = self.clone();
        staged.apply_dict(data, directory, OwnersUpdate::WhenPresent)?;
        *self = staged;
        Ok(())
    }

    /// Builds a new entity from the dictionary shape used by
    /// [`Application::update_from_dict`], including its `id`.
    pub fn from_dict<D>(data: &Record, directory: &D) -> Result<Self, CatalogError>
    where
        D: UserDirectory + OrganizationDirectory + ?Sized,
    {
        let mut application = Self::new();
        let id = validate_identifier(ApplicationField::Id, data.get(ApplicationField::Id.key()))?;
        application.id = id.map(ApplicationId);
        application.apply_dict(data, directory, OwnersUpdate::WhenNonEmpty)?;
        Ok(application)
    }

    /// Removes the ownership rows of this application, then the application.
    pub fn delete<S>(&self, store: &S) -> Result<(), RepositoryError>
    where
        S: ApplicationRepository + OwnershipRepository + ?Sized,
    {
        let id = self.id.ok_or(RepositoryError::NotFound)?;
        store.remove_application(id)?;
        ApplicationRepository::delete(store, id)
    }

    /// Clears the whole ownership table before the generic bulk delete, so no
    /// association row can outlive its application.
    pub fn delete_all<S>(store: &S) -> Result<usize, RepositoryError>
    where
        S: ApplicationRepository + OwnershipRepository + ?Sized,
    {
        let links = OwnershipRepository::clear(store)?;
        tracing::debug!(links, "cleared ownership rows before bulk delete");
        ApplicationRepository::delete_all(store)
    }

    fn apply_dict<D>(
        &mut self,
        data: &Record,
        directory: &D,
        owners_update: OwnersUpdate,
    ) -> Result<(), CatalogError>
    where
        D: UserDirectory + OrganizationDirectory + ?Sized,
    {
        let mut errors = ValidationErrors::new();
        self.assign_scalars(data, &mut errors);
        let organization = errors.collect(read_organization(data));
        let owners = errors.collect(read_owners(data, owners_update));
        errors.into_result()?;

        match organization {
            Some(OrganizationUpdate::Id(Some(id))) => {
                if directory.organization(id)?.is_none() {
                    return Err(ResolutionError::UnknownOrganizationId(id).into());
                }
                self.organization_id = Some(id);
            }
            Some(OrganizationUpdate::Id(None)) | Some(OrganizationUpdate::Clear) | None => {
                self.organization_id = None;
            }
            Some(OrganizationUpdate::Name(name)) => {
                self.organization_id = Some(resolve_organization_name(name, directory)?);
            }
        }

        if let Some(Some(references)) = owners {
            self.set_owners(resolve_owners(references, directory)?);
        }
        Ok(())
    }

    fn assign_scalars(&mut self, data: &Record, errors: &mut ValidationErrors) {
        let text = |field: ApplicationField| validate_text(field, data.get(field.key()));
        let value = |field: ApplicationField| data.get(field.key());

        if let Some(name) = errors.collect(text(ApplicationField::Name)) {
            self.name = name;
        }
        if let Some(goals) = errors.collect(text(ApplicationField::Goals)) {
            self.goals = goals;
        }
        if let Some(experimentation) =
            errors.collect(text(ApplicationField::PotentialExperimentation))
        {
            self.potential_experimentation = experimentation;
        }
        if let Some(url) = errors.collect(validate_access_url(value(ApplicationField::AccessUrl)))
        {
            self.access_url = url;
        }
        if let Some(count) =
            errors.collect(validate_operator_count(value(ApplicationField::OperatorCount)))
        {
            self.operator_count = count;
        }
        if let Some(count) =
            errors.collect(validate_user_count(value(ApplicationField::UserCount)))
        {
            self.user_count = count;
        }
        if let Some(count) = errors.collect(validate_monthly_connection_count(value(
            ApplicationField::MonthlyConnectionCount,
        ))) {
            self.monthly_connection_count = count;
        }
        if let Some(comment) = errors.collect(text(ApplicationField::OperatorCountComment)) {
            self.operator_count_comment = comment;
        }
        if let Some(comment) = errors.collect(text(ApplicationField::UserCountComment)) {
            self.user_count_comment = comment;
        }
        if let Some(comment) =
            errors.collect(text(ApplicationField::MonthlyConnectionCountComment))
        {
            self.monthly_connection_count_comment = comment;
        }
        if let Some(email) =
            errors.collect(validate_context_email(value(ApplicationField::ContextEmail)))
        {
            self.context_email = email;
        }
        if let Some(date) =
            errors.collect(validate_validation_date(value(ApplicationField::ValidationDate)))
        {
            self.validation_date = date;
        }
        if let Some(historic) =
            errors.collect(validate_historic(value(ApplicationField::Historic)))
        {
            self.historic = historic;
        }
    }
}

/// `organization_id` wins when its key is present, then `organization_name`.
fn read_organization(data: &Record) -> Result<OrganizationUpdate<'_>, FieldError> {
    let id_key = ApplicationField::OrganizationId.key();
    let name_key = ApplicationField::OrganizationName.key();

    if data.contains_key(id_key) {
        let id = validate_identifier(ApplicationField::OrganizationId, data.get(id_key))?;
        return Ok(OrganizationUpdate::Id(id.map(OrganizationId)));
    }
    if data.contains_key(name_key) {
        return validate_organization_name(data.get(name_key)).map(OrganizationUpdate::Name);
    }
    Ok(OrganizationUpdate::Clear)
}

fn read_owners(
    data: &Record,
    owners_update: OwnersUpdate,
) -> Result<Option<&[OwnerRef]>, FieldError> {
    let key = ApplicationField::Owners.key();
    let value = data.get(key);
    let replace = match owners_update {
        OwnersUpdate::WhenPresent => data.contains_key(key),
        OwnersUpdate::WhenNonEmpty => !value.is_falsy(),
    };
    if !replace {
        return Ok(None);
    }

    match value {
        FieldValue::Owners(references) => Ok(Some(references.as_slice())),
        FieldValue::Null => Ok(Some(&[])),
        _ => Err(FieldError::new(
            ApplicationField::Owners,
            FieldErrorKind::UnexpectedType,
        )),
    }
}

fn resolve_organization_name<D>(name: &str, directory: &D) -> Result<OrganizationId, CatalogError>
where
    D: OrganizationDirectory + ?Sized,
{
    let organization = directory
        .organization_by_value(name)?
        .ok_or_else(|| ResolutionError::UnknownOrganization(name.to_string()))?;
    Ok(organization.id)
}

/// Every reference must resolve; an unknown id fails the whole operation.
fn resolve_owners<D>(references: &[OwnerRef], directory: &D) -> Result<Vec<User>, CatalogError>
where
    D: UserDirectory + ?Sized,
{
    let mut owners = Vec::with_capacity(references.len());
    for reference in references {
        let owner = match reference {
            OwnerRef::User(user) => user.clone(),
            OwnerRef::Id(id) => directory
                .user(*id)?
                .ok_or(ResolutionError::UnknownOwner(*id))?,
        };
        owners.push(owner);
    }
    Ok(owners)
}
