use super::application::Application;
use super::domain::{
    ApplicationId, DataSource, DataSourceRole, Organization, OrganizationId, User, UserId,
};

/// Storage of application rows. Owners are not part of the row: they live in
/// the ownership table and are rehydrated on fetch.
pub trait ApplicationRepository: Send + Sync {
    /// Persists a new row, assigning an id when the application has none.
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn update(&self, application: Application) -> Result<(), RepositoryError>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn list(&self) -> Result<Vec<Application>, RepositoryError>;
    fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError>;
    /// Generic bulk delete of application rows. Does not touch ownerships.
    fn delete_all(&self) -> Result<usize, RepositoryError>;
}

/// The `ownerships` association table, unique on `(user_id, application_id)`.
pub trait OwnershipRepository: Send + Sync {
    fn link(&self, user: UserId, application: ApplicationId) -> Result<(), RepositoryError>;
    fn replace_owners(
        &self,
        application: ApplicationId,
        owners: &[UserId],
    ) -> Result<(), RepositoryError>;
    fn owners_of(&self, application: ApplicationId) -> Result<Vec<UserId>, RepositoryError>;
    fn remove_application(&self, application: ApplicationId) -> Result<usize, RepositoryError>;
    fn clear(&self) -> Result<usize, RepositoryError>;
    fn count(&self) -> Result<usize, RepositoryError>;
}

pub trait UserDirectory: Send + Sync {
    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
}

pub trait OrganizationDirectory: Send + Sync {
    fn organization(&self, id: OrganizationId) -> Result<Option<Organization>, RepositoryError>;
    fn organization_by_value(&self, value: &str) -> Result<Option<Organization>, RepositoryError>;
}

pub trait DataSourceRepository: Send + Sync {
    fn data_sources_for(
        &self,
        application: ApplicationId,
        role: DataSourceRole,
    ) -> Result<Vec<DataSource>, RepositoryError>;
}

/// Everything the application service needs from storage.
pub trait CatalogStore:
    ApplicationRepository
    + OwnershipRepository
    + UserDirectory
    + OrganizationDirectory
    + DataSourceRepository
{
}

impl<T> CatalogStore for T where
    T: ApplicationRepository
        + OwnershipRepository
        + UserDirectory
        + OrganizationDirectory
        + DataSourceRepository
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("no application id left to assign")]
    IdsExhausted,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// A reference that does not match any stored collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("L'organisation '{0}' n'existe pas.")]
    UnknownOrganization(String),
    #[error("L'organisation {0} n'existe pas.")]
    UnknownOrganizationId(OrganizationId),
    #[error("L'utilisateur {0} n'existe pas.")]
    UnknownOwner(UserId),
    #[error("L'adresse email {0} ne correspond à aucun utilisateur")]
    UnknownOwnerEmail(String),
}
