//! Application catalog: the `Application` entity, its field validators,
//! dictionary conversion, ownership management and search indexing hooks,
//! together with the storage seams and service facade built around it.

pub mod application;
pub mod domain;
pub mod export;
pub mod import;
pub mod memory;
pub(crate) mod normalizer;
pub mod repository;
pub mod router;
pub mod search;
pub mod service;
pub mod validation;
pub mod value;

#[cfg(test)]
mod tests;

pub use application::{Application, DictOptions, VALIDATION_DATE_FORMAT};
pub use domain::{
    ApplicationId, DataSource, DataSourceId, DataSourceRole, Organization, OrganizationId, User,
    UserId,
};
pub use export::{write_export, EXPORT_COLUMNS};
pub use import::{
    filter_import_record, parse_import_records, ImportRecord, ImportRejection, ImportReport,
};
pub use memory::{MemoryCatalogStore, MemorySearchIndex, SeedData};
pub use normalizer::remove_accent;
pub use repository::{
    ApplicationRepository, CatalogStore, DataSourceRepository, OrganizationDirectory,
    OwnershipRepository, RepositoryError, ResolutionError, UserDirectory,
};
pub use router::catalog_router;
pub use search::{SearchDocument, SearchError, SearchIndex, Searchable};
pub use service::{ApplicationService, CatalogError};
pub use validation::{ApplicationField, FieldError, FieldErrorKind, ValidationErrors};
pub use value::{FieldValue, OwnerRef, Record};
