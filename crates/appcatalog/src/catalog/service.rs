use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::application::{Application, DictOptions};
use super::domain::{ApplicationId, UserId};
use super::export::write_export;
use super::import::{filter_import_record, parse_import_records, ImportRejection, ImportReport};
use super::repository::{CatalogStore, RepositoryError, ResolutionError};
use super::search::{SearchDocument, SearchError, SearchIndex, Searchable};
use super::validation::{FieldError, ValidationErrors};
use super::value::Record;

/// Service composing the catalog store and the search index.
pub struct ApplicationService<S, I> {
    store: Arc<S>,
    index: Arc<I>,
}

impl<S, I> ApplicationService<S, I>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    pub fn new(store: Arc<S>, index: Arc<I>) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build, validate and persist an application from a dictionary.
    pub fn create(&self, data: &Record) -> Result<Application, CatalogError> {
        let application = Application::from_dict(data, self.store.as_ref())?;
        self.save_new(application)
    }

    /// Apply a dictionary to a stored application. Absent keys become null.
    /// When re-indexing fails the stored row and its owners are restored.
    pub fn update(&self, id: ApplicationId, data: &Record) -> Result<Application, CatalogError> {
        let previous = self.get(id)?;
        let before = previous.search_document(self.store.as_ref())?;

        let mut application = previous.clone();
        application.update_from_dict(data, self.store.as_ref())?;
        application.validate_for_save()?;

        self.store.update(application.clone())?;
        if let Err(error) = self.relink_and_reindex(id, &application, before) {
            warn!(application_id = %id, %error, "update rolled back");
            self.store.update(previous.clone())?;
            self.store.replace_owners(id, &owner_ids(&previous))?;
            return Err(error);
        }

        info!(application_id = %id, "application updated");
        Ok(application)
    }

    pub fn get(&self, id: ApplicationId) -> Result<Application, CatalogError> {
        self.store.fetch(id)?.ok_or(CatalogError::NotFound(id))
    }

    pub fn list(&self) -> Result<Vec<Application>, CatalogError> {
        Ok(self.store.list()?)
    }

    pub fn delete(&self, id: ApplicationId) -> Result<(), CatalogError> {
        let application = self.get(id)?;
        application.delete(self.store.as_ref())?;
        self.index.remove_from_index(Application::INDEX, id.0)?;
        info!(application_id = %id, "application deleted");
        Ok(())
    }

    /// Remove every application along with the ownership table.
    pub fn delete_all(&self) -> Result<usize, CatalogError> {
        let removed = Application::delete_all(self.store.as_ref())?;
        self.index.clear_index(Application::INDEX)?;
        info!(removed, "all applications deleted");
        Ok(removed)
    }

    pub fn render(
        &self,
        application: &Application,
        options: DictOptions,
    ) -> Result<Map<String, Value>, CatalogError> {
        Ok(application.to_dict(self.store.as_ref(), options)?)
    }

    pub fn export_rows(&self) -> Result<Vec<Map<String, Value>>, CatalogError> {
        let mut rows = Vec::new();
        for application in self.store.list()? {
            rows.push(application.to_export(self.store.as_ref())?);
        }
        Ok(rows)
    }

    pub fn export_csv<W: Write>(&self, writer: W) -> Result<(), CatalogError> {
        let rows = self.export_rows()?;
        write_export(&rows, writer)?;
        Ok(())
    }

    /// Import every row of a CSV export. A failing row is reported and does
    /// not prevent the other rows from being imported.
    pub fn import_csv<R: Read>(&self, reader: R) -> Result<ImportReport, CatalogError> {
        let mut report = ImportReport::default();

        for (position, raw) in parse_import_records(reader)?.into_iter().enumerate() {
            let line = position + 1;
            let imported = filter_import_record(&raw, self.store.as_ref())
                .and_then(|record| self.create(&record));
            match imported {
                Ok(application) => {
                    if let Some(id) = application.id() {
                        report.imported.push(id);
                    }
                }
                Err(error) => {
                    warn!(line, %error, "import row rejected");
                    report.rejected.push(ImportRejection {
                        line,
                        error: error.to_string(),
                    });
                }
            }
        }

        info!(
            imported = report.imported.len(),
            rejected = report.rejected.len(),
            "application import finished"
        );
        Ok(report)
    }

    /// Applications matching a search expression, in index order.
    pub fn search(&self, expression: &str) -> Result<Vec<Application>, CatalogError> {
        let mut results = Vec::new();
        for id in self.index.query(Application::INDEX, expression)? {
            if let Some(application) = self.store.fetch(ApplicationId(id))? {
                results.push(application);
            }
        }
        Ok(results)
    }

    fn save_new(&self, application: Application) -> Result<Application, CatalogError> {
        application.validate_for_save()?;

        let stored = self.store.insert(application)?;
        let id = stored.id().ok_or(RepositoryError::NotFound)?;
        if let Err(error) = self.link_and_index(id, &stored) {
            warn!(application_id = %id, %error, "create rolled back");
            stored.delete(self.store.as_ref())?;
            return Err(error);
        }

        info!(application_id = %id, owners = stored.owners().len(), "application created");
        Ok(stored)
    }

    fn link_and_index(&self, id: ApplicationId, stored: &Application) -> Result<(), CatalogError> {
        self.store.replace_owners(id, &owner_ids(stored))?;
        if let Some(document) = stored.search_document(self.store.as_ref())? {
            self.index.add_to_index(Application::INDEX, document)?;
        }
        Ok(())
    }

    fn relink_and_reindex(
        &self,
        id: ApplicationId,
        application: &Application,
        before: Option<SearchDocument>,
    ) -> Result<(), CatalogError> {
        self.store.replace_owners(id, &owner_ids(application))?;

        let after = application.search_document(self.store.as_ref())?;
        if before == after {
            debug!(application_id = %id, "searchable fields unchanged, index left as is");
            return Ok(());
        }
        if let Some(document) = after {
            self.index.add_to_index(Application::INDEX, document)?;
        }
        Ok(())
    }
}

fn owner_ids(application: &Application) -> Vec<UserId> {
    application.owners().iter().map(|owner| owner.id).collect()
}

/// Error raised by the application catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("L'application {0} n'existe pas.")]
    NotFound(ApplicationId),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
}

impl From<FieldError> for CatalogError {
    fn from(error: FieldError) -> Self {
        Self::Validation(error.into())
    }
}
