use std::collections::BTreeMap;

use serde::Serialize;

use super::application::Application;
use super::repository::{OrganizationDirectory, RepositoryError};
use super::validation::ApplicationField;

/// Entities whose textual fields feed a search index. The entity only
/// declares what is indexed; the index itself is an external collaborator.
pub trait Searchable {
    const INDEX: &'static str;
    const SEARCHABLE_FIELDS: &'static [ApplicationField];

    fn search_id(&self) -> Option<i64>;

    fn search_document<D>(&self, directory: &D) -> Result<Option<SearchDocument>, RepositoryError>
    where
        D: OrganizationDirectory + ?Sized;
}

impl Searchable for Application {
    const INDEX: &'static str = "application";
    const SEARCHABLE_FIELDS: &'static [ApplicationField] = &[
        ApplicationField::Name,
        ApplicationField::PotentialExperimentation,
        ApplicationField::Goals,
        ApplicationField::OrganizationName,
    ];

    fn search_id(&self) -> Option<i64> {
        self.id().map(|id| id.0)
    }

    /// `None` until the application has been stored.
    fn search_document<D>(&self, directory: &D) -> Result<Option<SearchDocument>, RepositoryError>
    where
        D: OrganizationDirectory + ?Sized,
    {
        let Some(id) = self.search_id() else {
            return Ok(None);
        };

        let mut fields = BTreeMap::new();
        for field in Self::SEARCHABLE_FIELDS {
            let value = match field {
                ApplicationField::Name => self.name().map(str::to_string),
                ApplicationField::PotentialExperimentation => {
                    self.potential_experimentation().map(str::to_string)
                }
                ApplicationField::Goals => self.goals().map(str::to_string),
                ApplicationField::OrganizationName => self.organization_name(directory)?,
                _ => None,
            };
            fields.insert(field.key(), value.unwrap_or_default());
        }
        Ok(Some(SearchDocument { id, fields }))
    }
}

/// Indexed text of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchDocument {
    pub id: i64,
    pub fields: BTreeMap<&'static str, String>,
}

/// Outbound hooks towards the full-text search engine.
pub trait SearchIndex: Send + Sync {
    fn add_to_index(&self, index: &str, document: SearchDocument) -> Result<(), SearchError>;
    fn remove_from_index(&self, index: &str, id: i64) -> Result<(), SearchError>;
    fn clear_index(&self, index: &str) -> Result<(), SearchError>;
    /// Ids of the matching documents, best match first.
    fn query(&self, index: &str, expression: &str) -> Result<Vec<i64>, SearchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),
}
