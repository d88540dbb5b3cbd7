use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;

use super::application::Application;
use super::domain::{
    ApplicationId, DataSource, DataSourceRole, Organization, OrganizationId, User, UserId,
};
use super::normalizer::remove_accent;
use super::repository::{
    ApplicationRepository, DataSourceRepository, OrganizationDirectory, OwnershipRepository,
    RepositoryError, UserDirectory,
};
use super::search::{SearchDocument, SearchError, SearchIndex};

/// Collaborator rows preloaded into a store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
}

#[derive(Debug, Default)]
struct Tables {
    applications: BTreeMap<ApplicationId, Application>,
    ownerships: BTreeSet<(UserId, ApplicationId)>,
    users: BTreeMap<UserId, User>,
    organizations: BTreeMap<OrganizationId, Organization>,
    data_sources: Vec<DataSource>,
    next_application_id: i64,
}

impl Tables {
    fn with_owners(&self, mut application: Application) -> Application {
        let owners = application
            .id()
            .map(|id| {
                self.ownerships
                    .iter()
                    .filter(|(_, application_id)| *application_id == id)
                    .filter_map(|(user_id, _)| self.users.get(user_id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        application.set_owners(owners);
        application
    }
}

/// In-process storage for every catalog table. A single lock covers all
/// tables, so each call is atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        {
            let mut tables = store.lock();
            for organization in seed.organizations {
                tables.organizations.insert(organization.id, organization);
            }
            for user in seed.users {
                tables.users.insert(user.id, user);
            }
            tables.data_sources = seed.data_sources;
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("catalog store mutex poisoned")
    }
}

impl ApplicationRepository for MemoryCatalogStore {
    fn insert(&self, mut application: Application) -> Result<Application, RepositoryError> {
        let mut tables = self.lock();
        let id = match application.id() {
            Some(id) if tables.applications.contains_key(&id) => {
                return Err(RepositoryError::Conflict)
            }
            Some(id) => id,
            None => tables
                .next_application_id
                .checked_add(1)
                .map(ApplicationId)
                .ok_or(RepositoryError::IdsExhausted)?,
        };
        tables.next_application_id = tables.next_application_id.max(id.0);

        application.set_id(Some(id));
        let owners = application.owners().to_vec();
        let mut row = application.clone();
        row.set_owners(Vec::new());
        tables.applications.insert(id, row);
        application.set_owners(owners);
        Ok(application)
    }

    fn update(&self, mut application: Application) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        let id = application.id().ok_or(RepositoryError::NotFound)?;
        if !tables.applications.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        application.set_owners(Vec::new());
        tables.applications.insert(id, application);
        Ok(())
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .applications
            .get(&id)
            .cloned()
            .map(|application| tables.with_owners(application)))
    }

    fn list(&self) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .applications
            .values()
            .cloned()
            .map(|application| tables.with_owners(application))
            .collect())
    }

    fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError> {
        self.lock()
            .applications
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn delete_all(&self) -> Result<usize, RepositoryError> {
        let mut tables = self.lock();
        let removed = tables.applications.len();
        tables.applications.clear();
        Ok(removed)
    }
}

impl OwnershipRepository for MemoryCatalogStore {
    fn link(&self, user: UserId, application: ApplicationId) -> Result<(), RepositoryError> {
        if self.lock().ownerships.insert((user, application)) {
            Ok(())
        } else {
            Err(RepositoryError::Conflict)
        }
    }

    fn replace_owners(
        &self,
        application: ApplicationId,
        owners: &[UserId],
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        tables
            .ownerships
            .retain(|(_, application_id)| *application_id != application);
        for owner in owners {
            tables.ownerships.insert((*owner, application));
        }
        Ok(())
    }

    fn owners_of(&self, application: ApplicationId) -> Result<Vec<UserId>, RepositoryError> {
        Ok(self
            .lock()
            .ownerships
            .iter()
            .filter(|(_, application_id)| *application_id == application)
            .map(|(user_id, _)| *user_id)
            .collect())
    }

    fn remove_application(&self, application: ApplicationId) -> Result<usize, RepositoryError> {
        let mut tables = self.lock();
        let before = tables.ownerships.len();
        tables
            .ownerships
            .retain(|(_, application_id)| *application_id != application);
        Ok(before - tables.ownerships.len())
    }

    fn clear(&self) -> Result<usize, RepositoryError> {
        let mut tables = self.lock();
        let removed = tables.ownerships.len();
        tables.ownerships.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock().ownerships.len())
    }
}

impl UserDirectory for MemoryCatalogStore {
    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }
}

impl OrganizationDirectory for MemoryCatalogStore {
    fn organization(&self, id: OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        Ok(self.lock().organizations.get(&id).cloned())
    }

    fn organization_by_value(&self, value: &str) -> Result<Option<Organization>, RepositoryError> {
        Ok(self
            .lock()
            .organizations
            .values()
            .find(|organization| organization.value == value)
            .cloned())
    }
}

impl DataSourceRepository for MemoryCatalogStore {
    fn data_sources_for(
        &self,
        application: ApplicationId,
        role: DataSourceRole,
    ) -> Result<Vec<DataSource>, RepositoryError> {
        Ok(self
            .lock()
            .data_sources
            .iter()
            .filter(|data_source| data_source.application_for(role) == Some(application))
            .cloned()
            .collect())
    }
}

/// Naive search index: a document matches when every term of the expression
/// appears, accent and case insensitive, in one of its fields.
#[derive(Debug, Clone, Default)]
pub struct MemorySearchIndex {
    indexes: Arc<Mutex<HashMap<String, BTreeMap<i64, SearchDocument>>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, index: &str, id: i64) -> Option<SearchDocument> {
        self.indexes
            .lock()
            .expect("search index mutex poisoned")
            .get(index)
            .and_then(|documents| documents.get(&id).cloned())
    }

    pub fn len(&self, index: &str) -> usize {
        self.indexes
            .lock()
            .expect("search index mutex poisoned")
            .get(index)
            .map_or(0, BTreeMap::len)
    }
}

impl SearchIndex for MemorySearchIndex {
    fn add_to_index(&self, index: &str, document: SearchDocument) -> Result<(), SearchError> {
        self.indexes
            .lock()
            .expect("search index mutex poisoned")
            .entry(index.to_string())
            .or_default()
            .insert(document.id, document);
        Ok(())
    }

    fn remove_from_index(&self, index: &str, id: i64) -> Result<(), SearchError> {
        if let Some(documents) = self
            .indexes
            .lock()
            .expect("search index mutex poisoned")
            .get_mut(index)
        {
            documents.remove(&id);
        }
        Ok(())
    }

    fn clear_index(&self, index: &str) -> Result<(), SearchError> {
        self.indexes
            .lock()
            .expect("search index mutex poisoned")
            .remove(index);
        Ok(())
    }

    fn query(&self, index: &str, expression: &str) -> Result<Vec<i64>, SearchError> {
        let terms: Vec<String> = remove_accent(expression)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let indexes = self.indexes.lock().expect("search index mutex poisoned");
        let Some(documents) = indexes.get(index) else {
            return Ok(Vec::new());
        };

        Ok(documents
            .values()
            .filter(|document| {
                let haystack: Vec<String> =
                    document.fields.values().map(|text| remove_accent(text)).collect();
                terms
                    .iter()
                    .all(|term| haystack.iter().any(|text| text.contains(term.as_str())))
            })
            .map(|document| document.id)
            .collect())
    }
}
