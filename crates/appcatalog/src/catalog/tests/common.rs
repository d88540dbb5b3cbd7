use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::catalog::domain::{
    ApplicationId, DataSource, DataSourceId, Organization, OrganizationId, User, UserId,
};
use crate::catalog::memory::{MemoryCatalogStore, MemorySearchIndex, SeedData};
use crate::catalog::search::{SearchDocument, SearchError, SearchIndex};
use crate::catalog::service::ApplicationService;
use crate::catalog::value::{FieldValue, OwnerRef, Record};

pub(super) type MemoryService = ApplicationService<MemoryCatalogStore, MemorySearchIndex>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn user(id: i64, first_name: &str, last_name: &str, email: &str) -> User {
    User {
        id: UserId(id),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    }
}

pub(super) fn users() -> Vec<User> {
    vec![
        user(1, "Zoé", "Zola", "zoe.zola@insee.fr"),
        user(2, "Louis", "Émery", "louis.emery@insee.fr"),
        user(3, "Nina", "Durand", "nina.durand@dinum.gouv.fr"),
        user(4, "Paul", "Eboué", "paul.eboue@dinum.gouv.fr"),
    ]
}

pub(super) fn data_source(
    id: i64,
    name: &str,
    application: Option<i64>,
    origin: Option<i64>,
) -> DataSource {
    DataSource {
        id: DataSourceId(id),
        name: name.to_string(),
        application_id: application.map(ApplicationId),
        origin_application_id: origin.map(ApplicationId),
    }
}

/// Data sources reference application 1, the first one a fresh store assigns.
pub(super) fn seed() -> SeedData {
    SeedData {
        organizations: vec![
            Organization {
                id: OrganizationId(1),
                value: "DINUM".to_string(),
            },
            Organization {
                id: OrganizationId(2),
                value: "Insee".to_string(),
            },
            Organization {
                id: OrganizationId(3),
                value: "Météo-France".to_string(),
            },
        ],
        users: users(),
        data_sources: vec![
            data_source(10, "Sirene", Some(1), None),
            data_source(11, "État civil", Some(1), None),
            data_source(12, "Base adresse", Some(1), None),
            data_source(13, "Cadastre", None, Some(1)),
        ],
    }
}

pub(super) fn store() -> MemoryCatalogStore {
    MemoryCatalogStore::from_seed(seed())
}

pub(super) fn build_service() -> (MemoryService, Arc<MemoryCatalogStore>, Arc<MemorySearchIndex>) {
    let store = Arc::new(store());
    let index = Arc::new(MemorySearchIndex::default());
    let service = ApplicationService::new(store.clone(), index.clone());
    (service, store, index)
}

pub(super) fn owner_ids(ids: &[i64]) -> FieldValue {
    FieldValue::Owners(ids.iter().map(|id| OwnerRef::Id(UserId(*id))).collect())
}

/// A complete, valid application dictionary.
pub(super) fn application_record() -> Record {
    Record::new()
        .with("name", "Répertoire des entreprises")
        .with("organization_name", "Insee")
        .with("goals", "Identifier les entreprises et leurs établissements")
        .with("potential_experimentation", "Croisement avec les données fiscales")
        .with("access_url", "https://sirene.insee.fr")
        .with("operator_count", "12")
        .with("operator_count_comment", "agents instructeurs")
        .with("user_count", 340_i64)
        .with("user_count_comment", "estimation")
        .with("monthly_connection_count", 0_i64)
        .with("monthly_connection_count_comment", "non suivi")
        .with("context_email", "contact@insee.fr")
        .with("validation_date", date(2021, 3, 5))
        .with("historic", "2004")
        .with("owners", owner_ids(&[1, 3]))
}

#[derive(Default)]
pub(super) struct RecordingIndex {
    inner: MemorySearchIndex,
    operations: Mutex<Vec<String>>,
}

impl RecordingIndex {
    pub(super) fn operations(&self) -> Vec<String> {
        self.operations.lock().expect("index mutex poisoned").clone()
    }

    fn record(&self, operation: String) {
        self.operations
            .lock()
            .expect("index mutex poisoned")
            .push(operation);
    }
}

impl SearchIndex for RecordingIndex {
    fn add_to_index(&self, index: &str, document: SearchDocument) -> Result<(), SearchError> {
        self.record(format!("add {index} {}", document.id));
        self.inner.add_to_index(index, document)
    }

    fn remove_from_index(&self, index: &str, id: i64) -> Result<(), SearchError> {
        self.record(format!("remove {index} {id}"));
        self.inner.remove_from_index(index, id)
    }

    fn clear_index(&self, index: &str) -> Result<(), SearchError> {
        self.record(format!("clear {index}"));
        self.inner.clear_index(index)
    }

    fn query(&self, index: &str, expression: &str) -> Result<Vec<i64>, SearchError> {
        self.inner.query(index, expression)
    }
}

pub(super) struct UnavailableIndex;

impl SearchIndex for UnavailableIndex {
    fn add_to_index(&self, _index: &str, _document: SearchDocument) -> Result<(), SearchError> {
        Err(SearchError::Unavailable("search cluster offline".to_string()))
    }

    fn remove_from_index(&self, _index: &str, _id: i64) -> Result<(), SearchError> {
        Err(SearchError::Unavailable("search cluster offline".to_string()))
    }

    fn clear_index(&self, _index: &str) -> Result<(), SearchError> {
        Err(SearchError::Unavailable("search cluster offline".to_string()))
    }

    fn query(&self, _index: &str, _expression: &str) -> Result<Vec<i64>, SearchError> {
        Err(SearchError::Unavailable("search cluster offline".to_string()))
    }
}

pub(super) fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json payload")
}
