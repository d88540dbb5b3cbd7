use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::application::DictOptions;
use super::domain::ApplicationId;
use super::repository::{CatalogStore, RepositoryError};
use super::search::SearchIndex;
use super::service::{ApplicationService, CatalogError};
use super::value::Record;

type SharedService<S, I> = Arc<ApplicationService<S, I>>;

/// Router builder exposing the application catalog over HTTP.
pub fn catalog_router<S, I>(service: SharedService<S, I>) -> Router
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            get(list_handler::<S, I>)
                .post(create_handler::<S, I>)
                .delete(delete_all_handler::<S, I>),
        )
        .route("/api/v1/applications/search", get(search_handler::<S, I>))
        .route("/api/v1/applications/export", get(export_handler::<S, I>))
        .route("/api/v1/applications/import", post(import_handler::<S, I>))
        .route(
            "/api/v1/applications/:application_id",
            get(get_handler::<S, I>)
                .put(update_handler::<S, I>)
                .delete(delete_handler::<S, I>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
}

/// JSON body to dictionary. Date strings are parsed here so the entity only
/// ever sees real dates.
fn record_from_body(body: Map<String, Value>) -> Result<Record, CatalogError> {
    let mut record = Record::from_json(body)?;
    record.parse_validation_date();
    Ok(record)
}

pub(crate) async fn list_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Query(options): Query<DictOptions>,
) -> Result<Json<Vec<Map<String, Value>>>, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let mut rendered = Vec::new();
    for application in service.list()? {
        rendered.push(service.render(&application, options)?);
    }
    Ok(Json(rendered))
}

pub(crate) async fn create_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Response, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let record = record_from_body(body)?;
    let application = service.create(&record)?;
    let rendered = service.render(&application, DictOptions::default())?;
    Ok((StatusCode::CREATED, Json(rendered)).into_response())
}

pub(crate) async fn get_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Path(application_id): Path<i64>,
    Query(options): Query<DictOptions>,
) -> Result<Json<Map<String, Value>>, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let application = service.get(ApplicationId(application_id))?;
    Ok(Json(service.render(&application, options)?))
}

pub(crate) async fn update_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Path(application_id): Path<i64>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Map<String, Value>>, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let record = record_from_body(body)?;
    let application = service.update(ApplicationId(application_id), &record)?;
    Ok(Json(service.render(&application, DictOptions::default())?))
}

pub(crate) async fn delete_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Path(application_id): Path<i64>,
) -> Result<StatusCode, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    service.delete(ApplicationId(application_id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn delete_all_handler<S, I>(
    State(service): State<SharedService<S, I>>,
) -> Result<Json<Value>, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let deleted = service.delete_all()?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub(crate) async fn search_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Map<String, Value>>>, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let mut rendered = Vec::new();
    for application in service.search(&params.q)? {
        rendered.push(service.render(&application, DictOptions::default())?);
    }
    Ok(Json(rendered))
}

pub(crate) async fn export_handler<S, I>(
    State(service): State<SharedService<S, I>>,
) -> Result<Response, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let mut buffer = Vec::new();
    service.export_csv(&mut buffer)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        buffer,
    )
        .into_response())
}

pub(crate) async fn import_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    body: String,
) -> Result<Response, CatalogError>
where
    S: CatalogStore + 'static,
    I: SearchIndex + 'static,
{
    let report = service.import_csv(body.as_bytes())?;
    let status = if report.is_clean() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(report)).into_response())
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogError::Validation(_) | CatalogError::Resolution(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CatalogError::NotFound(_) | CatalogError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            CatalogError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            CatalogError::Csv(_) => StatusCode::BAD_REQUEST,
            CatalogError::Repository(RepositoryError::Unavailable(_))
            | CatalogError::Repository(RepositoryError::IdsExhausted)
            | CatalogError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut payload = json!({ "error": self.to_string() });
        if let CatalogError::Validation(errors) = &self {
            let fields: Map<String, Value> = errors
                .errors()
                .iter()
                .map(|error| (error.field.key().to_string(), json!(error.message())))
                .collect();
            payload["fields"] = Value::Object(fields);
        }

        (status, Json(payload)).into_response()
    }
}
