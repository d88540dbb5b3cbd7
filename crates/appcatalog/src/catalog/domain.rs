use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Surrogate key of a stored application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

/// Surrogate key of a catalog user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Surrogate key of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(pub i64);

/// Surrogate key of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSourceId(pub i64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog user that may own applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut result = Map::new();
        result.insert("id".to_string(), json!(self.id.0));
        result.insert("email".to_string(), json!(self.email));
        result.insert("first_name".to_string(), json!(self.first_name));
        result.insert("last_name".to_string(), json!(self.last_name));
        result
    }
}

/// Organization an application belongs to. `value` is its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub value: String,
}

/// The two foreign-key roles a data source holds against an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceRole {
    /// `application_id`: the application the data source belongs to.
    Owned,
    /// `origin_application_id`: the application the data originates from.
    Origin,
}

/// Data source attached to applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub name: String,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
    #[serde(default)]
    pub origin_application_id: Option<ApplicationId>,
}

impl DataSource {
    pub fn application_for(&self, role: DataSourceRole) -> Option<ApplicationId> {
        match role {
            DataSourceRole::Owned => self.application_id,
            DataSourceRole::Origin => self.origin_application_id,
        }
    }

    pub fn to_dict(&self) -> Map<String, Value> {
        let mut result = Map::new();
        result.insert("id".to_string(), json!(self.id.0));
        result.insert("name".to_string(), json!(self.name));
        result.insert(
            "application_id".to_string(),
            json!(self.application_id.map(|id| id.0)),
        );
        result.insert(
            "origin_application_id".to_string(),
            json!(self.origin_application_id.map(|id| id.0)),
        );
        result
    }
}
