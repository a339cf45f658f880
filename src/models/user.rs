use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person who can be assigned as the handler of a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_driver: bool,
    #[serde(default)]
    pub is_admin: bool,
    pub timestamp_created: DateTime<Utc>,
    pub timestamp_updated: DateTime<Utc>,
}
