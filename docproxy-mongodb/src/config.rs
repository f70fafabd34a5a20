//! Connection settings for the MongoDB backend.

use serde::Deserialize;

use docproxy_core::error::{DocumentStoreError, DocumentStoreResult};

/// Environment variable holding the connection string.
pub const URI_VAR: &str = "DOCPROXY_MONGODB_URI";
/// Environment variable holding the database name.
pub const DATABASE_VAR: &str = "DOCPROXY_MONGODB_DATABASE";
/// Environment variable holding the optional application name.
pub const APP_NAME_VAR: &str = "DOCPROXY_MONGODB_APP_NAME";

/// Where and how to connect.
///
/// Can be deserialized from any serde format, or read from the environment
/// with [`MongoDbConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MongoDbConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    /// Database holding the collections.
    pub database: String,
    /// Application name reported to the server.
    #[serde(default)]
    pub app_name: Option<String>,
}

impl MongoDbConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            app_name: None,
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Reads the configuration from `DOCPROXY_MONGODB_URI`, `DOCPROXY_MONGODB_DATABASE`
    /// and, optionally, `DOCPROXY_MONGODB_APP_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if a required variable is unset.
    pub fn from_env() -> DocumentStoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocumentStoreResult<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| {
                DocumentStoreError::Initialization(format!("environment variable {name} is not set"))
            })
        };

        Ok(Self {
            uri: required(URI_VAR)?,
            database: required(DATABASE_VAR)?,
            app_name: lookup(APP_NAME_VAR),
        })
    }
}
