//! Source adapter types and traits

use crate::decode::{DecoderConfig, DecoderFormat};
use crate::error::Result;
use crate::http::HttpSettings;
use crate::types::JsonValue;
use crate::validate::RawRecord;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Lazy, finite sequence of raw records; the end of the stream is the end
/// of the source
pub type RecordStream = BoxStream<'static, Result<RawRecord>>;

/// Yields raw records for one entity kind from one physical source
///
/// Adapters never validate. `open` may be called again after a failure to
/// restart from the beginning. An unreachable source is reported as
/// [`Error::SourceUnavailable`](crate::Error::SourceUnavailable) or another
/// error for which `is_source_unavailable()` holds.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human-readable location, for logs and summaries
    fn describe(&self) -> String;

    /// Start reading from the beginning
    async fn open(&self) -> Result<RecordStream>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Where the records of one entity kind come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Local file
    File {
        path: String,
        #[serde(flatten)]
        document: DocumentOptions,
    },
    /// Object in S3, GCS, Azure or a `file://` URL
    ObjectStore {
        url: String,
        #[serde(flatten)]
        document: DocumentOptions,
    },
    /// Document downloaded over HTTP(S)
    Http {
        url: String,
        #[serde(flatten)]
        document: DocumentOptions,
        #[serde(default)]
        http: HttpSettings,
    },
    /// Count endpoint followed by one detail request per index
    Api(ApiConfig),
    /// Table or query in an external database
    Database(DatabaseConfig),
    /// Records written directly in the pipeline config
    Inline { records: Vec<JsonValue> },
}

impl SourceConfig {
    /// Short source type name
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::File { .. } => "file",
            SourceConfig::ObjectStore { .. } => "object_store",
            SourceConfig::Http { .. } => "http",
            SourceConfig::Api(_) => "api",
            SourceConfig::Database(_) => "database",
            SourceConfig::Inline { .. } => "inline",
        }
    }
}

/// Format options of a document source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOptions {
    /// Document format; inferred from the extension when absent
    #[serde(default)]
    pub format: Option<DecoderFormat>,
    /// Dot path to the records inside a JSON document
    #[serde(default)]
    pub record_path: Option<String>,
    /// CSV delimiter
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Whether the CSV has a header row
    #[serde(default)]
    pub has_header: Option<bool>,
}

impl DocumentOptions {
    /// Decoder configuration for a document at `location`
    pub fn decoder_config(&self, location: &str) -> Result<DecoderConfig> {
        let format = match self.format {
            Some(format) => format,
            None => {
                let path = location.split(['?', '#']).next().unwrap_or(location);
                DecoderFormat::from_path(path)?
            }
        };
        let defaults = DecoderConfig::default();
        Ok(DecoderConfig {
            format,
            record_path: self.record_path.clone(),
            delimiter: self.delimiter.unwrap_or(defaults.delimiter),
            has_header: self.has_header.unwrap_or(defaults.has_header),
        })
    }
}

/// Paginated store API
///
/// `count_url` returns a JSON object whose `count_field` holds the number of
/// items; `detail_url` is requested once per index with `{{ store_number }}`
/// substituted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// URL returning the item count
    pub count_url: String,
    /// Field of the count response holding the count
    #[serde(default = "default_count_field")]
    pub count_field: String,
    /// URL template of one item
    pub detail_url: String,
    /// Placeholder name substituted in `detail_url`
    #[serde(default = "default_index_var")]
    pub index_var: String,
    /// First index requested
    #[serde(default = "default_first_index")]
    pub first_index: u64,
    /// Largest count accepted from `count_url`
    #[serde(default = "default_max_items")]
    pub max_items: u64,
    /// Dot path to the record inside a detail response
    #[serde(default)]
    pub record_path: Option<String>,
    /// Skip detail requests that fail instead of failing the source
    #[serde(default = "default_true")]
    pub skip_failed: bool,
    /// Detail requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// HTTP settings (headers carry the API key)
    #[serde(default)]
    pub http: HttpSettings,
}

fn default_count_field() -> String {
    "number_stores".to_string()
}

fn default_index_var() -> String {
    "store_number".to_string()
}

fn default_first_index() -> u64 {
    1
}

fn default_max_items() -> u64 {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

/// Database engines reachable through DuckDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// PostgreSQL (via the `postgres` extension)
    Postgres,
    /// MySQL (via the `mysql` extension)
    Mysql,
    /// SQLite file (via the `sqlite` extension)
    Sqlite,
    /// DuckDB file
    Duckdb,
}

impl DatabaseKind {
    /// DuckDB extension needed to attach this engine
    pub fn extension(self) -> Option<&'static str> {
        match self {
            DatabaseKind::Postgres => Some("postgres"),
            DatabaseKind::Mysql => Some("mysql"),
            DatabaseKind::Sqlite => Some("sqlite"),
            DatabaseKind::Duckdb => None,
        }
    }

    /// `TYPE` clause of the `ATTACH` statement
    pub fn attach_type(self) -> Option<&'static str> {
        match self {
            DatabaseKind::Postgres => Some("POSTGRES"),
            DatabaseKind::Mysql => Some("MYSQL"),
            DatabaseKind::Sqlite => Some("SQLITE"),
            DatabaseKind::Duckdb => None,
        }
    }

    fn default_port(self) -> u16 {
        match self {
            DatabaseKind::Postgres => 5432,
            DatabaseKind::Mysql => 3306,
            DatabaseKind::Sqlite | DatabaseKind::Duckdb => 0,
        }
    }
}

/// Connection settings of an external database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConnection {
    /// Database engine
    pub engine: DatabaseKind,
    /// Full connection string; overrides the individual fields
    #[serde(default)]
    pub connection_string: Option<String>,
    /// Host name
    #[serde(default)]
    pub host: Option<String>,
    /// Port
    #[serde(default)]
    pub port: Option<u16>,
    /// User name
    #[serde(default)]
    pub user: Option<String>,
    /// Password
    #[serde(default)]
    pub password: Option<String>,
    /// Database name, or file path for SQLite and DuckDB
    #[serde(default)]
    pub database: Option<String>,
}

impl DatabaseConnection {
    /// Connection string handed to `ATTACH`
    pub fn connection_string(&self) -> String {
        if let Some(ref conn) = self.connection_string {
            return conn.clone();
        }

        let host = self.host.as_deref().unwrap_or("localhost");
        let user = self.user.as_deref().unwrap_or("postgres");
        let password = self.password.as_deref().unwrap_or_default();
        let database = self.database.as_deref().unwrap_or("postgres");
        let port = self.port.unwrap_or(self.engine.default_port());

        match self.engine {
            DatabaseKind::Postgres => {
                format!("postgresql://{user}:{password}@{host}:{port}/{database}")
            }
            DatabaseKind::Mysql => format!("mysql://{user}:{password}@{host}:{port}/{database}"),
            DatabaseKind::Sqlite | DatabaseKind::Duckdb => database.to_string(),
        }
    }

    /// Connection string with the password masked
    pub fn redacted(&self) -> String {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => {
                self.connection_string().replace(password, "***")
            }
            _ => self.connection_string(),
        }
    }
}

/// A table or query in an external database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection settings
    #[serde(flatten)]
    pub connection: DatabaseConnection,
    /// Table to read in full
    #[serde(default)]
    pub table: Option<String>,
    /// Query to run instead of a table scan (tables are `source_db.<name>`)
    #[serde(default)]
    pub query: Option<String>,
}
