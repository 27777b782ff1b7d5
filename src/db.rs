use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{
    Client, Collection, Database as MongoDatabase,
    bson::{Bson, DateTime, Document, doc, oid::ObjectId, to_document},
};
use serde_json::Value;

use crate::config::CONFIG;
use crate::data_models::{AnalysisStatus, Report, SearchFilter};

/// Collection names as constants for consistency
pub mod collections {
    pub const REPORTS: &str = "reports";
}

/// Read/write access to the dashboard tables, as the search and report flows need it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `table` matching `filter`, in the store's natural order.
    async fn search(&self, table: &str, filter: &SearchFilter) -> Result<Vec<Value>>;

    /// Insert rows into `table`, returning how many were written.
    async fn insert_rows(&self, table: &str, rows: Vec<Value>) -> Result<usize>;

    async fn find_report(&self, id: &ObjectId) -> Result<Option<Report>>;

    /// Move the report to `processing` only if it is still in a startable
    /// status. Returns false when another run got there first.
    async fn begin_processing(&self, id: &ObjectId) -> Result<bool>;

    async fn set_report_status(
        &self,
        id: &ObjectId,
        status: AnalysisStatus,
        error: Option<&str>,
    ) -> Result<()>;
}

/// Main database wrapper providing connection management and collection access
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    /// Create a new Database instance with custom URI and database name.
    /// Useful for testing with a different database.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client_options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;

        let client =
            Client::with_options(client_options).context("Failed to create MongoDB client")?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        log::info!("Connected to MongoDB database: {}", db_name);

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Create a Database instance using environment configuration
    pub async fn from_config() -> Result<Self> {
        Self::new(&CONFIG.mongo_uri, &CONFIG.mongo_db_name).await
    }

    /// Get a typed collection by name
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.db.collection(name)
    }

    /// Get the underlying MongoDB client (for advanced operations)
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the underlying MongoDB database (for advanced operations)
    pub fn database(&self) -> &MongoDatabase {
        &self.db
    }

    pub fn reports(&self) -> Collection<Report> {
        self.collection(collections::REPORTS)
    }
}

/// Translate a [`SearchFilter`] into a MongoDB query: one case-insensitive
/// regex clause per (column, term) pair, OR-ed together. Terms are escaped
/// so `%`, `_`, `|` and friends match literally.
pub fn filter_document(filter: &SearchFilter) -> Document {
    let clauses: Vec<Bson> = filter
        .columns
        .iter()
        .flat_map(|column| {
            filter.terms.iter().map(move |term| {
                let mut clause = Document::new();
                clause.insert(
                    column.clone(),
                    doc! { "$regex": regex::escape(term), "$options": "i" },
                );
                Bson::Document(clause)
            })
        })
        .collect();

    if clauses.is_empty() {
        // Nothing to match against; never match rather than return the whole table.
        return doc! { "_id": { "$exists": false } };
    }
    doc! { "$or": clauses }
}

#[async_trait]
impl RecordStore for Database {
    async fn search(&self, table: &str, filter: &SearchFilter) -> Result<Vec<Value>> {
        let rows: Vec<Document> = self
            .collection::<Document>(table)
            .find(filter_document(filter))
            .limit(filter.limit)
            .await
            .with_context(|| format!("Failed to query {table}"))?
            .try_collect()
            .await
            .with_context(|| format!("Failed to collect rows from {table}"))?;

        Ok(rows
            .into_iter()
            .map(|row| Bson::Document(row).into_relaxed_extjson())
            .collect())
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Value>) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let docs = rows
            .iter()
            .map(to_document)
            .collect::<std::result::Result<Vec<Document>, _>>()
            .context("Row is not a JSON object")?;

        let result = self
            .collection::<Document>(table)
            .insert_many(docs)
            .await
            .with_context(|| format!("Failed to insert rows into {table}"))?;

        log::info!("inserted {} rows into {}", result.inserted_ids.len(), table);
        Ok(result.inserted_ids.len())
    }

    async fn find_report(&self, id: &ObjectId) -> Result<Option<Report>> {
        self.reports()
            .find_one(doc! { "_id": *id })
            .await
            .context("Failed to find report by id")
    }

    async fn begin_processing(&self, id: &ObjectId) -> Result<bool> {
        let startable: Vec<&str> = AnalysisStatus::startable()
            .iter()
            .map(AnalysisStatus::as_str)
            .collect();
        let result = self
            .reports()
            .update_one(
                doc! { "_id": *id, "analysis_status": { "$in": startable } },
                doc! {
                    "$set": {
                        "analysis_status": AnalysisStatus::Processing.as_str(),
                        "analysis_error": Bson::Null,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await
            .context("Failed to start report processing")?;

        let started = result.modified_count == 1;
        if started {
            log::info!("report {} -> {}", id, AnalysisStatus::Processing);
        }
        Ok(started)
    }

    async fn set_report_status(
        &self,
        id: &ObjectId,
        status: AnalysisStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let update = doc! {
            "$set": {
                "analysis_status": status.as_str(),
                "analysis_error": error,
                "updated_at": DateTime::now(),
            }
        };
        let result = self
            .reports()
            .update_one(doc! { "_id": *id }, update)
            .await
            .context("Failed to update report status")?;

        if result.matched_count == 0 {
            anyhow::bail!("report {id} not found");
        }
        log::info!("report {} -> {}", id, status);
        Ok(())
    }
}

// =============================================================================
// Test utilities
// =============================================================================
