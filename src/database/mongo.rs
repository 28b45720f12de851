use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};

use super::{RecordStore, StoreError, Table};

const DUPLICATE_KEY: i32 = 11000;
// Same index name already defined with other options or keys
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;

fn is_duplicate_key(code: i32) -> bool {
    code == DUPLICATE_KEY
}

/// Only a pre-existing index definition is tolerated.
fn is_existing_index(code: i32) -> bool {
    matches!(code, INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT)
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn new(uri: &str) -> Result<Self, StoreError> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri)
            .await
            .map_err(map_error)?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        // The store enforces its own per-call timeouts; they surface as transient errors.
        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options).map_err(map_error)?;

        // Extract database name from URI or use default
        let db_name = uri
            .split('/')
            .last()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("CourseMarket");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await.map_err(map_error)?;

        let store = Self { db };
        store.ensure_indexes().await?;

        Ok(store)
    }

    /// Key indexes, the unique email index and the instructor secondary index.
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        log::info!("🔧 Creating database indexes...");

        for table in [Table::Users, Table::Courses, Table::Books] {
            self.create_index(table, table.key_field(), true).await?;
            for field in table.unique_fields() {
                self.create_index(table, field, true).await?;
            }
        }

        // Multikey index over the instructor ID array: instructor -> courses lookup
        self.create_index(Table::Courses, "course_instructor_ids", false).await?;

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    async fn create_index(&self, table: Table, field: &str, unique: bool) -> Result<(), StoreError> {
        let mut keys = Document::new();
        keys.insert(field, 1);

        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(unique).build())
            .build();

        match self.collection(table).create_index(index).await {
            Ok(_) => {
                log::info!("   ✅ Index created: {}({})", table.name(), field);
                Ok(())
            }
            Err(e) => match *e.kind {
                ErrorKind::Command(ref command) if is_existing_index(command.code) => {
                    log::debug!("   ℹ️  Index already exists: {}", e);
                    Ok(())
                }
                _ => {
                    log::error!("❌ Index {}({}) could not be built: {}", table.name(), field, e);
                    Err(map_error(e))
                }
            },
        }
    }

    fn collection(&self, table: Table) -> Collection<Document> {
        self.db.collection(table.name())
    }
}

fn key_filter(table: Table, key: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(table.key_field(), key);
    filter
}

fn map_error(err: mongodb::error::Error) -> StoreError {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if is_duplicate_key(write_error.code) => {
            StoreError::Conflict(format!("duplicate key: {}", write_error.message))
        }
        // find_one_and_update reports duplicates as a command error
        ErrorKind::Command(ref command) if is_duplicate_key(command.code) => {
            StoreError::Conflict(format!("duplicate key: {}", command.message))
        }
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Transient(err.to_string())
        }
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::Serialization(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await.map_err(map_error)?;
        Ok(())
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Document>, StoreError> {
        self.collection(table)
            .find_one(key_filter(table, key))
            .projection(doc! { "_id": 0 })
            .await
            .map_err(map_error)
    }

    async fn put(&self, table: Table, item: Document) -> Result<(), StoreError> {
        let key = item
            .get_str(table.key_field())
            .map_err(|e| StoreError::Serialization(format!("{} missing: {}", table.key_field(), e)))?
            .to_string();

        self.collection(table)
            .replace_one(key_filter(table, &key), item)
            .upsert(true)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn scan(&self, table: Table) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection(table)
            .find(doc! {})
            .projection(doc! { "_id": 0 })
            .await
            .map_err(map_error)?;
        cursor.try_collect().await.map_err(map_error)
    }

    async fn find_by(&self, table: Table, field: &str, value: &str) -> Result<Vec<Document>, StoreError> {
        // An equality match on an array field matches any element.
        let mut filter = Document::new();
        filter.insert(field, value);

        let cursor = self
            .collection(table)
            .find(filter)
            .projection(doc! { "_id": 0 })
            .await
            .map_err(map_error)?;
        cursor.try_collect().await.map_err(map_error)
    }

    async fn update_fields(
        &self,
        table: Table,
        key: &str,
        fields: Document,
    ) -> Result<Option<Document>, StoreError> {
        if fields.is_empty() {
            return self.get(table, key).await;
        }

        self.collection(table)
            .find_one_and_update(key_filter(table, key), doc! { "$set": fields })
            .projection(doc! { "_id": 0 })
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_error)
    }

    async fn delete(&self, table: Table, key: &str) -> Result<bool, StoreError> {
        let result = self
            .collection(table)
            .delete_one(key_filter(table, key))
            .await
            .map_err(map_error)?;
        Ok(result.deleted_count > 0)
    }
}
