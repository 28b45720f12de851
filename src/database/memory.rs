use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;
use std::sync::RwLock;

use super::{RecordStore, StoreError, Table};

/// Process-local record store (`STORE_BACKEND=memory`).
///
/// Keeps insertion order per table so scans are deterministic, and enforces the
/// same unique fields as the MongoDB indexes.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

fn key_of(table: Table, doc: &Document) -> Result<String, StoreError> {
    doc.get_str(table.key_field())
        .map(str::to_string)
        .map_err(|e| StoreError::Serialization(format!("{} missing: {}", table.key_field(), e)))
}

fn field_matches(doc: &Document, field: &str, value: &str) -> bool {
    match doc.get(field) {
        Some(Bson::String(s)) => s == value,
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Bson::String(s) if s == value)),
        _ => false,
    }
}

fn check_unique(table: Table, rows: &[Document], candidate: &Document, key: &str) -> Result<(), StoreError> {
    for field in table.unique_fields() {
        let Some(value) = candidate.get(*field) else { continue };
        let clash = rows.iter().any(|row| {
            row.get_str(table.key_field()).ok() != Some(key) && row.get(*field) == Some(value)
        });
        if clash {
            return Err(StoreError::Conflict(format!("duplicate key: {}.{}", table.name(), field)));
        }
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().map_err(lock_error)?;
        Ok(tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|row| row.get_str(table.key_field()).ok() == Some(key)))
            .cloned())
    }

    async fn put(&self, table: Table, item: Document) -> Result<(), StoreError> {
        let key = key_of(table, &item)?;
        let mut tables = self.tables.write().map_err(lock_error)?;
        let rows = tables.entry(table).or_default();

        check_unique(table, rows, &item, &key)?;

        match rows
            .iter()
            .position(|row| row.get_str(table.key_field()).ok() == Some(key.as_str()))
        {
            Some(position) => rows[position] = item,
            None => rows.push(item),
        }
        Ok(())
    }

    async fn scan(&self, table: Table) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().map_err(lock_error)?;
        Ok(tables.get(&table).cloned().unwrap_or_default())
    }

    async fn find_by(&self, table: Table, field: &str, value: &str) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().map_err(lock_error)?;
        Ok(tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| field_matches(row, field, value)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_fields(
        &self,
        table: Table,
        key: &str,
        fields: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut tables = self.tables.write().map_err(lock_error)?;
        let rows = tables.entry(table).or_default();

        let Some(position) = rows
            .iter()
            .position(|row| row.get_str(table.key_field()).ok() == Some(key))
        else {
            return Ok(None);
        };

        let mut updated = rows[position].clone();
        for (field, value) in fields {
            updated.insert(field, value);
        }
        check_unique(table, rows, &updated, key)?;

        rows[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, table: Table, key: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().map_err(lock_error)?;
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| row.get_str(table.key_field()).ok() != Some(key));
        Ok(rows.len() < before)
    }
}
