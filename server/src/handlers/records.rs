//! Catalog reads and edits.

use beanline_engine::{generator, DocumentStore, FieldChange, Record};

use crate::error::{AppError, Result};

/// Every record, newest first.
pub fn handle_list(store: &DocumentStore) -> Vec<Record> {
    store.list_records()
}

/// One record by id.
pub fn handle_get(store: &DocumentStore, id: &str) -> Result<Record> {
    store
        .get_record(id)
        .ok_or_else(|| AppError::NotFound(format!("record {}", id)))
}

/// Insert a freshly generated record.
pub async fn handle_create(store: &DocumentStore) -> Result<Record> {
    let record = store
        .create_record(|| generator::generate_record(&mut rand::thread_rng()))
        .await?;
    tracing::info!(record_id = %record.id, name = %record.name, "Created record");
    Ok(record)
}

/// Apply one field change to a record.
pub async fn handle_mutate(store: &DocumentStore, id: &str, change: FieldChange) -> Result<Record> {
    let record = store.mutate_field(id, change).await?;
    tracing::debug!(record_id = %record.id, "Mutated record");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beanline_engine::fixtures;

    fn store() -> DocumentStore {
        DocumentStore::init(&fixtures::seed_records(), None).unwrap()
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = store();
        let created = handle_create(&store).await.unwrap();

        assert_eq!(handle_list(&store)[0].id, created.id);
        assert_eq!(handle_get(&store, &created.id).unwrap(), created);
    }

    #[tokio::test]
    async fn missing_record() {
        let store = store();
        assert!(matches!(
            handle_get(&store, "ghost"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            handle_mutate(&store, "ghost", FieldChange::Stock { delta: 1 }).await,
            Err(AppError::Engine(_))
        ));
    }
}
