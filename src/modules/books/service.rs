//! The five book operations.
//!
//! Each operation validates its input, then issues exactly one store call.
//! Ids are parsed before the store is touched, so a malformed id never costs a
//! round-trip.

use std::sync::Arc;

use mongodb::bson::oid::ObjectId;

use super::error::{BookError, ValidationError};
use super::models::{Book, CreateBook, DeleteAck, InsertAck, UpdateAck, UpdateBook};
use super::store::BookStore;

/// Parse a raw path id into an `ObjectId`.
pub fn parse_id(raw: &str) -> Result<ObjectId, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::IdRequired);
    }
    ObjectId::parse_str(raw).map_err(|_| ValidationError::InvalidId)
}

#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Book>, BookError> {
        tracing::debug!(operation = "list", "listing books");
        let books = self.store.list().await.map_err(|err| {
            tracing::warn!(operation = "list", error = %err, "store call failed");
            err
        })?;
        Ok(books)
    }

    pub async fn get(&self, id: &str) -> Result<Book, BookError> {
        let id = parse_id(id)?;
        tracing::debug!(operation = "get", %id, "fetching book");
        let book = self.store.find(id).await.map_err(|err| {
            tracing::warn!(operation = "get", %id, error = %err, "store call failed");
            err
        })?;
        Ok(book)
    }

    pub async fn create(&self, book: CreateBook) -> Result<InsertAck, BookError> {
        tracing::debug!(operation = "create", title = %book.title, "inserting book");
        let ack = self.store.insert(book).await.map_err(|err| {
            tracing::warn!(operation = "create", error = %err, "store call failed");
            err
        })?;
        tracing::info!(id = %ack.inserted_id, "book created");
        Ok(ack)
    }

    pub async fn update(&self, id: &str, patch: UpdateBook) -> Result<UpdateAck, BookError> {
        let id = parse_id(id)?;
        tracing::debug!(operation = "update", %id, ?patch, "updating book");
        let ack = self.store.update(id, patch).await.map_err(|err| {
            tracing::warn!(operation = "update", %id, error = %err, "store call failed");
            err
        })?;
        Ok(ack)
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteAck, BookError> {
        let id = parse_id(id)?;
        tracing::debug!(operation = "delete", %id, "deleting book");
        let ack = self.store.delete(id).await.map_err(|err| {
            tracing::warn!(operation = "delete", %id, error = %err, "store call failed");
            err
        })?;
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::error::StoreError;
    use crate::modules::books::memory::InMemoryBookStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegates to an in-memory store and counts every store call.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryBookStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl BookStore for CountingStore {
        async fn list(&self) -> Result<Vec<Book>, StoreError> {
            self.tick();
            self.inner.list().await
        }

        async fn find(&self, id: ObjectId) -> Result<Book, StoreError> {
            self.tick();
            self.inner.find(id).await
        }

        async fn insert(&self, book: CreateBook) -> Result<InsertAck, StoreError> {
            self.tick();
            self.inner.insert(book).await
        }

        async fn update(&self, id: ObjectId, patch: UpdateBook) -> Result<UpdateAck, StoreError> {
            self.tick();
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: ObjectId) -> Result<DeleteAck, StoreError> {
            self.tick();
            self.inner.delete(id).await
        }
    }

    fn service() -> (BookService, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::default());
        (BookService::new(store.clone()), store)
    }

    fn dune() -> CreateBook {
        CreateBook {
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            year: 1965,
        }
    }

    fn validation(result: Result<impl std::fmt::Debug, BookError>) -> ValidationError {
        match result {
            Err(BookError::Validation(err)) => err,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn parse_id_classifies_input() {
        assert_eq!(parse_id(""), Err(ValidationError::IdRequired));
        assert_eq!(parse_id("not-a-valid-id"), Err(ValidationError::InvalidId));
        assert_eq!(parse_id("65f1a2b3c4d5e6f708091a2"), Err(ValidationError::InvalidId));
        assert_eq!(parse_id("zzf1a2b3c4d5e6f708091a2b"), Err(ValidationError::InvalidId));
        assert!(parse_id("65f1a2b3c4d5e6f708091a2b").is_ok());
    }

    #[tokio::test]
    async fn empty_id_is_rejected_without_a_store_call() {
        let (service, store) = service();

        assert_eq!(validation(service.get("").await), ValidationError::IdRequired);
        assert_eq!(
            validation(service.update("", UpdateBook::default()).await),
            ValidationError::IdRequired
        );
        assert_eq!(validation(service.delete("").await), ValidationError::IdRequired);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_id_is_rejected_without_a_store_call() {
        let (service, store) = service();

        for raw in ["not-a-valid-id", "1234", "65f1a2b3c4d5e6f708091a2b00"] {
            assert_eq!(validation(service.get(raw).await), ValidationError::InvalidId);
            assert_eq!(
                validation(service.update(raw, UpdateBook::default()).await),
                ValidationError::InvalidId
            );
            assert_eq!(validation(service.delete(raw).await), ValidationError::InvalidId);
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() {
        let (service, store) = service();

        let ack = service.create(dune()).await.unwrap();
        let book = service.get(&ack.inserted_id).await.unwrap();

        assert_eq!(book.id, ack.inserted_id);
        assert_eq!(
            (book.title.as_str(), book.author.as_str(), book.year),
            ("Dune", "Herbert", 1965)
        );
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn partial_update_touches_only_supplied_fields() {
        let (service, _) = service();
        let ack = service.create(dune()).await.unwrap();

        let patch = UpdateBook {
            year: Some(1966),
            ..UpdateBook::default()
        };
        let result = service.update(&ack.inserted_id, patch).await.unwrap();
        assert_eq!((result.matched_count, result.modified_count), (1, 1));

        let book = service.get(&ack.inserted_id).await.unwrap();
        assert_eq!(book.year, 1966);
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Herbert");
    }

    #[tokio::test]
    async fn explicit_zero_year_is_applied() {
        let (service, _) = service();
        let ack = service.create(dune()).await.unwrap();

        let patch = UpdateBook {
            year: Some(0),
            ..UpdateBook::default()
        };
        service.update(&ack.inserted_id, patch).await.unwrap();

        assert_eq!(service.get(&ack.inserted_id).await.unwrap().year, 0);
    }

    #[tokio::test]
    async fn empty_update_changes_nothing() {
        let (service, _) = service();
        let ack = service.create(dune()).await.unwrap();

        let result = service
            .update(&ack.inserted_id, UpdateBook::default())
            .await
            .unwrap();
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 0);

        let book = service.get(&ack.inserted_id).await.unwrap();
        assert_eq!((book.title.as_str(), book.year), ("Dune", 1965));
    }

    #[tokio::test]
    async fn get_after_delete_is_a_store_failure() {
        let (service, _) = service();
        let ack = service.create(dune()).await.unwrap();

        assert_eq!(service.delete(&ack.inserted_id).await.unwrap().deleted_count, 1);
        assert!(matches!(
            service.get(&ack.inserted_id).await,
            Err(BookError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn list_contains_every_created_book() {
        let (service, _) = service();
        let mut created = Vec::new();
        for year in 1965..1970 {
            let ack = service
                .create(CreateBook { year, ..dune() })
                .await
                .unwrap();
            created.push(ack.inserted_id);
        }

        let listed: Vec<String> = service.list().await.unwrap().into_iter().map(|b| b.id).collect();
        assert!(created.iter().all(|id| listed.contains(id)));
    }
}
