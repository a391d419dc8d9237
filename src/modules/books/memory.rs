//! In-process [`BookStore`] with the same acknowledgment semantics as MongoDB.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::error::StoreError;
use super::models::{Book, CreateBook, DeleteAck, InsertAck, UpdateAck, UpdateBook};
use super::store::{BookDocument, BookStore};

/// Books kept in insertion order behind an async lock.
#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    books: RwLock<Vec<BookDocument>>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Write `value` into `slot` if supplied; report whether the stored value changed.
fn apply<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn list(&self) -> Result<Vec<Book>, StoreError> {
        let books = self.books.read().await;
        Ok(books.iter().cloned().map(Book::from).collect())
    }

    async fn find(&self, id: ObjectId) -> Result<Book, StoreError> {
        let books = self.books.read().await;
        books
            .iter()
            .find(|book| book.id == id)
            .cloned()
            .map(Book::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, book: CreateBook) -> Result<InsertAck, StoreError> {
        let id = ObjectId::new();
        self.books.write().await.push(BookDocument {
            id,
            title: book.title,
            author: book.author,
            year: book.year,
        });
        Ok(InsertAck {
            inserted_id: id.to_hex(),
        })
    }

    async fn update(&self, id: ObjectId, patch: UpdateBook) -> Result<UpdateAck, StoreError> {
        let mut books = self.books.write().await;
        let Some(book) = books.iter_mut().find(|book| book.id == id) else {
            return Ok(UpdateAck {
                matched_count: 0,
                modified_count: 0,
                upserted_count: 0,
                upserted_id: None,
            });
        };

        // Non-short-circuiting `|` so every supplied field is applied.
        let modified = apply(&mut book.title, patch.title)
            | apply(&mut book.author, patch.author)
            | apply(&mut book.year, patch.year);

        Ok(UpdateAck {
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_count: 0,
            upserted_id: None,
        })
    }

    async fn delete(&self, id: ObjectId) -> Result<DeleteAck, StoreError> {
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|book| book.id != id);
        Ok(DeleteAck {
            deleted_count: (before - books.len()) as u64,
        })
    }
}
