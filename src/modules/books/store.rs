//! Persistence seam for books.
//!
//! [`BookStore`] is what the operations in [`super::service`] call; each method
//! is exactly one round-trip to the backing store. [`MongoBookStore`] is the
//! production implementation.

use async_trait::async_trait;
use bookshelf_db::Database;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::models::{Book, CreateBook, DeleteAck, InsertAck, UpdateAck, UpdateBook};

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Every book in the collection, in store order.
    async fn list(&self) -> Result<Vec<Book>, StoreError>;

    /// Point lookup by id.
    async fn find(&self, id: ObjectId) -> Result<Book, StoreError>;

    async fn insert(&self, book: CreateBook) -> Result<InsertAck, StoreError>;

    /// Apply only the fields present in `patch`.
    async fn update(&self, id: ObjectId, patch: UpdateBook) -> Result<UpdateAck, StoreError>;

    async fn delete(&self, id: ObjectId) -> Result<DeleteAck, StoreError>;
}

/// Stored shape of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub author: String,
    pub year: i64,
}

impl From<BookDocument> for Book {
    fn from(document: BookDocument) -> Self {
        Self {
            id: document.id.to_hex(),
            title: document.title,
            author: document.author,
            year: document.year,
        }
    }
}

/// `$set` operand holding only the supplied fields.
pub fn set_document(patch: &UpdateBook) -> Document {
    let mut set = Document::new();
    if let Some(title) = &patch.title {
        set.insert("title", title.as_str());
    }
    if let Some(author) = &patch.author {
        set.insert("author", author.as_str());
    }
    if let Some(year) = patch.year {
        set.insert("year", year);
    }
    set
}

fn id_to_string(id: &Bson) -> String {
    match id.as_object_id() {
        Some(oid) => oid.to_hex(),
        None => id.to_string(),
    }
}

/// [`BookStore`] backed by a MongoDB collection.
#[derive(Clone, Debug)]
pub struct MongoBookStore {
    books: Collection<BookDocument>,
    new_books: Collection<CreateBook>,
}

impl MongoBookStore {
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            books: database.collection(collection),
            new_books: database.collection(collection),
        }
    }
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn list(&self) -> Result<Vec<Book>, StoreError> {
        let cursor = self.books.find(doc! {}).await?;
        let documents: Vec<BookDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Book::from).collect())
    }

    async fn find(&self, id: ObjectId) -> Result<Book, StoreError> {
        self.books
            .find_one(doc! { "_id": id })
            .await?
            .map(Book::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, book: CreateBook) -> Result<InsertAck, StoreError> {
        let result = self.new_books.insert_one(&book).await?;
        let inserted_id = result
            .inserted_id
            .as_object_id()
            .ok_or(StoreError::MissingInsertedId)?;
        Ok(InsertAck {
            inserted_id: inserted_id.to_hex(),
        })
    }

    async fn update(&self, id: ObjectId, patch: UpdateBook) -> Result<UpdateAck, StoreError> {
        // An empty `$set` is a no-op on MongoDB 5.0+.
        let result = self
            .books
            .update_one(doc! { "_id": id }, doc! { "$set": set_document(&patch) })
            .await?;
        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count: u64::from(result.upserted_id.is_some()),
            upserted_id: result.upserted_id.as_ref().map(id_to_string),
        })
    }

    async fn delete(&self, id: ObjectId) -> Result<DeleteAck, StoreError> {
        let result = self.books.delete_one(doc! { "_id": id }).await?;
        Ok(DeleteAck {
            deleted_count: result.deleted_count,
        })
    }
}
