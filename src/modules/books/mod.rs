pub mod error;
pub mod memory;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Module};
use serde_json::json;

use routes::BooksState;
use service::BookService;
use store::BookStore;

/// Books module: CRUD over the `books` collection
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>, expose_store_errors: bool) -> Self {
        Self {
            state: BooksState::new(BookService::new(store), expose_store_errors),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            collection = %ctx.settings.database.collection,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": schema
            }
        }
    })
}

fn error_response(description: &str) -> serde_json::Value {
    json_response(description, json!({ "$ref": "#/components/schemas/ErrorResponse" }))
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "24-character hex ObjectId",
        "schema": { "type": "string" }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let wrapped = |key: &str, schema: serde_json::Value| {
        json!({
            "type": "object",
            "properties": { key: schema },
            "required": [key]
        })
    };
    let book_ref = json!({ "$ref": "#/components/schemas/Book" });

    let collection = json!({
        "get": {
            "summary": "List books",
            "tags": ["Books"],
            "responses": {
                "200": json_response("Every book in the collection", wrapped("data", json!({ "type": "array", "items": book_ref.clone() }))),
                "500": error_response("Database failure")
            }
        },
        "post": {
            "summary": "Create a book",
            "tags": ["Books"],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/CreateBook" }
                    }
                }
            },
            "responses": {
                "201": json_response("Book created", wrapped("result", json!({ "$ref": "#/components/schemas/InsertAck" }))),
                "400": error_response("Malformed body"),
                "500": error_response("Insert failed")
            }
        }
    });

    let item = json!({
        "get": {
            "summary": "Get a book",
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "responses": {
                "200": json_response("The book", wrapped("data", book_ref)),
                "400": error_response("Missing or malformed id"),
                "500": error_response("Not found or database failure")
            }
        },
        "put": {
            "summary": "Update supplied fields of a book",
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "requestBody": {
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/UpdateBook" }
                    }
                }
            },
            "responses": {
                "200": json_response("Update acknowledged", wrapped("result", json!({ "$ref": "#/components/schemas/UpdateAck" }))),
                "400": error_response("Malformed id or body"),
                "500": error_response("Update failed")
            }
        },
        "delete": {
            "summary": "Delete a book",
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "responses": {
                "200": json_response("Delete acknowledged", wrapped("result", json!({ "$ref": "#/components/schemas/DeleteAck" }))),
                "400": error_response("Missing or malformed id"),
                "500": error_response("Delete failed")
            }
        }
    });

    let schemas = json!({
        "Book": {
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Store-assigned identifier" },
                "title": { "type": "string" },
                "author": { "type": "string" },
                "year": { "type": "integer", "format": "int64" }
            },
            "required": ["id", "title", "author", "year"]
        },
        "CreateBook": {
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "author": { "type": "string" },
                "year": { "type": "integer", "format": "int64" }
            },
            "required": ["title", "author", "year"]
        },
        "UpdateBook": {
            "type": "object",
            "description": "Omitted fields are left unchanged",
            "properties": {
                "title": { "type": "string" },
                "author": { "type": "string" },
                "year": { "type": "integer", "format": "int64" }
            }
        },
        "InsertAck": {
            "type": "object",
            "properties": { "InsertedID": { "type": "string" } },
            "required": ["InsertedID"]
        },
        "UpdateAck": {
            "type": "object",
            "properties": {
                "MatchedCount": { "type": "integer" },
                "ModifiedCount": { "type": "integer" },
                "UpsertedCount": { "type": "integer" },
                "UpsertedID": { "type": ["string", "null"] }
            },
            "required": ["MatchedCount", "ModifiedCount", "UpsertedCount", "UpsertedID"]
        },
        "DeleteAck": {
            "type": "object",
            "properties": { "DeletedCount": { "type": "integer" } },
            "required": ["DeletedCount"]
        }
    });

    json!({
        "paths": { "/": collection, "/{id}": item },
        "components": { "schemas": schemas }
    })
}

/// Create a new instance of the books module
pub fn create_module(store: Arc<dyn BookStore>, expose_store_errors: bool) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store, expose_store_errors))
}
