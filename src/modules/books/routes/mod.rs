//! HTTP handlers for the books module.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::AppError;
use serde::Serialize;

use super::error::{BookError, ValidationError};
use super::models::{Book, CreateBook, DeleteAck, InsertAck, UpdateAck, UpdateBook};
use super::service::BookService;

/// Successful read body: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

/// Successful write body: `{"result": ...}`.
#[derive(Debug, Serialize)]
pub struct Outcome<T> {
    pub result: T,
}

#[derive(Clone)]
pub struct BooksState {
    service: BookService,
    expose_store_errors: bool,
}

impl BooksState {
    pub fn new(service: BookService, expose_store_errors: bool) -> Self {
        Self {
            service,
            expose_store_errors,
        }
    }

    fn reject(&self, context: Option<&'static str>) -> impl FnOnce(BookError) -> AppError {
        let expose = self.expose_store_errors;
        move |err| err.into_app_error(context, expose)
    }
}

/// Routes relative to the module mount point.
pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "request body rejected");
        AppError::validation(ValidationError::InvalidBody.to_string())
    })
}

/// A path segment that is not valid UTF-8 never names a book.
fn path_id(segment: Result<Path<String>, PathRejection>) -> Result<String, AppError> {
    segment.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(error = %rejection, "path id rejected");
        AppError::validation(ValidationError::InvalidId.to_string())
    })
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<Data<Vec<Book>>>, AppError> {
    let books = state.service.list().await.map_err(state.reject(None))?;
    Ok(Json(Data { data: books }))
}

async fn get_book(
    State(state): State<BooksState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Data<Book>>, AppError> {
    let id = path_id(id)?;
    let book = state.service.get(&id).await.map_err(state.reject(None))?;
    Ok(Json(Data { data: book }))
}

async fn create_book(
    State(state): State<BooksState>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Outcome<InsertAck>>), AppError> {
    let book = body(payload)?;
    let ack = state
        .service
        .create(book)
        .await
        .map_err(state.reject(Some("failed to add book")))?;
    Ok((StatusCode::CREATED, Json(Outcome { result: ack })))
}

async fn update_book(
    State(state): State<BooksState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> Result<Json<Outcome<UpdateAck>>, AppError> {
    let patch = body(payload)?;
    let id = path_id(id)?;
    let ack = state
        .service
        .update(&id, patch)
        .await
        .map_err(state.reject(Some("failed to update book")))?;
    Ok(Json(Outcome { result: ack }))
}

async fn delete_book(
    State(state): State<BooksState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Outcome<DeleteAck>>, AppError> {
    let id = path_id(id)?;
    let ack = state
        .service
        .delete(&id)
        .await
        .map_err(state.reject(Some("failed to delete book")))?;
    Ok(Json(Outcome { result: ack }))
}
