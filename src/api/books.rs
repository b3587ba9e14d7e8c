//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    services::catalog::BookPage,
};

use super::{AdminUser, AuthenticatedUser, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct BookListResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: BookPage,
}

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub success: bool,
    pub book: Book,
}

#[derive(Serialize, ToSchema)]
pub struct GenresResponse {
    pub success: bool,
    pub genres: Vec<String>,
}

/// Search the active catalog
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "One page of books", body = BookListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookListResponse>> {
    let page = state.services.catalog.search(&query).await?;
    Ok(Json(BookListResponse { success: true, page }))
}

/// Distinct genres of active books
#[utoipa::path(
    get,
    path = "/books/genres",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Genres", body = GenresResponse)
    )
)]
pub async fn list_genres(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<GenresResponse>> {
    let genres = state.services.catalog.genres().await?;
    Ok(Json(GenresResponse { success: true, genres }))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.catalog.get_active(id).await?;
    Ok(Json(BookResponse { success: true, book }))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/admin/books",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AdminUser(claims): AdminUser,
    ValidatedJson(book): ValidatedJson<CreateBook>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let book = state.services.catalog.create(&book, &claims.email).await?;
    Ok((StatusCode::CREATED, Json(BookResponse { success: true, book })))
}

/// Update a book; changing the total shifts available copies by the same amount
#[utoipa::path(
    put,
    path = "/admin/books/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Total below copies on loan")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<UpdateBook>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.catalog.update(id, &update, &claims.email).await?;
    Ok(Json(BookResponse { success: true, book }))
}
