//! Persistence seams. Services hold these traits behind `Arc<dyn …>` and
//! never see the concrete store.

mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use shelf_db::DbError;
use shelf_http::error::AppError;

use crate::modules::books::models::{Book, BookField};
use crate::modules::reviews::models::Review;
use crate::query::{PageWindow, QuerySpec};
use crate::rating::RatingStats;

pub use memory::MemoryStore;

/// One page of records plus the number matching across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Fails with `DbError::DuplicateKey` when the ISBN is already taken.
    async fn insert_book(&self, book: Book) -> Result<(), DbError>;

    async fn find_book(&self, id: &str) -> Result<Option<Book>, DbError>;

    async fn query_books(&self, spec: &QuerySpec<BookField>) -> Result<Page<Book>, DbError>;

    /// Books whose title or author contains `needle`, ignoring case.
    async fn search_books(&self, needle: &str) -> Result<Vec<Book>, DbError>;

    /// Returns false when the book no longer exists.
    async fn set_average_rating(&self, id: &str, average: f64) -> Result<bool, DbError>;

    async fn delete_book(&self, id: &str) -> Result<Option<Book>, DbError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fails with `DbError::DuplicateKey` when the user already reviewed
    /// the book. The check and the insert are one atomic step.
    async fn insert_review(&self, review: Review) -> Result<(), DbError>;

    async fn find_review(&self, id: &str) -> Result<Option<Review>, DbError>;

    async fn find_user_review(&self, book_id: &str, user_id: &str)
        -> Result<Option<Review>, DbError>;

    /// Reviews of a book, oldest first.
    async fn reviews_for_book(
        &self,
        book_id: &str,
        window: &PageWindow,
    ) -> Result<Page<Review>, DbError>;

    async fn rating_stats(&self, book_id: &str) -> Result<RatingStats, DbError>;

    async fn replace_review(&self, review: Review) -> Result<Option<Review>, DbError>;

    async fn delete_review(&self, id: &str) -> Result<Option<Review>, DbError>;

    async fn delete_reviews_for_book(&self, book_id: &str) -> Result<usize, DbError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Display names for the given user ids. Unknown ids are left out.
    async fn display_names(&self, ids: &[String]) -> Result<HashMap<String, String>, DbError>;
}

/// Map a store failure onto the HTTP error it should surface as.
pub fn store_error(err: DbError) -> AppError {
    match err {
        DbError::DuplicateKey { collection, index } => AppError::conflict(
            vec![serde_json::json!({ "collection": collection, "index": index })],
            "Duplicate field value entered",
        ),
        other => AppError::Internal(other.into()),
    }
}
