use std::sync::Arc;

use shelf_http::error::AppError;

use crate::modules::books::models::Book;
use crate::store::{store_error, BookRepository};

pub struct SearchService {
    books: Arc<dyn BookRepository>,
}

impl SearchService {
    pub fn new(books: Arc<dyn BookRepository>) -> Self {
        Self { books }
    }

    /// Every book whose title or author contains `query`, ignoring case.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<Book>, AppError> {
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::bad_request("Please provide a search query"))?;

        let books = self.books.search_books(query).await.map_err(store_error)?;
        tracing::debug!(query, matches = books.len(), "book search");
        Ok(books)
    }
}
