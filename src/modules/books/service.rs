use std::collections::HashMap;
use std::sync::Arc;

use shelf_authz::{ensure_owner, Caller};
use shelf_http::error::AppError;

use super::models::{Book, BookDetail, BookDraft, BookField};
use crate::modules::reviews::models::ReviewView;
use crate::query::{Pagination, QueryBuilder};
use crate::rating::RatingAggregator;
use crate::store::{store_error, BookRepository, ReviewRepository, UserDirectory};
use crate::utils;

/// A page of (possibly projected) books.
#[derive(Debug)]
pub struct BookList {
    pub items: Vec<serde_json::Value>,
    pub total: u64,
    pub pagination: Pagination,
}

pub struct BookService {
    books: Arc<dyn BookRepository>,
    reviews: Arc<dyn ReviewRepository>,
    users: Arc<dyn UserDirectory>,
    ratings: Arc<RatingAggregator>,
    query: QueryBuilder,
}

impl BookService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        reviews: Arc<dyn ReviewRepository>,
        users: Arc<dyn UserDirectory>,
        ratings: Arc<RatingAggregator>,
        query: QueryBuilder,
    ) -> Self {
        Self {
            books,
            reviews,
            users,
            ratings,
            query,
        }
    }

    pub async fn list(&self, params: &HashMap<String, String>) -> Result<BookList, AppError> {
        let spec = self.query.build::<BookField>(params)?;
        let page = self.books.query_books(&spec).await.map_err(store_error)?;

        tracing::debug!(
            total = page.total,
            returned = page.items.len(),
            "books listed"
        );

        Ok(BookList {
            items: page.items.iter().map(|book| book.project(&spec.select)).collect(),
            total: page.total,
            pagination: spec.window.pagination(page.total),
        })
    }

    /// The book with one page of its reviews and an average computed from
    /// every review rather than the stored value.
    pub async fn get(
        &self,
        id: &str,
        params: &HashMap<String, String>,
    ) -> Result<BookDetail, AppError> {
        let book = self
            .books
            .find_book(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| AppError::not_found("Book not found"))?;

        let window = self.query.window(params);
        let page = self
            .reviews
            .reviews_for_book(id, &window)
            .await
            .map_err(store_error)?;

        let user_ids: Vec<String> = page.items.iter().map(|r| r.user.clone()).collect();
        let names = self
            .users
            .display_names(&user_ids)
            .await
            .map_err(store_error)?;

        let average_rating = self.ratings.average(id).await.map_err(store_error)?;

        let reviews = page
            .items
            .into_iter()
            .map(|review| {
                let name = names.get(&review.user).cloned();
                ReviewView::new(review, name)
            })
            .collect();

        Ok(BookDetail {
            book: Book {
                average_rating,
                ..book
            },
            reviews,
            review_count: page.total,
            pagination: window.pagination(page.total),
        })
    }

    pub async fn create(&self, caller: &Caller, draft: BookDraft) -> Result<Book, AppError> {
        let book = draft
            .validate()?
            .into_book(utils::new_id(), caller.id.clone(), utils::now());

        self.books
            .insert_book(book.clone())
            .await
            .map_err(store_error)?;

        tracing::info!(book_id = %book.id, user_id = %caller.id, "book created");
        Ok(book)
    }

    /// Delete a book owned by `caller` together with all of its reviews.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<(), AppError> {
        let book = self
            .books
            .find_book(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| AppError::not_found("Book not found"))?;
        ensure_owner(caller, &book.user, "delete this book")?;

        // Book before reviews; a concurrent add re-checks the book after inserting.
        self.books.delete_book(id).await.map_err(store_error)?;
        let removed = self
            .reviews
            .delete_reviews_for_book(id)
            .await
            .map_err(store_error)?;

        tracing::info!(book_id = %id, reviews_removed = removed, "book deleted");
        Ok(())
    }
}
