use std::sync::Arc;

use shelf_authz::{ensure_owner, Caller};
use shelf_db::DbError;
use shelf_http::error::AppError;

use super::models::{Review, ReviewDraft};
use crate::rating::RatingAggregator;
use crate::store::{store_error, BookRepository, ReviewRepository};
use crate::utils;

const ALREADY_REVIEWED: &str = "You have already reviewed this book";

pub struct ReviewService {
    books: Arc<dyn BookRepository>,
    reviews: Arc<dyn ReviewRepository>,
    ratings: Arc<RatingAggregator>,
}

impl ReviewService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        reviews: Arc<dyn ReviewRepository>,
        ratings: Arc<RatingAggregator>,
    ) -> Self {
        Self {
            books,
            reviews,
            ratings,
        }
    }

    /// Add the caller's review of a book, then refresh the book's average.
    pub async fn add(
        &self,
        caller: &Caller,
        book_id: &str,
        draft: ReviewDraft,
    ) -> Result<Review, AppError> {
        self.books
            .find_book(book_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| AppError::not_found("Book not found"))?;

        let existing = self
            .reviews
            .find_user_review(book_id, &caller.id)
            .await
            .map_err(store_error)?;
        if existing.is_some() {
            return Err(already_reviewed(book_id));
        }

        let review = draft.validate()?.into_review(
            utils::new_id(),
            book_id.to_string(),
            caller.id.clone(),
            utils::now(),
        );

        // The store's (book, user) index settles races the lookup above misses.
        self.reviews
            .insert_review(review.clone())
            .await
            .map_err(|err| match err {
                DbError::DuplicateKey { .. } => already_reviewed(book_id),
                other => store_error(other),
            })?;

        // A delete of the book may have swept its reviews before this insert.
        let book = self.books.find_book(book_id).await.map_err(store_error)?;
        if book.is_none() {
            self.reviews
                .delete_review(&review.id)
                .await
                .map_err(store_error)?;
            return Err(AppError::not_found("Book not found"));
        }

        tracing::info!(review_id = %review.id, book_id, user_id = %caller.id, "review added");
        self.ratings.recompute(book_id).await;
        Ok(review)
    }

    /// Patch a review owned by the caller. A changed rating refreshes the
    /// book's average.
    pub async fn update(
        &self,
        caller: &Caller,
        review_id: &str,
        patch: ReviewDraft,
    ) -> Result<Review, AppError> {
        let current = self.owned_review(caller, review_id, "update this review").await?;
        let updated = patch.apply_to(&current)?;

        let stored = self
            .reviews
            .replace_review(updated)
            .await
            .map_err(store_error)?
            .ok_or_else(|| AppError::not_found("Review not found"))?;

        tracing::info!(review_id, user_id = %caller.id, "review updated");
        if stored.rating != current.rating {
            self.ratings.recompute(&stored.book).await;
        }
        Ok(stored)
    }

    /// Delete a review owned by the caller, then refresh the book's average.
    pub async fn delete(&self, caller: &Caller, review_id: &str) -> Result<(), AppError> {
        let review = self.owned_review(caller, review_id, "delete this review").await?;

        self.reviews
            .delete_review(review_id)
            .await
            .map_err(store_error)?;

        tracing::info!(review_id, book_id = %review.book, user_id = %caller.id, "review deleted");
        self.ratings.recompute(&review.book).await;
        Ok(())
    }

    async fn owned_review(
        &self,
        caller: &Caller,
        review_id: &str,
        action: &str,
    ) -> Result<Review, AppError> {
        let review = self
            .reviews
            .find_review(review_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| AppError::not_found("Review not found"))?;
        ensure_owner(caller, &review.user, action)?;
        Ok(review)
    }
}

fn already_reviewed(book_id: &str) -> AppError {
    AppError::conflict(
        vec![serde_json::json!({ "field": "book", "value": book_id })],
        ALREADY_REVIEWED,
    )
}
