//! Rating Aggregator: keeps `Book::average_rating` in step with the book's
//! reviews.

use std::sync::Arc;

use shelf_db::DbError;

use crate::store::{BookRepository, ReviewRepository};

/// Running count and sum of review ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingStats {
    pub count: u64,
    pub sum: u64,
}

impl RatingStats {
    pub fn with(self, rating: u8) -> Self {
        Self {
            count: self.count + 1,
            sum: self.sum + u64::from(rating),
        }
    }

    /// Arithmetic mean, or 0 when there are no ratings.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

pub struct RatingAggregator {
    books: Arc<dyn BookRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl RatingAggregator {
    pub fn new(books: Arc<dyn BookRepository>, reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { books, reviews }
    }

    /// Live average over every review of the book, without persisting it.
    pub async fn average(&self, book_id: &str) -> Result<f64, DbError> {
        Ok(self.reviews.rating_stats(book_id).await?.mean())
    }

    /// Recompute the book's average and store it.
    ///
    /// Never fails from the caller's point of view: store errors are logged
    /// and `None` is returned. Safe to call any number of times.
    pub async fn recompute(&self, book_id: &str) -> Option<f64> {
        let average = match self.average(book_id).await {
            Ok(average) => average,
            Err(err) => {
                tracing::error!(book_id, error = %err, "failed to aggregate ratings");
                return None;
            }
        };

        match self.books.set_average_rating(book_id, average).await {
            Ok(true) => {
                tracing::debug!(book_id, average, "average rating updated");
                Some(average)
            }
            Ok(false) => {
                tracing::warn!(book_id, "book vanished before its average could be stored");
                None
            }
            Err(err) => {
                tracing::error!(book_id, error = %err, "failed to store average rating");
                None
            }
        }
    }
}
