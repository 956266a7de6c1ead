use std::collections::HashMap;

use async_trait::async_trait;
use shelf_db::{Collection, DbError, Document};
use shelf_kernel::settings::AuthUser;

use super::{BookRepository, Page, ReviewRepository, UserDirectory};
use crate::modules::books::models::{Book, BookField};
use crate::modules::reviews::models::Review;
use crate::query::{PageWindow, QuerySpec};
use crate::rating::RatingStats;

#[derive(Debug, Clone)]
struct UserRecord {
    id: String,
    name: String,
}

impl Document for UserRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// In-process store backing every repository trait.
pub struct MemoryStore {
    books: Collection<Book>,
    reviews: Collection<Review>,
    users: Collection<UserRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            books: Collection::new("books"),
            reviews: Collection::new("reviews"),
            users: Collection::new("users"),
        }
    }

    /// Register the users whose names appear on their reviews.
    pub async fn seed_users(&self, users: &[AuthUser]) -> Result<(), DbError> {
        for user in users {
            self.users
                .insert(UserRecord {
                    id: user.id.clone(),
                    name: user.name.clone(),
                })
                .await?;
        }
        tracing::info!(count = users.len(), "user directory seeded");
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn insert_book(&self, book: Book) -> Result<(), DbError> {
        self.books.insert(book).await
    }

    async fn find_book(&self, id: &str) -> Result<Option<Book>, DbError> {
        Ok(self.books.get(id).await)
    }

    async fn query_books(&self, spec: &QuerySpec<BookField>) -> Result<Page<Book>, DbError> {
        let candidates = self.books.find(|book| spec.filter.matches(book)).await;
        let (items, total) = spec.apply(candidates);
        Ok(Page { items, total })
    }

    async fn search_books(&self, needle: &str) -> Result<Vec<Book>, DbError> {
        let needle = needle.to_lowercase();
        let mut books = self
            .books
            .find(|book| {
                book.title.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
            })
            .await;
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn set_average_rating(&self, id: &str, average: f64) -> Result<bool, DbError> {
        let updated = self
            .books
            .modify(id, |book| book.average_rating = average)
            .await?;
        Ok(updated.is_some())
    }

    async fn delete_book(&self, id: &str) -> Result<Option<Book>, DbError> {
        Ok(self.books.remove(id).await)
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert_review(&self, review: Review) -> Result<(), DbError> {
        self.reviews.insert(review).await
    }

    async fn find_review(&self, id: &str) -> Result<Option<Review>, DbError> {
        Ok(self.reviews.get(id).await)
    }

    async fn find_user_review(
        &self,
        book_id: &str,
        user_id: &str,
    ) -> Result<Option<Review>, DbError> {
        Ok(self
            .reviews
            .find_one(|review| review.book == book_id && review.user == user_id)
            .await)
    }

    async fn reviews_for_book(
        &self,
        book_id: &str,
        window: &PageWindow,
    ) -> Result<Page<Review>, DbError> {
        let mut reviews = self.reviews.find(|review| review.book == book_id).await;
        let total = reviews.len() as u64;
        reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(Page {
            items: window.slice(reviews),
            total,
        })
    }

    async fn rating_stats(&self, book_id: &str) -> Result<RatingStats, DbError> {
        let ratings = self.reviews.find(|review| review.book == book_id).await;
        Ok(ratings
            .iter()
            .fold(RatingStats::default(), |stats, review| stats.with(review.rating)))
    }

    async fn replace_review(&self, review: Review) -> Result<Option<Review>, DbError> {
        let id = review.id.clone();
        self.reviews.modify(&id, move |stored| *stored = review).await
    }

    async fn delete_review(&self, id: &str) -> Result<Option<Review>, DbError> {
        Ok(self.reviews.remove(id).await)
    }

    async fn delete_reviews_for_book(&self, book_id: &str) -> Result<usize, DbError> {
        Ok(self.reviews.remove_where(|review| review.book == book_id).await)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn display_names(&self, ids: &[String]) -> Result<HashMap<String, String>, DbError> {
        let users = self.users.find(|user| ids.contains(&user.id)).await;
        Ok(users.into_iter().map(|user| (user.id, user.name)).collect())
    }
}
