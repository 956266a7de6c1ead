use serde::{Deserialize, Serialize};
use shelf_db::{Document, UniqueKey};
use shelf_http::error::AppError;
use time::OffsetDateTime;

use crate::modules::books::models::{validation_error, MAX_TITLE_LEN};
use crate::utils::trimmed;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A user's review of one book. A user reviews a book at most once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub rating: u8,
    pub title: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Id of the reviewed book
    pub book: String,
    /// Id of the reviewing user
    pub user: String,
}

impl Document for Review {
    fn id(&self) -> &str {
        &self.id
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "book_user",
            format!("{}/{}", self.book, self.user),
        )]
    }
}

/// Review payload as submitted by a client, for both creation and patches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewDraft {
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub rating: u8,
    pub title: String,
    pub text: String,
}

impl ReviewDraft {
    pub fn validate(self) -> Result<NewReview, AppError> {
        let mut violations = Vec::new();

        let rating = match self.rating {
            Some(r) if (MIN_RATING..=MAX_RATING).contains(&r) => u8::try_from(r).ok(),
            _ => None,
        };
        if rating.is_none() {
            violations.push((
                "rating",
                format!("Please add a rating between {MIN_RATING} and {MAX_RATING}"),
            ));
        }

        let title = trimmed(self.title);
        match &title {
            None => violations.push(("title", "Please add a title for the review".to_string())),
            Some(t) if t.chars().count() > MAX_TITLE_LEN => violations.push((
                "title",
                format!("Title cannot be more than {MAX_TITLE_LEN} characters"),
            )),
            Some(_) => {}
        }

        let text = trimmed(self.text);
        if text.is_none() {
            violations.push(("text", "Please add some text".to_string()));
        }

        match (rating, title, text) {
            (Some(rating), Some(title), Some(text)) if violations.is_empty() => Ok(NewReview {
                rating,
                title,
                text,
            }),
            _ => Err(validation_error("Review", violations)),
        }
    }

    /// Overlay this patch on `review` and validate the result as a whole.
    pub fn apply_to(self, review: &Review) -> Result<Review, AppError> {
        let merged = ReviewDraft {
            rating: self.rating.or(Some(i64::from(review.rating))),
            title: self.title.or_else(|| Some(review.title.clone())),
            text: self.text.or_else(|| Some(review.text.clone())),
        }
        .validate()?;

        Ok(Review {
            rating: merged.rating,
            title: merged.title,
            text: merged.text,
            ..review.clone()
        })
    }
}

impl NewReview {
    pub fn into_review(
        self,
        id: String,
        book: String,
        user: String,
        created_at: OffsetDateTime,
    ) -> Review {
        Review {
            id,
            rating: self.rating,
            title: self.title,
            text: self.text,
            created_at,
            book,
            user,
        }
    }
}

/// Minimal public profile of a review's author.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerProfile {
    pub id: String,
    pub name: Option<String>,
}

/// A review as shown alongside its book.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: String,
    pub rating: u8,
    pub title: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub book: String,
    pub user: ReviewerProfile,
}

impl ReviewView {
    pub fn new(review: Review, name: Option<String>) -> Self {
        Self {
            id: review.id,
            rating: review.rating,
            title: review.title,
            text: review.text,
            created_at: review.created_at,
            book: review.book,
            user: ReviewerProfile {
                id: review.user,
                name,
            },
        }
    }
}
