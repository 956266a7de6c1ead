use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shelf_db::{Document, UniqueKey};
use shelf_http::error::AppError;
use time::OffsetDateTime;

use crate::modules::reviews::models::ReviewView;
use crate::query::{FieldKind, FieldValue, Pagination, QueryField, Queryable, SortDirection, SortKey};
use crate::utils::{field_error, trimmed};

pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Genre {
    Fiction,
    #[serde(rename = "Non-fiction")]
    NonFiction,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Fantasy,
    Mystery,
    Thriller,
    Romance,
    Biography,
    History,
    #[serde(rename = "Self-help")]
    SelfHelp,
    Business,
    Other,
}

impl Genre {
    pub const ALL: [Genre; 12] = [
        Genre::Fiction,
        Genre::NonFiction,
        Genre::ScienceFiction,
        Genre::Fantasy,
        Genre::Mystery,
        Genre::Thriller,
        Genre::Romance,
        Genre::Biography,
        Genre::History,
        Genre::SelfHelp,
        Genre::Business,
        Genre::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Genre::Fiction => "Fiction",
            Genre::NonFiction => "Non-fiction",
            Genre::ScienceFiction => "Science Fiction",
            Genre::Fantasy => "Fantasy",
            Genre::Mystery => "Mystery",
            Genre::Thriller => "Thriller",
            Genre::Romance => "Romance",
            Genre::Biography => "Biography",
            Genre::History => "History",
            Genre::SelfHelp => "Self-help",
            Genre::Business => "Business",
            Genre::Other => "Other",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Genre {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .into_iter()
            .find(|genre| genre.label() == s)
            .ok_or(())
    }
}

/// A catalogued book.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Id of the user who created the book
    pub user: String,
    /// Mean review rating, maintained by the rating aggregator
    pub average_rating: f64,
}

impl Document for Book {
    fn id(&self) -> &str {
        &self.id
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        self.isbn
            .iter()
            .map(|isbn| UniqueKey::new("isbn", isbn.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookField {
    Id,
    Title,
    Author,
    Genre,
    Description,
    PublishedYear,
    Isbn,
    CreatedAt,
    User,
    AverageRating,
}

impl QueryField for BookField {
    fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "id" => Self::Id,
            "title" => Self::Title,
            "author" => Self::Author,
            "genre" => Self::Genre,
            "description" => Self::Description,
            "publishedYear" => Self::PublishedYear,
            "isbn" => Self::Isbn,
            "createdAt" => Self::CreatedAt,
            "user" => Self::User,
            "averageRating" => Self::AverageRating,
            _ => return None,
        };
        Some(field)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::Description => "description",
            Self::PublishedYear => "publishedYear",
            Self::Isbn => "isbn",
            Self::CreatedAt => "createdAt",
            Self::User => "user",
            Self::AverageRating => "averageRating",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::PublishedYear | Self::AverageRating => FieldKind::Number,
            Self::CreatedAt => FieldKind::Timestamp,
            _ => FieldKind::Text,
        }
    }

    fn default_sort() -> SortKey<Self> {
        SortKey {
            field: Self::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl Queryable for Book {
    type Field = BookField;

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, field: BookField) -> FieldValue {
        let text = |s: &str| FieldValue::Text(s.to_string());
        match field {
            BookField::Id => text(&self.id),
            BookField::Title => text(&self.title),
            BookField::Author => text(&self.author),
            BookField::Genre => text(self.genre.label()),
            BookField::Description => text(&self.description),
            BookField::PublishedYear => self
                .published_year
                .map_or(FieldValue::Missing, |year| FieldValue::Number(f64::from(year))),
            BookField::Isbn => self.isbn.as_deref().map_or(FieldValue::Missing, text),
            BookField::CreatedAt => FieldValue::Timestamp(self.created_at),
            BookField::User => text(&self.user),
            BookField::AverageRating => FieldValue::Number(self.average_rating),
        }
    }
}

impl Book {
    /// JSON view restricted to `fields` plus the id; all fields when empty.
    pub fn project(&self, fields: &[BookField]) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if fields.is_empty() {
            return value;
        }
        if let Some(object) = value.as_object_mut() {
            object.retain(|key, _| {
                key == "id" || fields.iter().any(|field| field.name() == key.as_str())
            });
        }
        value
    }
}

/// Book creation payload as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub description: String,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
}

impl BookDraft {
    /// Check presence, length and genre, reporting every violation at once.
    pub fn validate(self) -> Result<NewBook, AppError> {
        let mut violations = Vec::new();

        let title = trimmed(self.title);
        match &title {
            None => violations.push(("title", "Please add a title".to_string())),
            Some(t) if t.chars().count() > MAX_TITLE_LEN => violations.push((
                "title",
                format!("Title cannot be more than {MAX_TITLE_LEN} characters"),
            )),
            Some(_) => {}
        }

        let author = trimmed(self.author);
        if author.is_none() {
            violations.push(("author", "Please add an author".to_string()));
        }

        let genre = match self.genre.as_deref().map(str::trim) {
            None | Some("") => {
                violations.push(("genre", "Please add a genre".to_string()));
                None
            }
            Some(raw) => match raw.parse::<Genre>() {
                Ok(genre) => Some(genre),
                Err(()) => {
                    violations.push(("genre", format!("'{raw}' is not a valid genre")));
                    None
                }
            },
        };

        let description = trimmed(self.description);
        if description.is_none() {
            violations.push(("description", "Please add a description".to_string()));
        }

        match (title, author, genre, description) {
            (Some(title), Some(author), Some(genre), Some(description)) if violations.is_empty() => {
                Ok(NewBook {
                    title,
                    author,
                    genre,
                    description,
                    published_year: self.published_year,
                    isbn: trimmed(self.isbn),
                })
            }
            _ => Err(validation_error("Book", violations)),
        }
    }
}

impl NewBook {
    pub fn into_book(self, id: String, owner: String, created_at: OffsetDateTime) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            genre: self.genre,
            description: self.description,
            published_year: self.published_year,
            isbn: self.isbn,
            created_at,
            user: owner,
            average_rating: 0.0,
        }
    }
}

/// Collapse field violations into one validation error.
pub(crate) fn validation_error(record: &str, violations: Vec<(&str, String)>) -> AppError {
    let summary = violations
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ");
    let details = violations
        .iter()
        .map(|(field, message)| field_error(field, message))
        .collect();
    AppError::validation(details, format!("{record} validation failed: {summary}"))
}

/// Single-book view: the book with a freshly computed average, plus one
/// page of its reviews.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub reviews: Vec<ReviewView>,
    pub review_count: u64,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> BookDraft {
        BookDraft {
            title: Some("The Hobbit".to_string()),
            author: Some("J.R.R. Tolkien".to_string()),
            genre: Some("Fantasy".to_string()),
            description: Some("There and back again".to_string()),
            published_year: Some(1937),
            isbn: Some(" 978-0261102217 ".to_string()),
        }
    }

    fn details(err: AppError) -> Vec<serde_json::Value> {
        match err {
            AppError::Validation { details, .. } => details,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let book = draft().validate().unwrap();
        assert_eq!(book.genre, Genre::Fantasy);
        assert_eq!(book.isbn.as_deref(), Some("978-0261102217"));
    }

    #[test]
    fn every_missing_field_is_reported() {
        let err = BookDraft::default().validate().unwrap_err();
        let fields: Vec<String> = details(err)
            .iter()
            .map(|d| d["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["title", "author", "genre", "description"]);
    }

    #[test]
    fn long_title_and_unknown_genre_are_rejected() {
        let mut bad = draft();
        bad.title = Some("x".repeat(MAX_TITLE_LEN + 1));
        bad.genre = Some("Poetry".to_string());

        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("Title cannot be more than 100 characters"));
        assert_eq!(details(err).len(), 2);
    }

    #[test]
    fn genre_labels_round_trip() {
        for genre in Genre::ALL {
            assert_eq!(genre.label().parse::<Genre>(), Ok(genre));
            assert_eq!(serde_json::to_value(genre).unwrap(), genre.label());
        }
    }

    #[test]
    fn projection_keeps_id() {
        let book = draft()
            .validate()
            .unwrap()
            .into_book("b1".to_string(), "u1".to_string(), OffsetDateTime::UNIX_EPOCH);

        let projected = book.project(&[BookField::Title]);
        let keys: Vec<&String> = projected.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(projected["id"], "b1");
        assert_eq!(projected["title"], "The Hobbit");

        let full = book.project(&[]);
        assert_eq!(full["publishedYear"], 1937);
        assert_eq!(full["averageRating"], 0.0);
        assert_eq!(full["user"], "u1");
    }
}
