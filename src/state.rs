use std::sync::Arc;

use anyhow::Context;
use shelf_authz::{IdentityProvider, StaticTokenProvider};
use shelf_kernel::settings::{PaginationSettings, Settings};

use crate::modules::books::service::BookService;
use crate::modules::reviews::service::ReviewService;
use crate::modules::search::service::SearchService;
use crate::query::QueryBuilder;
use crate::rating::RatingAggregator;
use crate::store::{BookRepository, MemoryStore, ReviewRepository, UserDirectory};

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub books: Arc<BookService>,
    pub reviews: Arc<ReviewService>,
    pub search: Arc<SearchService>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Wire the services on top of one store handle.
    pub fn with_store<S>(
        store: Arc<S>,
        identity: Arc<dyn IdentityProvider>,
        pagination: &PaginationSettings,
    ) -> Self
    where
        S: BookRepository + ReviewRepository + UserDirectory + 'static,
    {
        let books: Arc<dyn BookRepository> = store.clone();
        let reviews: Arc<dyn ReviewRepository> = store.clone();
        let users: Arc<dyn UserDirectory> = store;
        let ratings = Arc::new(RatingAggregator::new(books.clone(), reviews.clone()));

        Self {
            books: Arc::new(BookService::new(
                books.clone(),
                reviews.clone(),
                users,
                ratings.clone(),
                QueryBuilder::new(pagination),
            )),
            reviews: Arc::new(ReviewService::new(books.clone(), reviews, ratings)),
            search: Arc::new(SearchService::new(books)),
            identity,
        }
    }

    /// In-memory store with the configured users, authenticated by their
    /// static tokens.
    pub async fn in_memory(settings: &Settings) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_users(&settings.auth.users)
            .await
            .context("failed to seed user directory")?;

        let identity = Arc::new(StaticTokenProvider::new(&settings.auth.users));
        if identity.is_empty() {
            tracing::warn!("no users configured; every write endpoint will reject requests");
        }

        Ok(Self::with_store(store, identity, &settings.pagination))
    }
}
