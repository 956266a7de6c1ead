//! In-process document collections.
//!
//! A [`Collection`] owns documents keyed by id and enforces the unique
//! indexes each document declares. Index checks and writes happen under the
//! same write lock, so two concurrent inserts can never both claim a key.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Errors surfaced by collection writes.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{collection}: duplicate value for unique index '{index}'")]
    DuplicateKey {
        collection: &'static str,
        index: &'static str,
    },

    #[error("{collection}: document '{id}' already exists")]
    DuplicateId { collection: &'static str, id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A value claimed by a document in one of its unique indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub index: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(index: &'static str, value: impl Into<String>) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }
}

/// A record stored in a [`Collection`].
pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Keys this document claims. Sparse indexes simply omit the key when
    /// the field is absent.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

struct Inner<D> {
    docs: HashMap<String, D>,
    unique: HashMap<UniqueKey, String>,
}

impl<D: Document> Inner<D> {
    fn conflicting_key(&self, doc: &D) -> Option<&'static str> {
        doc.unique_keys().into_iter().find_map(|key| {
            match self.unique.get(&key) {
                Some(owner) if owner != doc.id() => Some(key.index),
                _ => None,
            }
        })
    }

    fn release_keys(&mut self, doc: &D) {
        for key in doc.unique_keys() {
            if self.unique.get(&key).map(String::as_str) == Some(doc.id()) {
                self.unique.remove(&key);
            }
        }
    }

    fn claim_keys(&mut self, doc: &D) {
        for key in doc.unique_keys() {
            self.unique.insert(key, doc.id().to_string());
        }
    }
}

pub struct Collection<D> {
    name: &'static str,
    inner: RwLock<Inner<D>>,
}

impl<D: Document> Collection<D> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(Inner {
                docs: HashMap::new(),
                unique: HashMap::new(),
            }),
        }
    }

    /// Insert a new document, failing if its id or any unique key is taken.
    pub async fn insert(&self, doc: D) -> Result<(), DbError> {
        let mut inner = self.inner.write().await;

        if inner.docs.contains_key(doc.id()) {
            return Err(DbError::DuplicateId {
                collection: self.name,
                id: doc.id().to_string(),
            });
        }
        if let Some(index) = inner.conflicting_key(&doc) {
            return Err(DbError::DuplicateKey {
                collection: self.name,
                index,
            });
        }

        inner.claim_keys(&doc);
        inner.docs.insert(doc.id().to_string(), doc);
        tracing::trace!(collection = self.name, "document inserted");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<D> {
        self.inner.read().await.docs.get(id).cloned()
    }

    pub async fn find<P>(&self, predicate: P) -> Vec<D>
    where
        P: Fn(&D) -> bool,
    {
        self.inner
            .read()
            .await
            .docs
            .values()
            .filter(|doc| predicate(doc))
            .cloned()
            .collect()
    }

    /// First document matching `predicate`, in no particular order.
    pub async fn find_one<P>(&self, predicate: P) -> Option<D>
    where
        P: Fn(&D) -> bool,
    {
        self.inner
            .read()
            .await
            .docs
            .values()
            .find(|doc| predicate(doc))
            .cloned()
    }

    #[cfg(test)]
    async fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&D) -> bool,
    {
        self.inner
            .read()
            .await
            .docs
            .values()
            .filter(|doc| predicate(doc))
            .count()
    }

    /// Apply `change` to the stored document and re-check unique indexes.
    ///
    /// Returns `Ok(None)` when no document has that id. On a key conflict the
    /// stored document is left untouched.
    pub async fn modify<F>(&self, id: &str, change: F) -> Result<Option<D>, DbError>
    where
        F: FnOnce(&mut D),
    {
        let mut inner = self.inner.write().await;

        let Some(current) = inner.docs.get(id).cloned() else {
            return Ok(None);
        };
        let mut updated = current.clone();
        change(&mut updated);

        if updated.id() != current.id() {
            return Err(DbError::Other(anyhow::anyhow!(
                "{}: document id cannot change",
                self.name
            )));
        }
        if let Some(index) = inner.conflicting_key(&updated) {
            return Err(DbError::DuplicateKey {
                collection: self.name,
                index,
            });
        }

        inner.release_keys(&current);
        inner.claim_keys(&updated);
        inner.docs.insert(id.to_string(), updated.clone());
        Ok(Some(updated))
    }

    pub async fn remove(&self, id: &str) -> Option<D> {
        let mut inner = self.inner.write().await;
        let doc = inner.docs.remove(id)?;
        inner.release_keys(&doc);
        Some(doc)
    }

    /// Remove every matching document, returning how many were removed.
    pub async fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&D) -> bool,
    {
        let mut inner = self.inner.write().await;
        let doomed: Vec<String> = inner
            .docs
            .values()
            .filter(|doc| predicate(doc))
            .map(|doc| doc.id().to_string())
            .collect();

        for id in &doomed {
            if let Some(doc) = inner.docs.remove(id) {
                inner.release_keys(&doc);
            }
        }
        doomed.len()
    }
}
