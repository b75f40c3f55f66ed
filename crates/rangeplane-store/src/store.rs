//! Document persistence.
//!
//! [`DocumentStore`] is the interface the control plane depends on;
//! [`RedbStore`] is the embedded implementation.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rangeplane_types::{Document, Kind, document_key};
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::DOCUMENTS;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Persistence for `(kind, name)`-unique documents.
///
/// Implementations stamp `metadata.created` on create and
/// `metadata.updated` on every write, writing the stamps back into the
/// caller's document.
pub trait DocumentStore: Send + Sync {
    /// All documents of the given kinds, ordered by key. An empty slice
    /// lists every kind.
    fn list(&self, kinds: &[Kind]) -> StoreResult<Vec<Document>>;

    fn get(&self, kind: Kind, name: &str) -> StoreResult<Document>;

    /// Insert a new document. Fails with `AlreadyExists` if the key is taken.
    fn create(&self, doc: &mut Document) -> StoreResult<()>;

    /// Replace an existing document. Fails with `NotFound` if absent.
    fn update(&self, doc: &mut Document) -> StoreResult<()>;

    /// Remove a document. Fails with `NotFound` if absent.
    fn delete(&self, kind: Kind, name: &str) -> StoreResult<()>;

    fn exists(&self, kind: Kind, name: &str) -> StoreResult<bool> {
        match self.get(kind, name) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Thread-safe document store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "document store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory document store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Write `doc` under its key. `must_exist` selects update semantics,
    /// otherwise create semantics. The existence check and the write share
    /// one write transaction.
    fn write(&self, doc: &mut Document, must_exist: bool) -> StoreResult<()> {
        if doc.metadata.name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let key = doc.key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;

            let existing: Option<Document> = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?),
                None => None,
            };

            let now = Utc::now();
            match (existing, must_exist) {
                (Some(_), false) => {
                    return Err(StoreError::AlreadyExists {
                        kind: doc.kind,
                        name: doc.metadata.name.clone(),
                    });
                }
                (None, true) => {
                    return Err(StoreError::NotFound {
                        kind: doc.kind,
                        name: doc.metadata.name.clone(),
                    });
                }
                (Some(previous), true) => {
                    doc.metadata.created = previous.metadata.created.or(Some(now));
                }
                (None, false) => {
                    doc.metadata.created = Some(now);
                }
            }
            doc.metadata.updated = Some(now);

            let value = serde_json::to_vec(&*doc).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, update = must_exist, "document stored");
        Ok(())
    }
}

impl DocumentStore for RedbStore {
    fn list(&self, kinds: &[Kind]) -> StoreResult<Vec<Document>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let doc: Document = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if kinds.is_empty() || kinds.contains(&doc.kind) {
                results.push(doc);
            }
        }
        Ok(results)
    }

    fn get(&self, kind: Kind, name: &str) -> StoreResult<Document> {
        let key = document_key(kind, name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)),
            None => Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }

    fn create(&self, doc: &mut Document) -> StoreResult<()> {
        self.write(doc, false)
    }

    fn update(&self, doc: &mut Document) -> StoreResult<()> {
        self.write(doc, true)
    }

    fn delete(&self, kind: Kind, name: &str) -> StoreResult<()> {
        let key = document_key(kind, name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(DOCUMENTS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "document deleted");
        if existed {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangeplane_types::Metadata;
    use serde_json::json;

    fn topology(name: &str) -> Document {
        Document::raw(
            Kind::Topology,
            "v1",
            Metadata::named(name),
            json!({"nodes": [{"general": {"hostname": "host-00"}}]}),
        )
    }

    #[test]
    fn create_and_get() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut doc = topology("basic");

        store.create(&mut doc).unwrap();
        assert!(doc.metadata.created.is_some());
        assert_eq!(doc.metadata.created, doc.metadata.updated);

        let retrieved = store.get(Kind::Topology, "basic").unwrap();
        assert_eq!(retrieved, doc);
    }

    #[test]
    fn get_nonexistent_is_not_found() {
        let store = RedbStore::open_in_memory().unwrap();
        let err = store.get(Kind::Scenario, "nothing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: Kind::Scenario, .. }));
        assert!(!store.exists(Kind::Scenario, "nothing").unwrap());
    }

    #[test]
    fn create_twice_keeps_first_document() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut first = topology("basic");
        store.create(&mut first).unwrap();

        let mut second = topology("basic");
        second.spec = json!({"nodes": []});
        let err = store.create(&mut second).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        assert_eq!(store.get(Kind::Topology, "basic").unwrap(), first);
    }

    #[test]
    fn same_name_different_kind_is_distinct() {
        let store = RedbStore::open_in_memory().unwrap();
        store.create(&mut topology("basic")).unwrap();
        let mut scenario = Document::new(Kind::Scenario, "basic");
        store.create(&mut scenario).unwrap();
        assert_eq!(store.list(&[]).unwrap().len(), 2);
    }

    #[test]
    fn update_requires_existing_and_keeps_created() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut doc = topology("basic");
        assert!(matches!(store.update(&mut doc), Err(StoreError::NotFound { .. })));

        store.create(&mut doc).unwrap();
        let created = doc.metadata.created;

        doc.spec = json!({"nodes": []});
        doc.metadata.created = None;
        store.update(&mut doc).unwrap();

        let retrieved = store.get(Kind::Topology, "basic").unwrap();
        assert_eq!(retrieved.metadata.created, created);
        assert_eq!(retrieved.spec, json!({"nodes": []}));
        assert!(retrieved.metadata.updated >= created);
    }

    #[test]
    fn list_filters_by_kind() {
        let store = RedbStore::open_in_memory().unwrap();
        store.create(&mut topology("a")).unwrap();
        store.create(&mut topology("b")).unwrap();
        store.create(&mut Document::new(Kind::Image, "ubuntu")).unwrap();

        let topologies = store.list(&[Kind::Topology]).unwrap();
        let names: Vec<_> = topologies.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.list(&[Kind::Topology, Kind::Image]).unwrap().len(), 3);
        assert!(store.list(&[Kind::Role]).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_once() {
        let store = RedbStore::open_in_memory().unwrap();
        store.create(&mut topology("basic")).unwrap();

        store.delete(Kind::Topology, "basic").unwrap();
        assert!(matches!(store.delete(Kind::Topology, "basic"), Err(StoreError::NotFound { .. })));
        assert!(!store.exists(Kind::Topology, "basic").unwrap());
    }

    #[test]
    fn empty_name_is_rejected() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut doc = Document::new(Kind::Role, "");
        assert!(matches!(store.create(&mut doc), Err(StoreError::EmptyName)));
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rangeplane.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            store.create(&mut topology("basic")).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert!(store.exists(Kind::Topology, "basic").unwrap());
    }
}
