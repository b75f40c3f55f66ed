//! redb table definitions for the document store.

use redb::TableDefinition;

/// Every document, keyed by `{kind}/{name}` with the kind lowercased.
pub const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
