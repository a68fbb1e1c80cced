//! SQLite backed graph channel
//!
//! Holds node handles, labels, typed relationships and the small set of
//! indexed scalar properties used for exact-match lookups.

use super::types::{
    Direction, Label, NodeId, NodeProperty, NodeProps, OpenStore, RelType, Relationship, StorageError, StorageResult,
};
use crate::model::Rank;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Lifecycle of the bulk-load mode. A store can be bulk loaded once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkState {
    Never,
    Active,
    Closed,
}

/// SQLite-backed usage graph
///
/// Thread-safe via internal mutex on the connection. Batches are explicit:
/// [`GraphDb::begin`] opens a transaction that stays open until
/// [`GraphDb::commit`].
pub struct GraphDb {
    conn: Mutex<Connection>,
    bulk: Mutex<BulkState>,
}

impl GraphDb {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                taxon_id TEXT,
                scientific_name TEXT,
                canonical_name TEXT,
                rank TEXT
            );

            CREATE TABLE IF NOT EXISTS node_labels (
                node INTEGER NOT NULL,
                label TEXT NOT NULL,
                PRIMARY KEY (node, label)
            ) WITHOUT ROWID;

            CREATE INDEX IF NOT EXISTS idx_labels_label
                ON node_labels(label, node);

            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_node INTEGER NOT NULL,
                end_node INTEGER NOT NULL,
                rel_type TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_edges_start
                ON edges(start_node, rel_type);
            CREATE INDEX IF NOT EXISTS idx_edges_end
                ON edges(end_node, rel_type);

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Self::create_property_indexes(conn)
    }

    fn create_property_indexes(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_taxon_id ON nodes(taxon_id);
            CREATE INDEX IF NOT EXISTS idx_nodes_scientific_name ON nodes(scientific_name);
            CREATE INDEX IF NOT EXISTS idx_nodes_canonical_name ON nodes(canonical_name);
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            bulk: Mutex::new(BulkState::Never),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn bulk_state(&self) -> StorageResult<MutexGuard<'_, BulkState>> {
        self.bulk.lock().map_err(|_| StorageError::Poisoned)
    }

    // === Bulk mode ===

    /// Drops the property indexes for fast unchecked inserts.
    ///
    /// Only allowed once per store, before any bulk load has been closed.
    pub fn enter_bulk_mode(&self) -> StorageResult<()> {
        let mut state = self.bulk_state()?;
        if *state != BulkState::Never {
            return Err(StorageError::BulkModeClosed);
        }
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            DROP INDEX IF EXISTS idx_nodes_taxon_id;
            DROP INDEX IF EXISTS idx_nodes_scientific_name;
            DROP INDEX IF EXISTS idx_nodes_canonical_name;
            PRAGMA synchronous = OFF;
            "#,
        )?;
        *state = BulkState::Active;
        debug!("Graph entered bulk mode");
        Ok(())
    }

    pub fn is_bulk_mode(&self) -> StorageResult<bool> {
        Ok(*self.bulk_state()? == BulkState::Active)
    }

    /// Leaves bulk mode and builds the property indexes.
    ///
    /// Fails with [`StorageError::TaxonIdNotUnique`] if two nodes share a
    /// taxonID. The store stays unindexed in that case and cannot be
    /// bulk loaded again.
    pub fn close_bulk_mode(&self) -> StorageResult<()> {
        let mut state = self.bulk_state()?;
        if *state != BulkState::Active {
            return Err(StorageError::BulkModeClosed);
        }
        *state = BulkState::Closed;
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        let duplicate = conn
            .query_row(
                "SELECT taxon_id, MIN(id), MAX(id) FROM nodes WHERE taxon_id IS NOT NULL
                 GROUP BY taxon_id HAVING COUNT(*) > 1 ORDER BY MIN(id) LIMIT 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
            )
            .optional()?;
        if let Some((taxon_id, existing, added)) = duplicate {
            error!(%taxon_id, existing, added, "Duplicate taxonID found when closing bulk mode");
            return Err(StorageError::TaxonIdNotUnique {
                taxon_id,
                existing: NodeId::new(existing),
                added: NodeId::new(added),
            });
        }
        Self::create_property_indexes(&conn)?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        info!("Graph bulk mode closed, property indexes built");
        Ok(())
    }

    // === Transactions ===

    /// Opens a batch transaction unless one is already open.
    pub fn begin(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Commits the open batch transaction, if any.
    pub fn commit(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    // === Nodes ===

    pub fn create_node(&self) -> StorageResult<NodeId> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO nodes DEFAULT VALUES", [])?;
        Ok(NodeId::new(conn.last_insert_rowid()))
    }

    /// Writes the indexed properties of a node.
    ///
    /// Outside bulk mode a taxonID already used by another node is rejected
    /// with [`StorageError::TaxonIdNotUnique`].
    pub fn set_props(&self, node: NodeId, props: &NodeProps) -> StorageResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE nodes SET taxon_id = ?1, scientific_name = ?2, canonical_name = ?3, rank = ?4 WHERE id = ?5",
            params![
                props.taxon_id,
                props.scientific_name,
                props.canonical_name,
                props.rank.map(Rank::as_str),
                node.get()
            ],
        );
        match updated {
            Ok(0) => Err(StorageError::NodeNotFound(node)),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                let taxon_id = props.taxon_id.clone().unwrap_or_default();
                let existing: i64 = conn.query_row(
                    "SELECT id FROM nodes WHERE taxon_id = ?1",
                    params![taxon_id],
                    |row| row.get(0),
                )?;
                Err(StorageError::TaxonIdNotUnique {
                    taxon_id,
                    existing: NodeId::new(existing),
                    added: node,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn props(&self, node: NodeId) -> StorageResult<Option<NodeProps>> {
        let conn = self.conn()?;
        let props = conn
            .query_row(
                "SELECT taxon_id, scientific_name, canonical_name, rank FROM nodes WHERE id = ?1",
                params![node.get()],
                Self::row_to_props,
            )
            .optional()?;
        Ok(props)
    }

    fn row_to_props(row: &Row<'_>) -> rusqlite::Result<NodeProps> {
        let rank: Option<String> = row.get(3)?;
        Ok(NodeProps {
            taxon_id: row.get(0)?,
            scientific_name: row.get(1)?,
            canonical_name: row.get(2)?,
            rank: rank.as_deref().and_then(Rank::from_code),
        })
    }

    /// All nodes with the exact property value, ordered by node id.
    pub fn find_nodes(&self, property: NodeProperty, value: &str) -> StorageResult<Vec<NodeId>> {
        let conn = self.conn()?;
        let sql = format!("SELECT id FROM nodes WHERE {} = ?1 ORDER BY id", property.column());
        let mut stmt = conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map(params![value], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(NodeId::new).collect())
    }

    /// The single node with the property value.
    ///
    /// Returns [`StorageError::NotUnique`] if more than one node matches.
    pub fn find_unique(&self, property: NodeProperty, value: &str) -> StorageResult<Option<NodeId>> {
        let mut nodes = self.find_nodes(property, value)?;
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop()),
            _ => Err(StorageError::NotUnique {
                property,
                value: value.to_string(),
            }),
        }
    }

    /// Up to `limit` node ids greater than `after`, ascending.
    ///
    /// Paging by id also visits nodes created while iterating.
    pub fn node_ids_after(&self, after: Option<NodeId>, limit: usize) -> StorageResult<Vec<NodeId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT id FROM nodes WHERE id > ?1 ORDER BY id LIMIT ?2")?;
        let ids = stmt
            .query_map(params![after.map_or(0, NodeId::get), limit as i64], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(NodeId::new).collect())
    }

    pub fn all_nodes(&self) -> StorageResult<Vec<NodeId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT id FROM nodes ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(NodeId::new).collect())
    }

    pub fn count_nodes(&self) -> StorageResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    // === Labels ===

    pub fn add_label(&self, node: NodeId, label: Label) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO node_labels (node, label) VALUES (?1, ?2)",
            params![node.get(), label.as_str()],
        )?;
        Ok(())
    }

    pub fn remove_label(&self, node: NodeId, label: Label) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM node_labels WHERE node = ?1 AND label = ?2",
            params![node.get(), label.as_str()],
        )?;
        Ok(())
    }

    pub fn has_label(&self, node: NodeId, label: Label) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM node_labels WHERE node = ?1 AND label = ?2",
                params![node.get(), label.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn labels(&self, node: NodeId) -> StorageResult<Vec<Label>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT label FROM node_labels WHERE node = ?1 ORDER BY label")?;
        let labels = stmt
            .query_map(params![node.get()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels.iter().filter_map(|l| Label::from_code(l)).collect())
    }

    /// Nodes carrying the label, ordered by node id.
    pub fn nodes_with_label(&self, label: Label) -> StorageResult<Vec<NodeId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT node FROM node_labels WHERE label = ?1 ORDER BY node")?;
        let ids = stmt
            .query_map(params![label.as_str()], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(NodeId::new).collect())
    }

    // === Relationships ===

    pub fn add_edge(&self, start: NodeId, end: NodeId, rel_type: RelType) -> StorageResult<Relationship> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO edges (start_node, end_node, rel_type) VALUES (?1, ?2, ?3)",
            params![start.get(), end.get(), rel_type.as_str()],
        )?;
        Ok(Relationship {
            id: conn.last_insert_rowid(),
            start,
            end,
            rel_type,
        })
    }

    pub fn delete_edge(&self, rel: &Relationship) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM edges WHERE id = ?1", params![rel.id])?;
        Ok(())
    }

    /// Relationships of a node, optionally restricted to one type, ordered by
    /// creation.
    pub fn edges(&self, node: NodeId, rel_type: Option<RelType>, dir: Direction) -> StorageResult<Vec<Relationship>> {
        let conn = self.conn()?;
        let condition = match dir {
            Direction::Outgoing => "start_node = ?1",
            Direction::Incoming => "end_node = ?1",
            Direction::Both => "(start_node = ?1 OR end_node = ?1)",
        };
        let sql = format!(
            "SELECT id, start_node, end_node, rel_type FROM edges WHERE {} AND (?2 IS NULL OR rel_type = ?2) ORDER BY id",
            condition
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![node.get(), rel_type.map(RelType::as_str)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, start, end, rel)| {
                Some(Relationship {
                    id,
                    start: NodeId::new(start),
                    end: NodeId::new(end),
                    rel_type: RelType::from_code(&rel)?,
                })
            })
            .collect())
    }

    /// The first relationship of the given type and direction.
    pub fn single_edge(&self, node: NodeId, rel_type: RelType, dir: Direction) -> StorageResult<Option<Relationship>> {
        Ok(self.edges(node, Some(rel_type), dir)?.into_iter().next())
    }

    pub fn has_edge(&self, node: NodeId, rel_type: RelType, dir: Direction) -> StorageResult<bool> {
        Ok(self.single_edge(node, rel_type, dir)?.is_some())
    }

    /// Nodes on the other side of the node's relationships.
    pub fn neighbours(&self, node: NodeId, rel_type: RelType, dir: Direction) -> StorageResult<Vec<NodeId>> {
        Ok(self
            .edges(node, Some(rel_type), dir)?
            .iter()
            .map(|r| r.other(node))
            .collect())
    }

    /// Deletes matching relationships and returns how many were removed.
    pub fn delete_edges(&self, node: NodeId, rel_type: Option<RelType>, dir: Direction) -> StorageResult<usize> {
        let rels = self.edges(node, rel_type, dir)?;
        for rel in &rels {
            self.delete_edge(rel)?;
        }
        Ok(rels.len())
    }

    pub fn count_edges(&self, rel_type: RelType) -> StorageResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE rel_type = ?1",
            params![rel_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Every relationship of one type, ordered by id.
    pub fn all_edges(&self, rel_type: RelType) -> StorageResult<Vec<Relationship>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, start_node, end_node FROM edges WHERE rel_type = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![rel_type.as_str()], |row| {
                Ok(Relationship {
                    id: row.get(0)?,
                    start: NodeId::new(row.get(1)?),
                    end: NodeId::new(row.get(2)?),
                    rel_type,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl OpenStore for GraphDb {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> GraphDb {
        GraphDb::open_in_memory().unwrap()
    }

    fn props(taxon_id: &str, name: &str) -> NodeProps {
        NodeProps {
            taxon_id: Some(taxon_id.to_string()),
            scientific_name: Some(name.to_string()),
            canonical_name: Some(name.to_string()),
            rank: Some(Rank::Species),
        }
    }

    // ========================================================================
    // Nodes & Properties
    // ========================================================================

    #[test]
    fn test_node_props_persistence() {
        let db = create_test_store();
        let n = db.create_node().unwrap();
        db.set_props(n, &props("t1", "Abies alba")).unwrap();

        let loaded = db.props(n).unwrap().unwrap();
        assert_eq!(loaded.taxon_id.as_deref(), Some("t1"));
        assert_eq!(loaded.rank, Some(Rank::Species));
        assert_eq!(db.find_unique(NodeProperty::TaxonId, "t1").unwrap(), Some(n));
        assert_eq!(db.find_unique(NodeProperty::TaxonId, "t2").unwrap(), None);
    }

    #[test]
    fn test_find_unique_reports_duplicates() {
        let db = create_test_store();
        for id in ["t1", "t2"] {
            let n = db.create_node().unwrap();
            db.set_props(n, &props(id, "Abies alba")).unwrap();
        }
        let err = db.find_unique(NodeProperty::ScientificName, "Abies alba").unwrap_err();
        assert!(matches!(err, StorageError::NotUnique { .. }));
        assert_eq!(db.find_nodes(NodeProperty::CanonicalName, "Abies alba").unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_taxon_id_rejected_outside_bulk_mode() {
        let db = create_test_store();
        let a = db.create_node().unwrap();
        db.set_props(a, &props("t1", "Abies alba")).unwrap();
        let b = db.create_node().unwrap();
        let err = db.set_props(b, &props("t1", "Abies nordmanniana")).unwrap_err();
        match err {
            StorageError::TaxonIdNotUnique { taxon_id, existing, added } => {
                assert_eq!(taxon_id, "t1");
                assert_eq!(existing, a);
                assert_eq!(added, b);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_node_paging_sees_new_nodes() {
        let db = create_test_store();
        let first = db.create_node().unwrap();
        let page = db.node_ids_after(None, 10).unwrap();
        assert_eq!(page, vec![first]);
        let second = db.create_node().unwrap();
        assert_eq!(db.node_ids_after(Some(first), 10).unwrap(), vec![second]);
    }

    // ========================================================================
    // Bulk mode
    // ========================================================================

    #[test]
    fn test_bulk_mode_reports_duplicates_on_close() {
        let db = create_test_store();
        db.enter_bulk_mode().unwrap();
        db.begin().unwrap();
        let a = db.create_node().unwrap();
        db.set_props(a, &props("dup", "Abies alba")).unwrap();
        let b = db.create_node().unwrap();
        db.set_props(b, &props("dup", "Abies alba")).unwrap();

        let err = db.close_bulk_mode().unwrap_err();
        match err {
            StorageError::TaxonIdNotUnique { taxon_id, existing, added } => {
                assert_eq!(taxon_id, "dup");
                assert_eq!(existing, a);
                assert_eq!(added, b);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bulk_mode_is_one_way() {
        let db = create_test_store();
        db.enter_bulk_mode().unwrap();
        assert!(db.is_bulk_mode().unwrap());
        db.close_bulk_mode().unwrap();
        assert!(!db.is_bulk_mode().unwrap());
        assert!(matches!(db.enter_bulk_mode(), Err(StorageError::BulkModeClosed)));
        assert!(matches!(db.close_bulk_mode(), Err(StorageError::BulkModeClosed)));
    }

    // ========================================================================
    // Labels & Relationships
    // ========================================================================

    #[test]
    fn test_labels() {
        let db = create_test_store();
        let n = db.create_node().unwrap();
        db.add_label(n, Label::Taxon).unwrap();
        db.add_label(n, Label::Root).unwrap();
        db.add_label(n, Label::Root).unwrap();
        assert_eq!(db.nodes_with_label(Label::Root).unwrap(), vec![n]);
        db.remove_label(n, Label::Root).unwrap();
        assert!(!db.has_label(n, Label::Root).unwrap());
        assert_eq!(db.labels(n).unwrap(), vec![Label::Taxon]);
    }

    #[test]
    fn test_edges_by_direction_and_type() {
        let db = create_test_store();
        let parent = db.create_node().unwrap();
        let child = db.create_node().unwrap();
        let syn = db.create_node().unwrap();
        db.add_edge(parent, child, RelType::ParentOf).unwrap();
        db.add_edge(syn, child, RelType::SynonymOf).unwrap();

        assert_eq!(db.edges(child, None, Direction::Incoming).unwrap().len(), 2);
        assert_eq!(db.neighbours(child, RelType::ParentOf, Direction::Incoming).unwrap(), vec![parent]);
        assert!(db.has_edge(syn, RelType::SynonymOf, Direction::Outgoing).unwrap());
        assert!(!db.has_edge(syn, RelType::SynonymOf, Direction::Incoming).unwrap());
        assert_eq!(db.count_edges(RelType::ParentOf).unwrap(), 1);

        assert_eq!(db.delete_edges(child, Some(RelType::SynonymOf), Direction::Both).unwrap(), 1);
        assert_eq!(db.count_edges(RelType::SynonymOf).unwrap(), 0);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let n = {
            let db = GraphDb::open(&path).unwrap();
            let n = db.create_node().unwrap();
            db.set_props(n, &props("t1", "Abies alba")).unwrap();
            db.add_label(n, Label::Root).unwrap();
            n
        };
        let db = GraphDb::open(&path).unwrap();
        assert_eq!(db.find_unique(NodeProperty::TaxonId, "t1").unwrap(), Some(n));
        assert!(db.has_label(n, Label::Root).unwrap());
    }
}
