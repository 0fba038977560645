use std::path::Path;

use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use uuid::Uuid;

use ig_core::{
    DGNode, GENERATION_SEED, Idea, NodeId, NodeStore, NodeType, NodeUpdate, SimilarityCandidate,
};

use crate::error::{Result, StoreError};
use crate::schema;

const NODE_COLUMNS: &str =
    "id, owner, node_type, name, arc_list, comp_arc_list, forward_id, copy_id, generation";
const IDEA_COLUMNS: &str = "id, owner, title, content, tags, energy, archived";

/// SQLite-backed [`NodeStore`]. One connection; every trait call is one
/// statement or one short transaction.
pub struct SqliteStore {
    conn: Connection,
}

/// Row counts reported by `ig stats`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub nodes: u64,
    pub ideas: u64,
    pub archived: u64,
    /// Nodes carrying a forward reference.
    pub superseded: u64,
    /// Nodes that point at a materialized copy.
    pub materialized: u64,
    pub relations: u64,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Transactions ---

    /// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// Nested calls join the outer transaction.
    pub fn atomically<T, E>(
        &self,
        f: impl FnOnce(&Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        if !self.conn.is_autocommit() {
            return f(self);
        }

        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;
        match f(self) {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                tracing::info!("atomic unit failed, rolled back");
                Err(e)
            }
        }
    }

    /// Multi-statement write: its own transaction unless one is open.
    fn write_batch<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return f(&self.conn);
        }
        let tx = self.conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).optional()?;
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Nodes ---

    pub fn load_node(&self, id: NodeId) -> Result<Option<DGNode>> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.to_string()], NodeRow::read)
            .optional()?
            .map(NodeRow::into_node)
            .transpose()
    }

    pub fn save_node(&self, node: &DGNode) -> Result<()> {
        insert_node(&self.conn, node)
    }

    /// Write the fields set in `update`. Returns whether the node exists.
    ///
    /// A forward reference is only written onto a node without one; a node
    /// forwarded in the meantime yields `ForwardConflict` and is left as is.
    pub fn update_node(&self, id: NodeId, update: &NodeUpdate) -> Result<bool> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(arcs) = &update.arc_list {
            sets.push("arc_list = ?");
            values.push(Box::new(serde_json::to_string(arcs)?));
        }
        if let Some(arcs) = &update.comp_arc_list {
            sets.push("comp_arc_list = ?");
            values.push(Box::new(serde_json::to_string(arcs)?));
        }
        if let Some(forward) = update.forward_id {
            sets.push("forward_id = ?");
            values.push(Box::new(forward.to_string()));
        }
        if let Some(copy) = update.copy_id {
            sets.push("copy_id = ?");
            values.push(Box::new(copy.to_string()));
        }
        if let Some(generation) = update.generation {
            sets.push("generation = ?");
            values.push(Box::new(to_db_int(generation)?));
        }

        if sets.is_empty() {
            return Ok(self.load_node(id)?.is_some());
        }

        let mut sql = format!("UPDATE nodes SET {} WHERE id = ?", sets.join(", "));
        if update.forward_id.is_some() {
            sql.push_str(" AND forward_id IS NULL");
        }
        values.push(Box::new(id.to_string()));
        let changed = self.conn.execute(&sql, params_from_iter(values.iter()))?;

        if changed == 0 && update.forward_id.is_some() && self.load_node(id)?.is_some() {
            tracing::warn!(%id, "forward reference already set, update skipped");
            return Err(StoreError::ForwardConflict(id));
        }
        Ok(changed > 0)
    }

    /// Atomic per-owner increment. The first value issued is `GENERATION_SEED + 1`.
    pub fn bump_generation(&self, owner: &str) -> Result<u64> {
        let value: i64 = self.conn.query_row(
            "INSERT INTO generations (owner, value) VALUES (?1, ?2)
             ON CONFLICT(owner) DO UPDATE SET value = value + 1
             RETURNING value",
            params![owner, to_db_int(GENERATION_SEED + 1)?],
            |row| row.get(0),
        )?;
        from_db_int(value)
    }

    // --- Ideas ---

    pub fn load_idea(&self, id: NodeId) -> Result<Option<Idea>> {
        let sql = format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.to_string()], IdeaRow::read)
            .optional()?
            .map(IdeaRow::into_idea)
            .transpose()
    }

    pub fn save_idea(&self, idea: &Idea, node: &DGNode) -> Result<()> {
        if idea.id != node.id {
            return Err(StoreError::InvalidData(format!(
                "idea {} must share its node's id {}",
                idea.id, node.id
            )));
        }
        self.write_batch(|conn| {
            insert_node(conn, node)?;
            conn.execute(
                "INSERT INTO ideas (id, owner, title, content, tags, energy, archived)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    idea.id.to_string(),
                    idea.owner,
                    idea.title,
                    idea.content,
                    serde_json::to_string(&idea.tags)?,
                    idea.energy,
                    idea.archived,
                ],
            )?;
            Ok(())
        })
    }

    /// Ideas of `owner` in creation order, archived ones included on request.
    pub fn list_ideas(&self, owner: &str, include_archived: bool) -> Result<Vec<Idea>> {
        let sql = format!(
            "SELECT {IDEA_COLUMNS} FROM ideas WHERE owner = ?1 AND (?2 OR archived = 0) ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<IdeaRow> = stmt
            .query_map(params![owner, include_archived], IdeaRow::read)?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter().map(IdeaRow::into_idea).collect()
    }

    /// Returns whether the idea exists.
    pub fn set_archived(&self, id: NodeId, archived: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE ideas SET archived = ?1 WHERE id = ?2",
            params![archived, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    // --- Relations ---

    /// Persist discovered candidates for `source`, replacing earlier strengths.
    pub fn save_relations(
        &self,
        source: NodeId,
        candidates: &[SimilarityCandidate],
    ) -> Result<usize> {
        self.write_batch(|conn| {
            let mut stmt = conn.prepare(
                "INSERT OR REPLACE INTO relations (source_id, target_id, strength) VALUES (?1, ?2, ?3)",
            )?;
            for candidate in candidates {
                stmt.execute(params![
                    source.to_string(),
                    candidate.id.to_string(),
                    candidate.strength
                ])?;
            }
            Ok(candidates.len())
        })
    }

    /// Saved relations of `source`, strongest first.
    pub fn relations(&self, source: NodeId) -> Result<Vec<SimilarityCandidate>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_id, strength FROM relations WHERE source_id = ?1
             ORDER BY strength DESC, rowid",
        )?;
        let rows: Vec<(String, f64)> = stmt
            .query_map([source.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter()
            .map(|(id, strength)| {
                Ok(SimilarityCandidate {
                    id: parse_id(&id)?,
                    strength,
                })
            })
            .collect()
    }

    // --- Stats ---

    pub fn stats(&self) -> Result<StoreStats> {
        let counts: [i64; 6] = self.conn.query_row(
            "SELECT
                (SELECT count(*) FROM nodes),
                (SELECT count(*) FROM ideas),
                (SELECT count(*) FROM ideas WHERE archived = 1),
                (SELECT count(*) FROM nodes WHERE forward_id IS NOT NULL),
                (SELECT count(*) FROM nodes WHERE copy_id IS NOT NULL),
                (SELECT count(*) FROM relations)",
            [],
            |row| {
                Ok([
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ])
            },
        )?;
        let [nodes, ideas, archived, superseded, materialized, relations] =
            counts.map(|c| c.max(0) as u64);
        Ok(StoreStats {
            nodes,
            ideas,
            archived,
            superseded,
            materialized,
            relations,
        })
    }
}

impl NodeStore for SqliteStore {
    fn get(&self, id: NodeId) -> ig_core::Result<Option<DGNode>> {
        Ok(self.load_node(id)?)
    }

    fn create(&self, node: DGNode) -> ig_core::Result<NodeId> {
        self.save_node(&node)?;
        Ok(node.id)
    }

    fn update(&self, id: NodeId, update: &NodeUpdate) -> ig_core::Result<()> {
        if self.update_node(id, update)? {
            Ok(())
        } else {
            Err(ig_core::Error::NodeNotFound(id))
        }
    }

    fn next_generation(&self, owner: &str) -> ig_core::Result<u64> {
        Ok(self.bump_generation(owner)?)
    }

    fn get_idea(&self, id: NodeId) -> ig_core::Result<Option<Idea>> {
        Ok(self.load_idea(id)?)
    }

    fn create_idea(&self, idea: Idea, node: DGNode) -> ig_core::Result<NodeId> {
        self.save_idea(&idea, &node)?;
        Ok(idea.id)
    }

    fn list_active(&self, owner: &str) -> ig_core::Result<Vec<Idea>> {
        Ok(self.list_ideas(owner, false)?)
    }

    fn archive_idea(&self, id: NodeId) -> ig_core::Result<()> {
        if self.set_archived(id, true)? {
            Ok(())
        } else {
            Err(ig_core::Error::NodeNotFound(id))
        }
    }
}

fn insert_node(conn: &Connection, node: &DGNode) -> Result<()> {
    conn.execute(
        "INSERT INTO nodes (id, owner, node_type, name, arc_list, comp_arc_list, forward_id, copy_id, generation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            node.id.to_string(),
            node.owner,
            node.node_type.as_str(),
            node.name,
            serde_json::to_string(&node.arc_list)?,
            serde_json::to_string(&node.comp_arc_list)?,
            node.forward_id.map(|id| id.to_string()),
            node.copy_id.map(|id| id.to_string()),
            to_db_int(node.generation)?,
        ],
    )?;
    Ok(())
}

struct NodeRow {
    id: String,
    owner: String,
    node_type: String,
    name: Option<String>,
    arc_list: String,
    comp_arc_list: String,
    forward_id: Option<String>,
    copy_id: Option<String>,
    generation: i64,
}

impl NodeRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            node_type: row.get(2)?,
            name: row.get(3)?,
            arc_list: row.get(4)?,
            comp_arc_list: row.get(5)?,
            forward_id: row.get(6)?,
            copy_id: row.get(7)?,
            generation: row.get(8)?,
        })
    }

    fn into_node(self) -> Result<DGNode> {
        Ok(DGNode {
            id: parse_id(&self.id)?,
            owner: self.owner,
            node_type: NodeType::from_str_lossy(&self.node_type),
            name: self.name,
            arc_list: serde_json::from_str(&self.arc_list)?,
            comp_arc_list: serde_json::from_str(&self.comp_arc_list)?,
            forward_id: self.forward_id.as_deref().map(parse_id).transpose()?,
            copy_id: self.copy_id.as_deref().map(parse_id).transpose()?,
            generation: from_db_int(self.generation)?,
        })
    }
}

struct IdeaRow {
    id: String,
    owner: String,
    title: String,
    content: Option<String>,
    tags: String,
    energy: i64,
    archived: bool,
}

impl IdeaRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            tags: row.get(4)?,
            energy: row.get(5)?,
            archived: row.get(6)?,
        })
    }

    fn into_idea(self) -> Result<Idea> {
        let energy = u8::try_from(self.energy)
            .map_err(|_| StoreError::InvalidData(format!("energy out of range: {}", self.energy)))?;
        Ok(Idea {
            id: parse_id(&self.id)?,
            owner: self.owner,
            title: self.title,
            content: self.content,
            tags: serde_json::from_str(&self.tags)?,
            energy: ig_core::clamp_energy(energy),
            archived: self.archived,
        })
    }
}

fn parse_id(s: &str) -> Result<NodeId> {
    Uuid::parse_str(s)
        .map(NodeId)
        .map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}

fn to_db_int(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| StoreError::InvalidData(format!("integer out of range: {v}")))
}

fn from_db_int(v: i64) -> Result<u64> {
    u64::try_from(v).map_err(|_| StoreError::InvalidData(format!("negative integer: {v}")))
}
