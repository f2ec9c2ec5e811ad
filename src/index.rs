//! Attribute indexes and the query predicate language (supplemental to the
//! distilled spec: `original_source`'s `fs_index.h`/`fs_query.h` describe a
//! per-volume table of declared attribute types plus a small query grammar
//! evaluated against them; `SPEC_FULL.md` §4.7 folds both in as a per-share
//! feature since this crate has no volume concept of its own).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result, Status};
use crate::lock::PriorityLock;

/// The attribute value types a query predicate can compare against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndexType {
    Int32,
    Int64,
    Float,
    Double,
    String,
}

impl IndexType {
    fn parse(s: &str) -> Option<IndexType> {
        match s {
            "int32" => Some(IndexType::Int32),
            "int64" => Some(IndexType::Int64),
            "float" => Some(IndexType::Float),
            "double" => Some(IndexType::Double),
            "string" => Some(IndexType::String),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            IndexType::Int32 => "int32",
            IndexType::Int64 => "int64",
            IndexType::Float => "float",
            IndexType::Double => "double",
            IndexType::String => "string",
        }
    }
}

/// Per-share table of declared attribute names, used only to validate and
/// describe a `ReadQuery` predicate's target attribute.
#[derive(Default)]
pub struct IndexTable {
    entries: PriorityLock<HashMap<String, IndexType>>,
}

impl IndexTable {
    pub fn new() -> Self {
        IndexTable { entries: PriorityLock::new(HashMap::new()) }
    }

    pub async fn create(&self, name: &str, type_name: &str) -> Result<()> {
        let index_type = IndexType::parse(type_name).ok_or(Error::Status(Status::InvalidArgument))?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            return Err(Error::Status(Status::Exist));
        }
        entries.insert(name.to_string(), index_type);
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        self.entries.write().await.remove(name).map(|_| ()).ok_or(Error::Status(Status::NoEntry))
    }

    pub async fn stat(&self, name: &str) -> Result<&'static str> {
        self.entries.read().await.get(name).map(|t| t.name()).ok_or(Error::Status(Status::NoEntry))
    }

    pub async fn list(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

/// Process-wide home for every share's [`IndexTable`], keyed by the
/// share's local path so the table outlives any one session and is shared
/// by every session mounting the same share (`SPEC_FULL.md` §4.7: indices
/// are a per-share feature, not per-connection). A reload that moves a
/// share to a new table index leaves its entry here untouched, since the
/// key is the stable local path rather than the table index.
#[derive(Default)]
pub struct IndexRegistry {
    tables: PriorityLock<HashMap<PathBuf, Arc<IndexTable>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        IndexRegistry { tables: PriorityLock::new(HashMap::new()) }
    }

    /// Returns the shared [`IndexTable`] for `share_root`, creating an
    /// empty one on first access.
    pub async fn get_or_create(&self, share_root: &Path) -> Arc<IndexTable> {
        if let Some(existing) = self.tables.read().await.get(share_root) {
            return existing.clone();
        }
        let mut tables = self.tables.write().await;
        tables.entry(share_root.to_path_buf()).or_insert_with(|| Arc::new(IndexTable::new())).clone()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

/// A single `<attribute> <op> <value>` predicate (`spec.md` §4.7 "ReadQuery").
/// Multi-term boolean expressions are out of scope for this crate.
struct Predicate {
    attribute: String,
    op: Op,
    value: String,
}

fn parse_predicate(query: &str) -> Result<Predicate> {
    let query = query.trim();
    for (token, op) in [(">=", Op::Ge), ("<=", Op::Le), ("!=", Op::Ne), ("=", Op::Eq), (">", Op::Gt), ("<", Op::Lt)] {
        if let Some((attr, value)) = query.split_once(token) {
            let value = value.trim().trim_matches('"');
            return Ok(Predicate { attribute: attr.trim().to_string(), op, value: value.to_string() });
        }
    }
    Err(Error::Status(Status::InvalidArgument))
}

fn compare(lhs: &str, op: Op, rhs: &str) -> bool {
    if let (Ok(l), Ok(r)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        return match op {
            Op::Eq => l == r,
            Op::Ne => l != r,
            Op::Gt => l > r,
            Op::Lt => l < r,
            Op::Ge => l >= r,
            Op::Le => l <= r,
        };
    }
    if let (Ok(l), Ok(r)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        return match op {
            Op::Eq => l == r,
            Op::Ne => l != r,
            Op::Gt => l > r,
            Op::Lt => l < r,
            Op::Ge => l >= r,
            Op::Le => l <= r,
        };
    }
    match op {
        Op::Eq => lhs == rhs,
        Op::Ne => lhs != rhs,
        Op::Gt => lhs > rhs,
        Op::Lt => lhs < rhs,
        Op::Ge => lhs >= rhs,
        Op::Le => lhs <= rhs,
    }
}

/// Evaluates `query` against every entry of `dir`, returning matching
/// names. `"name"` compares the entry's file name directly; any other
/// attribute is read from its sidecar via [`crate::fs::read_attrib`].
pub async fn evaluate(dir: &Path, query: &str) -> Result<Vec<String>> {
    let predicate = parse_predicate(query)?;
    let (entries, _) = crate::fs::read_dir(dir, 0).await?;

    let mut matches = Vec::new();
    for name in entries {
        let value = if predicate.attribute.eq_ignore_ascii_case("name") {
            Some(name.clone())
        } else {
            let path = dir.join(&name);
            crate::fs::read_attrib(&path, &predicate.attribute)
                .await
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        };
        if let Some(value) = value {
            if compare(&value, predicate.op, &predicate.value) {
                matches.push(name);
            }
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_stat_round_trips_declared_type() {
        let index = IndexTable::new();
        index.create("owner", "string").await.unwrap();
        assert_eq!(index.stat("owner").await.unwrap(), "string");
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let index = IndexTable::new();
        index.create("owner", "string").await.unwrap();
        assert!(index.create("owner", "string").await.is_err());
    }

    #[tokio::test]
    async fn remove_then_stat_not_found() {
        let index = IndexTable::new();
        index.create("owner", "string").await.unwrap();
        index.remove("owner").await.unwrap();
        assert!(index.stat("owner").await.is_err());
    }

    #[tokio::test]
    async fn evaluate_matches_by_name_equality() {
        let dir = tempfile::tempdir().unwrap();
        crate::fs::create(dir.path(), "a.txt", 0o644, false).await.unwrap();
        crate::fs::create(dir.path(), "b.txt", 0o644, false).await.unwrap();
        let matches = evaluate(dir.path(), "name = \"a.txt\"").await.unwrap();
        assert_eq!(matches, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn create_accepts_float_and_double_types() {
        let index = IndexTable::new();
        index.create("weight", "float").await.unwrap();
        index.create("area", "double").await.unwrap();
        assert_eq!(index.stat("weight").await.unwrap(), "float");
        assert_eq!(index.stat("area").await.unwrap(), "double");
    }

    #[test]
    fn compare_falls_back_to_float_parsing() {
        assert!(compare("1.5", Op::Lt, "2.25"));
        assert!(compare("3.0", Op::Eq, "3.0"));
    }

    #[tokio::test]
    async fn evaluate_matches_by_attribute_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::fs::create(dir.path(), "a.txt", 0o644, false).await.unwrap();
        crate::fs::write_attrib(&path, "owner", b"alice").await.unwrap();
        let matches = evaluate(dir.path(), "owner = \"alice\"").await.unwrap();
        assert_eq!(matches, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn registry_shares_one_table_per_path() {
        let registry = IndexRegistry::new();
        let path = Path::new("/srv/docs");

        let first = registry.get_or_create(path).await;
        first.create("owner", "string").await.unwrap();

        let second = registry.get_or_create(path).await;
        assert_eq!(second.stat("owner").await.unwrap(), "string");
    }

    #[tokio::test]
    async fn registry_keeps_distinct_paths_independent() {
        let registry = IndexRegistry::new();
        let a = registry.get_or_create(Path::new("/srv/a")).await;
        let b = registry.get_or_create(Path::new("/srv/b")).await;
        a.create("owner", "string").await.unwrap();
        assert!(b.stat("owner").await.is_err());
    }
}
