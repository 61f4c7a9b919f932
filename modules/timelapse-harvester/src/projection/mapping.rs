use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use timelapse_common::{HarvestError, Result};

use super::ItemType;

/// Ordered output-field → attribute-path table for one item type.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingTable {
    item_type: ItemType,
    fields: Vec<(String, String)>,
}

impl MappingTable {
    pub fn new<I, F, P>(item_type: ItemType, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (F, P)>,
        F: Into<String>,
        P: Into<String>,
    {
        let mut table = Self {
            item_type,
            fields: Vec::new(),
        };
        for (field, path) in fields {
            let field: String = field.into();
            let path: String = path.into();
            if path.is_empty() || path.split('.').any(str::is_empty) {
                return Err(HarvestError::Config(format!(
                    "{item_type} mapping for `{field}` has malformed path {path:?}"
                )));
            }
            if table.fields.iter().any(|(f, _)| *f == field) {
                return Err(HarvestError::Config(format!(
                    "{item_type} mapping lists `{field}` twice"
                )));
            }
            table.fields.push((field, path));
        }
        Ok(table)
    }

    /// Parse a JSON object of `"field": "path"` pairs, keeping key order.
    pub fn from_json(item_type: ItemType, json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| {
                HarvestError::Config(format!("{item_type} mapping is not a JSON object: {e}"))
            })?;

        let mut fields = Vec::with_capacity(map.len());
        for (field, value) in map {
            let path = value.as_str().ok_or_else(|| {
                HarvestError::Config(format!(
                    "{item_type} mapping for `{field}` must be a string path"
                ))
            })?;
            fields.push((field, path.to_string()));
        }
        Self::new(item_type, fields)
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, p)| (f.as_str(), p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Paths whose first segment is not an attribute of the item type.
    pub fn unknown_paths(&self) -> Vec<String> {
        let known = self.item_type.attribute_names();
        self.fields
            .iter()
            .filter(|(_, path)| {
                let head = path.split('.').next().unwrap_or_default();
                !known.iter().any(|k| *k == head)
            })
            .map(|(_, path)| path.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// MappingSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MappingSource: Send + Sync {
    async fn table(&self, item_type: ItemType) -> Result<MappingTable>;
}

const DEFAULT_SUBMISSION: &str = include_str!("../../mappings/submission.json");
const DEFAULT_COMMENT: &str = include_str!("../../mappings/comment.json");
const DEFAULT_REDDITOR: &str = include_str!("../../mappings/redditor.json");

/// Tables held in memory; either the built-in defaults or tables supplied
/// by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticMappingSource {
    tables: HashMap<ItemType, MappingTable>,
}

impl StaticMappingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapping tables shipped in `mappings/`.
    pub fn defaults() -> Result<Self> {
        Ok(Self::new()
            .with_table(MappingTable::from_json(ItemType::Submission, DEFAULT_SUBMISSION)?)
            .with_table(MappingTable::from_json(ItemType::Comment, DEFAULT_COMMENT)?)
            .with_table(MappingTable::from_json(ItemType::Redditor, DEFAULT_REDDITOR)?))
    }

    pub fn with_table(mut self, table: MappingTable) -> Self {
        self.tables.insert(table.item_type(), table);
        self
    }
}

#[async_trait]
impl MappingSource for StaticMappingSource {
    async fn table(&self, item_type: ItemType) -> Result<MappingTable> {
        self.tables
            .get(&item_type)
            .cloned()
            .ok_or_else(|| HarvestError::Config(format!("no mapping table for {item_type}")))
    }
}

/// Reads `<dir>/<item_type>.json` on every request.
#[derive(Debug, Clone)]
pub struct FileMappingSource {
    dir: PathBuf,
}

impl FileMappingSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MappingSource for FileMappingSource {
    async fn table(&self, item_type: ItemType) -> Result<MappingTable> {
        let path = self.dir.join(format!("{item_type}.json"));
        let json = tokio::fs::read_to_string(&path).await.map_err(|e| {
            HarvestError::Config(format!("cannot read mapping {}: {e}", path.display()))
        })?;
        MappingTable::from_json(item_type, &json)
    }
}
