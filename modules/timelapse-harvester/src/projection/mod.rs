// Attribute projection: platform item → flat PostRecord.
//
// Each item type publishes a static accessor table (attribute name →
// extraction fn). Nested objects such as a submission's author are exposed
// as child nodes with their own tables, so a dotted path like `author.name`
// is resolved one segment at a time without any runtime reflection.

mod accessors;
mod mapping;

use std::fmt;
use std::str::FromStr;

use timelapse_common::{FieldValue, HarvestError, PostRecord, Result};

pub use accessors::{AuthorRef, SubredditRef};
pub use mapping::{FileMappingSource, MappingSource, MappingTable, StaticMappingSource};

// ---------------------------------------------------------------------------
// Item types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Submission,
    Comment,
    Redditor,
}

impl ItemType {
    pub const ALL: [ItemType; 3] = [ItemType::Submission, ItemType::Comment, ItemType::Redditor];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Submission => "submission",
            ItemType::Comment => "comment",
            ItemType::Redditor => "redditor",
        }
    }

    /// Top-level attribute names an item of this type exposes.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        match self {
            ItemType::Submission => accessors::names(accessors::SUBMISSION_ATTRS),
            ItemType::Comment => accessors::names(accessors::COMMENT_ATTRS),
            ItemType::Redditor => accessors::names(accessors::REDDITOR_ATTRS),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        ItemType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| HarvestError::Config(format!("unknown item type: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Projectable
// ---------------------------------------------------------------------------

/// Result of reading one attribute: a scalar, or a nested object that can be
/// traversed further.
pub enum Attr {
    Value(FieldValue),
    Node(Box<dyn Projectable>),
}

impl Attr {
    pub fn value(v: impl Into<FieldValue>) -> Self {
        Attr::Value(v.into())
    }

    /// A nested object, or `Empty` when it is absent.
    pub fn node<P: Projectable + 'static>(node: Option<P>) -> Self {
        match node {
            Some(n) => Attr::Node(Box::new(n)),
            None => Attr::Value(FieldValue::Empty),
        }
    }
}

/// Extraction function for one attribute of `T`.
pub type Accessor<T> = fn(&T) -> Attr;

pub trait Projectable {
    /// Object kind used in error messages (`submission`, `redditor`, ...).
    fn kind(&self) -> &'static str;

    /// Read one attribute; `None` if the object has no such attribute.
    fn attr(&self, name: &str) -> Option<Attr>;

    /// Value used when a path ends on this object rather than on a scalar.
    fn scalar(&self) -> FieldValue {
        FieldValue::Empty
    }
}

/// Resolve a dotted path against `item`.
pub fn resolve<T: Projectable + ?Sized>(
    item: &T,
    path: &str,
) -> std::result::Result<FieldValue, String> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = item
        .attr(first)
        .ok_or_else(|| format!("{} has no attribute `{first}`", item.kind()))?;

    for segment in segments {
        current = match current {
            Attr::Node(node) => node
                .attr(segment)
                .ok_or_else(|| format!("{} has no attribute `{segment}`", node.kind()))?,
            Attr::Value(FieldValue::Empty) => {
                return Err(format!("cannot read `{segment}` of an empty value"));
            }
            Attr::Value(_) => {
                return Err(format!("cannot read `{segment}` of a scalar value"));
            }
        };
    }

    Ok(match current {
        Attr::Value(value) => value,
        Attr::Node(node) => node.scalar(),
    })
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

/// Project `item` through `table`. Unresolvable paths become empty values;
/// with `strict` set they fail the projection instead.
pub fn project<T: Projectable + ?Sized>(
    item: &T,
    table: &MappingTable,
    strict: bool,
) -> Result<PostRecord> {
    if item.kind() != table.item_type().as_str() {
        return Err(HarvestError::Config(format!(
            "{} mapping table applied to a {}",
            table.item_type(),
            item.kind()
        )));
    }

    let mut record = PostRecord::with_capacity(table.len());
    for (field, path) in table.fields() {
        let value = match resolve(item, path) {
            Ok(value) => value,
            Err(reason) if strict => {
                return Err(HarvestError::AttributeResolution {
                    item_type: item.kind().to_string(),
                    path: path.to_string(),
                    reason,
                });
            }
            Err(_) => FieldValue::Empty,
        };
        record.insert(field, value);
    }
    Ok(record)
}

/// A mapping table bound to a debug flag, loaded once per run.
#[derive(Debug, Clone)]
pub struct Projector {
    table: MappingTable,
    strict: bool,
}

impl Projector {
    pub fn new(table: MappingTable, strict: bool) -> Self {
        Self { table, strict }
    }

    /// Load the table for `item_type` from `source`. Paths naming unknown
    /// attributes are logged, and rejected in strict mode.
    pub async fn load(
        source: &dyn MappingSource,
        item_type: ItemType,
        strict: bool,
    ) -> Result<Self> {
        let table = source.table(item_type).await?;
        let unknown = table.unknown_paths();
        if !unknown.is_empty() {
            if strict {
                return Err(HarvestError::Config(format!(
                    "{item_type} mapping references unknown attributes: {}",
                    unknown.join(", ")
                )));
            }
            tracing::warn!(
                %item_type,
                ?unknown,
                "Mapping references unknown attributes; they will project as empty"
            );
        }
        Ok(Self::new(table, strict))
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn project<T: Projectable + ?Sized>(&self, item: &T) -> Result<PostRecord> {
        project(item, &self.table, self.strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reddit_client::{Comment, Redditor};

    use crate::testing::submission;

    fn table(pairs: &[(&str, &str)]) -> MappingTable {
        MappingTable::new(ItemType::Submission, pairs.iter().copied()).unwrap()
    }

    #[test]
    fn record_has_exactly_the_table_keys_in_order() {
        let t = table(&[("a", "id"), ("b", "no_such_attr"), ("c", "created_utc")]);
        let record = project(&submission("abc", 1_700_000_000), &t, false).unwrap();

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(record.get("a"), Some(&FieldValue::from("abc")));
        assert_eq!(record.get("b"), Some(&FieldValue::Empty));
        assert_eq!(record.get("c"), Some(&FieldValue::Int(1_700_000_000)));
    }

    #[test]
    fn absent_values_are_empty_even_when_strict() {
        let mut item = submission("abc", 10);
        item.link_flair_text = None;
        let t = table(&[("flair", "link_flair_text")]);

        let record = project(&item, &t, true).unwrap();
        assert_eq!(record.get("flair"), Some(&FieldValue::Empty));
    }

    #[test]
    fn nested_paths_walk_child_objects() {
        let t = table(&[
            ("author", "author.name"),
            ("author_ref", "author.fullname"),
            ("sub", "subreddit.display_name"),
            ("sub_id", "subreddit.id"),
        ]);
        let record = project(&submission("abc", 10), &t, false).unwrap();

        assert_eq!(record.get("author"), Some(&FieldValue::from("someuser")));
        assert_eq!(record.get("author_ref"), Some(&FieldValue::from("t2_someuser")));
        assert_eq!(record.get("sub"), Some(&FieldValue::from("stocks")));
        assert_eq!(record.get("sub_id"), Some(&FieldValue::from("2qjfk")));
    }

    #[test]
    fn path_ending_on_an_object_uses_its_scalar() {
        let t = table(&[("author", "author"), ("subreddit", "subreddit")]);
        let record = project(&submission("abc", 10), &t, false).unwrap();

        assert_eq!(record.get("author"), Some(&FieldValue::from("someuser")));
        assert_eq!(record.get("subreddit"), Some(&FieldValue::from("stocks")));
    }

    #[test]
    fn deleted_author_projects_empty_unless_strict() {
        let mut item = submission("abc", 10);
        item.author = None;
        let t = table(&[("author", "author.name")]);

        let record = project(&item, &t, false).unwrap();
        assert_eq!(record.get("author"), Some(&FieldValue::Empty));

        let err = project(&item, &t, true).unwrap_err();
        match err {
            HarvestError::AttributeResolution { item_type, path, .. } => {
                assert_eq!(item_type, "submission");
                assert_eq!(path, "author.name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn strict_mode_rejects_unknown_attributes() {
        let t = table(&[("x", "score.value")]);
        let err = project(&submission("abc", 10), &t, true).unwrap_err();
        assert!(matches!(err, HarvestError::AttributeResolution { .. }));

        let t = table(&[("x", "nonexistent")]);
        assert!(project(&submission("abc", 10), &t, true).is_err());
    }

    #[test]
    fn table_for_another_item_type_is_refused() {
        let t = MappingTable::new(ItemType::Comment, [("id", "id")]).unwrap();
        let err = project(&submission("abc", 10), &t, false).unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn comments_and_redditors_project_through_their_own_tables() {
        let comment = Comment {
            id: "k1".to_string(),
            name: "t1_k1".to_string(),
            created_utc: 1_700_000_500.0,
            body: Some("to the moon".to_string()),
            author: Some("someuser".to_string()),
            link_id: Some("t3_abc".to_string()),
            ..Default::default()
        };
        let t = MappingTable::new(
            ItemType::Comment,
            [("id", "id"), ("post", "link_id"), ("by", "author.name"), ("at", "created_utc")],
        )
        .unwrap();
        let record = project(&comment, &t, true).unwrap();
        assert_eq!(record.get("post"), Some(&FieldValue::from("t3_abc")));
        assert_eq!(record.get("by"), Some(&FieldValue::from("someuser")));
        assert_eq!(record.get("at"), Some(&FieldValue::Int(1_700_000_500)));

        let redditor = Redditor {
            id: "9xyz".to_string(),
            name: "someuser".to_string(),
            link_karma: Some(120),
            ..Default::default()
        };
        let t = MappingTable::new(
            ItemType::Redditor,
            [("ref", "fullname"), ("karma", "link_karma"), ("since", "created_utc")],
        )
        .unwrap();
        let record = project(&redditor, &t, true).unwrap();
        assert_eq!(record.get("ref"), Some(&FieldValue::from("t2_9xyz")));
        assert_eq!(record.get("karma"), Some(&FieldValue::Int(120)));
        assert_eq!(record.get("since"), Some(&FieldValue::Empty));
    }

    #[test]
    fn item_type_round_trips_through_its_name() {
        for item_type in ItemType::ALL {
            assert_eq!(item_type.as_str().parse::<ItemType>().unwrap(), item_type);
        }
        assert!("subreddit".parse::<ItemType>().is_err());
    }

    #[tokio::test]
    async fn strict_loading_rejects_unknown_paths() {
        let source = StaticMappingSource::new().with_table(
            MappingTable::new(ItemType::Submission, [("id", "id"), ("k", "karma")]).unwrap(),
        );

        let lenient = Projector::load(&source, ItemType::Submission, false).await.unwrap();
        assert!(!lenient.is_strict());
        assert!(Projector::load(&source, ItemType::Submission, true).await.is_err());
    }
}
