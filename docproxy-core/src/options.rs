//! Separation of query options from filter conditions.
//!
//! Lookups accept a single conditions document that mixes filter fields with
//! a small set of recognized option keys:
//!
//! ```ignore
//! use bson::doc;
//!
//! let (filter, options) = split_options(doc! { "color": "red", "limit": 10, "sort": { "count": -1 } });
//! assert_eq!(filter, doc! { "color": "red" });
//! assert_eq!(options.limit()?, Some(10));
//! ```
//!
//! Option keys are never forwarded to the store as filter criteria.

use bson::{Bson, Document};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Keys recognized as query options rather than filter fields.
pub const OPTION_KEYS: [&str; 7] = ["fields", "skip", "limit", "sort", "hint", "snapshot", "timeout"];

/// Sort direction for a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Index hint passed through to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    /// Hint by index name.
    Name(String),
    /// Hint by index key pattern.
    Keys(Document),
}

/// Recognized options extracted from a conditions document.
///
/// Entries are kept exactly as supplied; the typed readers interpret them on
/// demand and report malformed values as [`DocumentStoreError::InvalidDocument`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    entries: Document,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw extracted entries.
    pub fn entries(&self) -> &Document {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restricts returned documents to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            "fields",
            Bson::Array(
                fields
                    .into_iter()
                    .map(|field| Bson::String(field.into()))
                    .collect(),
            ),
        );
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.entries.insert("skip", Bson::Int64(i64::try_from(skip).unwrap_or(i64::MAX)));
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.entries.insert("limit", Bson::Int64(limit));
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let mut sort = match self.entries.remove("sort") {
            Some(Bson::Document(sort)) => sort,
            _ => Document::new(),
        };
        sort.insert(
            field.into(),
            match direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            },
        );
        self.entries.insert("sort", sort);
        self
    }

    /// Projection field list. Empty means all fields.
    pub fn fields(&self) -> DocumentStoreResult<Vec<String>> {
        match self.entries.get("fields") {
            None | Some(Bson::Null) => Ok(Vec::new()),
            Some(Bson::String(field)) => Ok(vec![field.clone()]),
            Some(Bson::Array(fields)) => fields
                .iter()
                .map(|field| match field {
                    Bson::String(field) => Ok(field.clone()),
                    other => Err(invalid("fields", other)),
                })
                .collect(),
            Some(Bson::Document(projection)) => Ok(projection
                .iter()
                .filter(|(_, include)| is_truthy(include))
                .map(|(field, _)| field.clone())
                .collect()),
            Some(other) => Err(invalid("fields", other)),
        }
    }

    /// Projection document for the requested fields, if any were requested.
    pub fn projection(&self) -> DocumentStoreResult<Option<Document>> {
        let fields = self.fields()?;

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(fields.into_iter().map(|field| (field, Bson::Int32(1))).collect()))
    }

    pub fn skip(&self) -> DocumentStoreResult<Option<u64>> {
        match self.entries.get("skip") {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => as_integer(value)
                .and_then(|skip| u64::try_from(skip).ok())
                .map(Some)
                .ok_or_else(|| invalid("skip", value)),
        }
    }

    pub fn limit(&self) -> DocumentStoreResult<Option<i64>> {
        match self.entries.get("limit") {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => as_integer(value)
                .map(Some)
                .ok_or_else(|| invalid("limit", value)),
        }
    }

    /// Sort keys in priority order.
    ///
    /// Accepts a sort document (`{ "count": -1 }`), a single field name, or a list
    /// of field names and `[field, direction]` pairs.
    pub fn sort(&self) -> DocumentStoreResult<Vec<(String, SortDirection)>> {
        match self.entries.get("sort") {
            None | Some(Bson::Null) => Ok(Vec::new()),
            Some(Bson::String(field)) => Ok(vec![(field.clone(), SortDirection::Asc)]),
            Some(Bson::Document(sort)) => sort
                .iter()
                .map(|(field, direction)| Ok((field.clone(), parse_direction(direction)?)))
                .collect(),
            Some(Bson::Array(keys)) => keys
                .iter()
                .map(|key| match key {
                    Bson::String(field) => Ok((field.clone(), SortDirection::Asc)),
                    Bson::Array(pair) if pair.len() == 2 => match &pair[0] {
                        Bson::String(field) => Ok((field.clone(), parse_direction(&pair[1])?)),
                        other => Err(invalid("sort", other)),
                    },
                    other => Err(invalid("sort", other)),
                })
                .collect(),
            Some(other) => Err(invalid("sort", other)),
        }
    }

    /// Sort keys rendered as a sort document, if any were requested.
    pub fn sort_document(&self) -> DocumentStoreResult<Option<Document>> {
        let sort = self.sort()?;

        if sort.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            sort.into_iter()
                .map(|(field, direction)| {
                    (
                        field,
                        Bson::Int32(match direction {
                            SortDirection::Asc => 1,
                            SortDirection::Desc => -1,
                        }),
                    )
                })
                .collect(),
        ))
    }

    pub fn hint(&self) -> DocumentStoreResult<Option<Hint>> {
        match self.entries.get("hint") {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::String(name)) => Ok(Some(Hint::Name(name.clone()))),
            Some(Bson::Document(keys)) => Ok(Some(Hint::Keys(keys.clone()))),
            Some(other) => Err(invalid("hint", other)),
        }
    }

    pub fn snapshot(&self) -> DocumentStoreResult<Option<bool>> {
        self.flag("snapshot")
    }

    /// Whether the store may time out an idle cursor. `Some(false)` disables the timeout.
    pub fn timeout(&self) -> DocumentStoreResult<Option<bool>> {
        self.flag("timeout")
    }

    fn flag(&self, key: &str) -> DocumentStoreResult<Option<bool>> {
        match self.entries.get(key) {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::Boolean(flag)) => Ok(Some(*flag)),
            Some(other) => Err(invalid(key, other)),
        }
    }
}

impl From<QueryOptions> for Document {
    fn from(options: QueryOptions) -> Self {
        options.entries
    }
}

/// Splits a conditions document into the filter sent to the store and the
/// recognized options.
///
/// Every recognized key present in `conditions` is moved into the options with
/// its value untouched. Everything else stays in the filter, in its original order.
pub fn split_options(mut conditions: Document) -> (Document, QueryOptions) {
    let mut entries = Document::new();

    for key in OPTION_KEYS {
        if let Some(value) = conditions.remove(key) {
            entries.insert(key, value);
        }
    }

    (conditions, QueryOptions { entries })
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        Bson::Double(value) if value.fract() == 0.0 => Some(*value as i64),
        _ => None,
    }
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Null => false,
        other => as_integer(other).is_none_or(|value| value != 0),
    }
}

fn parse_direction(value: &Bson) -> DocumentStoreResult<SortDirection> {
    match value {
        Bson::String(direction) => match direction.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            _ => Err(invalid("sort", value)),
        },
        other => match as_integer(other) {
            Some(direction) if direction >= 0 => Ok(SortDirection::Asc),
            Some(_) => Ok(SortDirection::Desc),
            None => Err(invalid("sort", value)),
        },
    }
}

fn invalid(key: &str, value: &Bson) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!("invalid value for option `{key}`: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use proptest::prelude::*;

    fn arb_option_value() -> impl Strategy<Value = Bson> {
        prop_oneof![
            any::<i32>().prop_map(Bson::Int32),
            any::<bool>().prop_map(Bson::Boolean),
            "[a-z]{1,6}".prop_map(Bson::String),
            Just(Bson::Null),
        ]
    }

    proptest! {
        #[test]
        fn test_split_moves_exactly_the_recognized_keys(
            filter in prop::collection::btree_map("[a-z]{1,3}_f", any::<i64>(), 0..6),
            options in prop::collection::btree_map(
                prop::sample::select(OPTION_KEYS.to_vec()),
                arb_option_value(),
                0..7,
            ),
        ) {
            let mut conditions = Document::new();
            for (key, value) in &filter {
                conditions.insert(key.clone(), *value);
            }
            for (key, value) in &options {
                conditions.insert(*key, value.clone());
            }

            let (split_filter, split) = split_options(conditions);

            prop_assert!(OPTION_KEYS.iter().all(|key| !split_filter.contains_key(key)));
            prop_assert_eq!(split_filter.len(), filter.len());
            prop_assert_eq!(split.entries().len(), options.len());
            for (key, value) in &options {
                prop_assert_eq!(split.get(key), Some(value));
            }
        }
    }

    #[test]
    fn test_split_without_options() {
        let (filter, options) = split_options(doc! { "color": "red" });

        assert_eq!(filter, doc! { "color": "red" });
        assert!(options.is_empty());
        assert!(options.fields().unwrap().is_empty());
    }

    #[test]
    fn test_split_keeps_falsy_option_values() {
        let (filter, options) = split_options(doc! { "timeout": false, "a": 1 });

        assert_eq!(filter, doc! { "a": 1 });
        assert_eq!(options.timeout().unwrap(), Some(false));
    }

    #[test]
    fn test_typed_readers() {
        let (_, options) = split_options(doc! {
            "fields": ["color", "count"],
            "skip": 2,
            "limit": 5i64,
            "sort": [["count", -1], "color"],
            "hint": "color_1",
            "snapshot": true,
        });

        assert_eq!(options.fields().unwrap(), vec!["color", "count"]);
        assert_eq!(options.projection().unwrap(), Some(doc! { "color": 1, "count": 1 }));
        assert_eq!(options.skip().unwrap(), Some(2));
        assert_eq!(options.limit().unwrap(), Some(5));
        assert_eq!(
            options.sort().unwrap(),
            vec![
                ("count".to_string(), SortDirection::Desc),
                ("color".to_string(), SortDirection::Asc),
            ]
        );
        assert_eq!(options.hint().unwrap(), Some(Hint::Name("color_1".to_string())));
        assert_eq!(options.snapshot().unwrap(), Some(true));
        assert_eq!(options.timeout().unwrap(), None);
    }

    #[test]
    fn test_malformed_option_is_reported_on_read() {
        let (_, options) = split_options(doc! { "limit": "ten" });

        assert!(matches!(
            options.limit(),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_builder_matches_split() {
        let built = QueryOptions::new()
            .with_fields(["color"])
            .with_limit(3)
            .with_sort("count", SortDirection::Desc);

        assert_eq!(built.fields().unwrap(), vec!["color"]);
        assert_eq!(built.limit().unwrap(), Some(3));
        assert_eq!(built.sort_document().unwrap(), Some(doc! { "count": -1 }));
    }

    #[test]
    fn test_with_skip_saturates() {
        let options = QueryOptions::new().with_skip(u64::MAX);

        assert_eq!(options.skip().unwrap(), Some(i64::MAX as u64));
    }
}
