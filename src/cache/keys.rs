//! Query key definitions.
//!
//! A [`QueryKey`] is an ordered list of segments: the entity kind, then an optional
//! scope (`"list"`, `"detail", <id>`, or a named sub-resource view), then an optional
//! canonical filter set. Keys compare equal iff their segments are equal, and filter
//! sets are kept sorted by name so insertion order never leaks into the key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::InvalidKeyError;

pub const LIST_SCOPE: &str = "list";
pub const DETAIL_SCOPE: &str = "detail";

// ============================================================================
// Entity kind
// ============================================================================

/// Logical resource collection name, e.g. `clients` or `invoices`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKind(String);

impl EntityKind {
    /// Validate and wrap an entity kind.
    ///
    /// The first character must be an ASCII letter; the rest may be ASCII letters,
    /// digits, `_`, `-` or `.`.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidKeyError> {
        let raw = raw.as_ref();
        let mut chars = raw.chars();
        match chars.next() {
            None => return Err(InvalidKeyError::EmptyEntityKind),
            Some(first) if !first.is_ascii_alphabetic() => {
                return Err(InvalidKeyError::malformed_kind(
                    raw,
                    "must start with an ASCII letter",
                ));
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            return Err(InvalidKeyError::malformed_kind(
                raw,
                "may only contain ASCII letters, digits, `_`, `-` or `.`",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The whole-entity prefix `[kind]`.
    pub fn prefix(&self) -> QueryKey {
        QueryKey(vec![KeySegment::Text(self.0.clone())])
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityKind {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityKind {
    type Error = InvalidKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.0
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Which view of an entity collection a key addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Collection listing, segment `"list"`.
    List,
    /// Single record, segments `"detail", <id>`.
    Detail(String),
    /// Sub-resource or other named view, a single segment.
    Named(String),
}

impl Scope {
    fn push_segments(&self, out: &mut Vec<KeySegment>) -> Result<(), InvalidKeyError> {
        match self {
            Scope::List => out.push(KeySegment::Text(LIST_SCOPE.to_string())),
            Scope::Detail(id) => {
                if id.is_empty() {
                    return Err(InvalidKeyError::empty_segment("detail id"));
                }
                out.push(KeySegment::Text(DETAIL_SCOPE.to_string()));
                out.push(KeySegment::Text(id.clone()));
            }
            Scope::Named(name) => {
                if name.is_empty() {
                    return Err(InvalidKeyError::empty_segment("scope"));
                }
                out.push(KeySegment::Text(name.clone()));
            }
        }
        Ok(())
    }
}

/// Parses `list`, `detail:<id>`, or any other non-empty string as a named scope.
impl FromStr for Scope {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LIST_SCOPE {
            return Ok(Scope::List);
        }
        if let Some(id) = s.strip_prefix("detail:") {
            if id.is_empty() {
                return Err(InvalidKeyError::empty_segment("detail id"));
            }
            return Ok(Scope::Detail(id.to_string()));
        }
        if s.is_empty() {
            return Err(InvalidKeyError::empty_segment("scope"));
        }
        Ok(Scope::Named(s.to_string()))
    }
}

// ============================================================================
// Filter values
// ============================================================================

/// A filter value: a primitive or an ordered list of primitives.
///
/// Values stored in a [`FilterSet`] are normalized: floats are finite, integral
/// floats are folded into `Int`, and lists hold primitives only.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    fn rank(&self) -> u8 {
        match self {
            FilterValue::Bool(_) => 0,
            FilterValue::Int(_) => 1,
            FilterValue::Float(_) => 2,
            FilterValue::Text(_) => 3,
            FilterValue::List(_) => 4,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            FilterValue::Bool(_) => "bool",
            FilterValue::Int(_) => "integer",
            FilterValue::Float(_) => "float",
            FilterValue::Text(_) => "string",
            FilterValue::List(_) => "array",
        }
    }

    fn normalize(self, name: &str) -> Result<Self, InvalidKeyError> {
        match self {
            FilterValue::List(items) => items
                .into_iter()
                .map(|item| match item {
                    FilterValue::List(_) => Err(InvalidKeyError::unsupported(name, "nested array")),
                    primitive => primitive.normalize(name),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List),
            FilterValue::Float(value) => normalize_float(name, value),
            primitive => Ok(primitive),
        }
    }

    fn from_json(name: &str, value: Value) -> Result<Self, InvalidKeyError> {
        match value {
            Value::Bool(b) => Ok(FilterValue::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(FilterValue::Int(i)),
                // Not exactly representable as i64 or f64.
                None if n.is_u64() => Err(InvalidKeyError::unsupported(
                    name,
                    "integer above i64::MAX",
                )),
                None => match n.as_f64() {
                    Some(f) => normalize_float(name, f),
                    None => Err(InvalidKeyError::non_finite(name)),
                },
            },
            Value::String(s) => Ok(FilterValue::Text(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Array(_) => Err(InvalidKeyError::unsupported(name, "nested array")),
                    Value::Null => Err(InvalidKeyError::unsupported(name, "null array element")),
                    other => FilterValue::from_json(name, other),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List),
            Value::Object(_) => Err(InvalidKeyError::unsupported(name, "object")),
            Value::Null => Err(InvalidKeyError::unsupported(name, "null")),
        }
    }

    fn digest_into(&self, hasher: &mut Sha256) {
        match self {
            FilterValue::Bool(b) => {
                hasher.update(b"b");
                hasher.update([u8::from(*b)]);
            }
            FilterValue::Int(i) => {
                hasher.update(b"i");
                hasher.update(i.to_le_bytes());
            }
            FilterValue::Float(f) => {
                hasher.update(b"d");
                hasher.update(f.to_bits().to_le_bytes());
            }
            FilterValue::Text(s) => digest_str(hasher, b"s", s),
            FilterValue::List(items) => {
                hasher.update(b"l");
                hasher.update((items.len() as u64).to_le_bytes());
                for item in items {
                    item.digest_into(hasher);
                }
            }
        }
    }
}

fn normalize_float(name: &str, value: f64) -> Result<FilterValue, InvalidKeyError> {
    if !value.is_finite() {
        return Err(InvalidKeyError::non_finite(name));
    }
    // 2^63 is exactly representable; anything below it in magnitude fits i64.
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if value.fract() == 0.0 && value >= -I64_BOUND && value < I64_BOUND {
        return Ok(FilterValue::Int(value as i64));
    }
    Ok(FilterValue::Float(value))
}

impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FilterValue {}

impl PartialOrd for FilterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilterValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FilterValue::Bool(a), FilterValue::Bool(b)) => a.cmp(b),
            (FilterValue::Int(a), FilterValue::Int(b)) => a.cmp(b),
            (FilterValue::Float(a), FilterValue::Float(b)) => a.total_cmp(b),
            (FilterValue::Text(a), FilterValue::Text(b)) => a.cmp(b),
            (FilterValue::List(a), FilterValue::List(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for FilterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            FilterValue::Bool(b) => b.hash(state),
            FilterValue::Int(i) => i.hash(state),
            FilterValue::Float(f) => f.to_bits().hash(state),
            FilterValue::Text(s) => s.hash(state),
            FilterValue::List(items) => items.hash(state),
        }
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterValue::Bool(b) => serializer.serialize_bool(*b),
            FilterValue::Int(i) => serializer.serialize_i64(*i),
            FilterValue::Float(f) => serializer.serialize_f64(*f),
            FilterValue::Text(s) => serializer.serialize_str(s),
            FilterValue::List(items) => serializer.collect_seq(items),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Filter set
// ============================================================================

/// Canonical filter parameters, sorted by name.
///
/// Absent values are never stored, so a filter that was explicitly left unset is
/// indistinguishable from one that was never mentioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterValue>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a filter, replacing any previous value under the same name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Result<&mut Self, InvalidKeyError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidKeyError::EmptyFilterName);
        }
        let value = value.into().normalize(&name)?;
        self.0.insert(name, value);
        Ok(self)
    }

    /// Insert a filter when present; `None` removes any previous value.
    pub fn insert_opt<V: Into<FilterValue>>(
        &mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Result<&mut Self, InvalidKeyError> {
        match value {
            Some(value) => self.insert(name, value),
            None => {
                let name = name.into();
                if name.is_empty() {
                    return Err(InvalidKeyError::EmptyFilterName);
                }
                self.0.remove(&name);
                Ok(self)
            }
        }
    }

    /// Builder form of [`FilterSet::insert`].
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Result<Self, InvalidKeyError> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Builder form of [`FilterSet::insert_opt`].
    pub fn with_opt<V: Into<FilterValue>>(
        mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Result<Self, InvalidKeyError> {
        self.insert_opt(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(b"f");
        hasher.update((self.0.len() as u64).to_le_bytes());
        for (name, value) in &self.0 {
            digest_str(hasher, b"n", name);
            value.digest_into(hasher);
        }
    }
}

/// Converts a JSON object. `null` members are treated as absent, since JSON has no
/// separate notion of an undefined member.
impl TryFrom<Value> for FilterSet {
    type Error = InvalidKeyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Ok(FilterSet::new()),
            other => {
                return Err(InvalidKeyError::FiltersNotAnObject {
                    found: json_type_name(&other),
                });
            }
        };

        let mut filters = FilterSet::new();
        for (name, value) in object {
            if name.is_empty() {
                return Err(InvalidKeyError::EmptyFilterName);
            }
            if value.is_null() {
                continue;
            }
            let value = FilterValue::from_json(&name, value)?;
            filters.0.insert(name, value);
        }
        Ok(filters)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Query key
// ============================================================================

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeySegment {
    Text(String),
    Filters(FilterSet),
}

/// Canonical, comparable cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// The `[kind, "detail", id]` prefix for a single record.
    pub fn detail(kind: &EntityKind, id: impl Into<String>) -> Result<Self, InvalidKeyError> {
        let mut segments = vec![KeySegment::Text(kind.as_str().to_string())];
        Scope::Detail(id.into()).push_segments(&mut segments)?;
        Ok(Self(segments))
    }

    /// Entity kind this key belongs to (always the first segment).
    pub fn entity_kind(&self) -> &str {
        match self.0.first() {
            Some(KeySegment::Text(kind)) => kind,
            _ => "",
        }
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a trailing text segment, e.g. a record id after a `"detail"` scope.
    pub fn push_segment(mut self, segment: impl Into<String>) -> Result<Self, InvalidKeyError> {
        let segment = segment.into();
        if segment.is_empty() {
            return Err(InvalidKeyError::empty_segment("trailing"));
        }
        self.0.push(KeySegment::Text(segment));
        Ok(self)
    }

    /// True when every segment of `prefix` matches the leading segments of `self`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Stable hex SHA-256 digest of a tagged, length-prefixed encoding of the segments.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.0.len() as u64).to_le_bytes());
        for segment in &self.0 {
            match segment {
                KeySegment::Text(text) => digest_str(&mut hasher, b"t", text),
                KeySegment::Filters(filters) => filters.digest_into(&mut hasher),
            }
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

fn digest_str(hasher: &mut Sha256, tag: &[u8], value: &str) {
    hasher.update(tag);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Derive the canonical key for an entity kind, optional scope and optional filters.
///
/// An empty filter set contributes no segment.
pub fn derive_key(
    kind: impl AsRef<str>,
    scope: Option<&Scope>,
    filters: Option<&FilterSet>,
) -> Result<QueryKey, InvalidKeyError> {
    let kind = EntityKind::new(kind)?;
    let mut segments = vec![KeySegment::Text(kind.0)];
    if let Some(scope) = scope {
        scope.push_segments(&mut segments)?;
    }
    if let Some(filters) = filters.filter(|filters| !filters.is_empty()) {
        segments.push(KeySegment::Filters(filters.clone()));
    }
    Ok(QueryKey(segments))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn active_clients() -> FilterSet {
        FilterSet::new()
            .with("status", "active")
            .expect("valid filter")
    }

    #[test]
    fn entity_kind_validation() {
        assert!(EntityKind::new("clients").is_ok());
        assert!(EntityKind::new("hr.employees").is_ok());
        assert!(EntityKind::new("purchase-orders_v2").is_ok());

        assert_eq!(EntityKind::new(""), Err(InvalidKeyError::EmptyEntityKind));
        assert!(matches!(
            EntityKind::new("1clients"),
            Err(InvalidKeyError::MalformedEntityKind { .. })
        ));
        assert!(matches!(
            EntityKind::new("client list"),
            Err(InvalidKeyError::MalformedEntityKind { .. })
        ));
        assert!(matches!(
            EntityKind::new(" clients"),
            Err(InvalidKeyError::MalformedEntityKind { .. })
        ));
    }

    #[test]
    fn list_key_with_filters_serializes_as_array() {
        let key = derive_key("clients", Some(&Scope::List), Some(&active_clients()))
            .expect("valid key");
        assert_eq!(
            serde_json::to_value(&key).expect("serializable"),
            json!(["clients", "list", {"status": "active"}])
        );
        assert_eq!(key.to_string(), r#"["clients","list",{"status":"active"}]"#);
    }

    #[test]
    fn detail_scope_with_appended_id() {
        let named = derive_key("clients", Some(&Scope::Named("detail".into())), None)
            .and_then(|key| key.push_segment("c123"))
            .expect("valid key");
        let detail =
            derive_key("clients", Some(&Scope::Detail("c123".into())), None).expect("valid key");

        assert_eq!(
            serde_json::to_value(&named).expect("serializable"),
            json!(["clients", "detail", "c123"])
        );
        assert_eq!(named, detail);
        assert_eq!(
            detail,
            QueryKey::detail(&EntityKind::new("clients").expect("kind"), "c123").expect("key")
        );
    }

    #[test]
    fn filter_insertion_order_is_irrelevant() {
        let a = FilterSet::new()
            .with("status", "open")
            .and_then(|f| f.with("assignee", 7))
            .expect("filters");
        let b = FilterSet::new()
            .with("assignee", 7)
            .and_then(|f| f.with("status", "open"))
            .expect("filters");

        let key_a = derive_key("cases", Some(&Scope::List), Some(&a)).expect("key");
        let key_b = derive_key("cases", Some(&Scope::List), Some(&b)).expect("key");
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.fingerprint(), key_b.fingerprint());
    }

    #[test]
    fn absent_filter_values_are_dropped() {
        let with_none = FilterSet::new()
            .with("status", "open")
            .and_then(|f| f.with_opt::<&str>("owner", None))
            .expect("filters");
        assert_eq!(with_none, FilterSet::new().with("status", "open").expect("filters"));

        let from_json = FilterSet::try_from(json!({"status": "open", "owner": null})).expect("json");
        assert_eq!(from_json, with_none);
    }

    #[test]
    fn array_order_is_preserved() {
        let asc = FilterSet::new()
            .with("sort", vec!["name", "created_at"])
            .expect("filters");
        let desc = FilterSet::new()
            .with("sort", vec!["created_at", "name"])
            .expect("filters");
        assert_ne!(asc, desc);
    }

    #[test]
    fn empty_filters_add_no_segment() {
        let bare = derive_key("invoices", Some(&Scope::List), None).expect("key");
        let empty = derive_key("invoices", Some(&Scope::List), Some(&FilterSet::new())).expect("key");
        assert_eq!(bare, empty);
        assert_eq!(bare.len(), 2);
    }

    #[test]
    fn integral_floats_fold_into_integers() {
        let int = FilterSet::new().with("page", 2).expect("filters");
        let float = FilterSet::new().with("page", 2.0).expect("filters");
        assert_eq!(int, float);

        let json = FilterSet::try_from(json!({"page": 2.0})).expect("json");
        assert_eq!(json, int);
    }

    #[test]
    fn rejects_unsupported_filter_shapes() {
        assert!(matches!(
            FilterSet::try_from(json!({"range": {"from": 1}})),
            Err(InvalidKeyError::UnsupportedFilterValue { found: "object", .. })
        ));
        assert!(matches!(
            FilterSet::try_from(json!({"ids": [[1, 2]]})),
            Err(InvalidKeyError::UnsupportedFilterValue { .. })
        ));
        assert!(matches!(
            FilterSet::try_from(json!(["status"])),
            Err(InvalidKeyError::FiltersNotAnObject { found: "array" })
        ));
        assert!(matches!(
            FilterSet::new().with("ratio", f64::NAN),
            Err(InvalidKeyError::NonFiniteNumber { .. })
        ));
        assert_eq!(
            FilterSet::new().with("", "x").err(),
            Some(InvalidKeyError::EmptyFilterName)
        );
    }

    #[test]
    fn derive_key_rejects_bad_kind_and_scope() {
        assert_eq!(
            derive_key("", None, None),
            Err(InvalidKeyError::EmptyEntityKind)
        );
        assert!(derive_key("clients", Some(&Scope::Detail(String::new())), None).is_err());
        assert!(derive_key("clients", Some(&Scope::Named(String::new())), None).is_err());
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("list".parse::<Scope>(), Ok(Scope::List));
        assert_eq!(
            "detail:c9".parse::<Scope>(),
            Ok(Scope::Detail("c9".to_string()))
        );
        assert_eq!(
            "timeline".parse::<Scope>(),
            Ok(Scope::Named("timeline".to_string()))
        );
        assert!("detail:".parse::<Scope>().is_err());
        assert!("".parse::<Scope>().is_err());
    }

    #[test]
    fn prefix_matching() {
        let kind = EntityKind::new("clients").expect("kind");
        let list = derive_key("clients", Some(&Scope::List), Some(&active_clients())).expect("key");
        let detail = QueryKey::detail(&kind, "c1").expect("key");

        assert!(list.starts_with(&kind.prefix()));
        assert!(detail.starts_with(&kind.prefix()));
        assert!(detail.starts_with(&detail));
        assert!(!list.starts_with(&detail));
        assert!(!kind.prefix().starts_with(&list));

        let other = EntityKind::new("clients-archive").expect("kind");
        assert!(!other.prefix().starts_with(&kind.prefix()));
    }

    #[test]
    fn fingerprint_distinguishes_segment_boundaries() {
        let a = derive_key("cases", Some(&Scope::Named("ab".into())), None).expect("key");
        let b = derive_key("cases", Some(&Scope::Named("a".into())), None)
            .and_then(|key| key.push_segment("b"))
            .expect("key");
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn integers_beyond_i64_are_rejected() {
        for id in [u64::MAX, u64::MAX - 1] {
            assert!(matches!(
                FilterSet::try_from(json!({ "id": id })),
                Err(InvalidKeyError::UnsupportedFilterValue {
                    found: "integer above i64::MAX",
                    ..
                })
            ));
        }

        let max = FilterSet::try_from(json!({ "id": i64::MAX })).expect("filters");
        assert_eq!(max.get("id"), Some(&FilterValue::Int(i64::MAX)));
    }

    #[test]
    fn fingerprint_is_pinned() {
        let key = derive_key("clients", Some(&Scope::List), Some(&active_clients())).expect("key");
        assert_eq!(
            key.fingerprint(),
            "5cbd494c0bc19f216d4744824243ab8c1fd1a1f4745489e79fc63ec589c9db0b"
        );
    }

    #[test]
    fn fingerprint_distinguishes_value_types() {
        let number = FilterSet::new().with("page", 2).expect("filters");
        let text = FilterSet::new().with("page", "2").expect("filters");
        let a = derive_key("invoices", None, Some(&number)).expect("key");
        let b = derive_key("invoices", None, Some(&text)).expect("key");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
