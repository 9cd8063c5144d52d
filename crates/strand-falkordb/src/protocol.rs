//! Compact reply decoding.
//!
//! With `--compact`, FalkorDB answers a query with
//! `[header, rows, statistics]` (or just `[statistics]` when nothing is
//! returned). Header entries are column names, either bare or as
//! `[column_type, name]`. Every row value is tagged as `[type_code, payload]`
//! and payloads nest recursively:
//!
//! ```text
//! [2, "Alice"]                              string
//! [6, [[3, 1], [3, 2]]]                     array of integers
//! [10, ["name", [2, "Alice"], "age", [3, 30]]]  map (flat key/value list)
//! [8, [id, [label_ids], properties]]        node
//! ```
//!
//! Decoding happens in two steps: the transport turns the wire reply into a
//! [`Reply`], then [`ResultSet::from_reply`] zips each row with the header and
//! resolves tags into [`GraphValue`]s.

use crate::error::{FalkorError, FalkorResult};
use std::collections::BTreeMap;

/// Version of [`COMPACT_TYPE_TABLE`]. Bump when codes are added or changed.
pub const COMPACT_TYPE_TABLE_VERSION: u32 = 1;

/// Compact-format type codes understood by this client.
pub const COMPACT_TYPE_TABLE: [(i64, ValueType); 12] = [
    (1, ValueType::Null),
    (2, ValueType::String),
    (3, ValueType::Integer),
    (4, ValueType::Boolean),
    (5, ValueType::Double),
    (6, ValueType::Array),
    (7, ValueType::Edge),
    (8, ValueType::Node),
    (9, ValueType::Path),
    (10, ValueType::Map),
    (11, ValueType::Point),
    (12, ValueType::Vector),
];

/// Tag of a compact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    String,
    Integer,
    Boolean,
    Double,
    Array,
    Edge,
    Node,
    Path,
    Map,
    Point,
    Vector,
}

impl ValueType {
    /// Look a code up in [`COMPACT_TYPE_TABLE`].
    pub fn from_code(code: i64) -> Option<Self> {
        COMPACT_TYPE_TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, t)| *t)
    }

    pub fn code(&self) -> i64 {
        COMPACT_TYPE_TABLE
            .iter()
            .find(|(_, t)| t == self)
            .map(|(c, _)| *c)
            .unwrap_or(0)
    }
}

/// Wire reply, independent of the client library.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Int(i64),
    Double(f64),
    Bool(bool),
    /// Bulk or simple string
    Text(String),
    Array(Vec<Reply>),
    /// Server error reply
    Error(String),
}

impl Reply {
    /// Shorthand for a text reply.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Property map of a node, edge, or map value.
pub type PropertyMap = BTreeMap<String, GraphValue>;

/// Decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    String(String),
    Integer(i64),
    Boolean(bool),
    Double(f64),
    Array(Vec<GraphValue>),
    /// Maps, and the property maps of nodes and edges
    Map(PropertyMap),
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integers, and strings that parse as one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Doubles, integers, and numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Integer(i) => Some(*i as f64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[GraphValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Resolve a (possibly tagged) reply into a value.
pub fn decode_value(reply: &Reply) -> FalkorResult<GraphValue> {
    match reply {
        Reply::Nil => Ok(GraphValue::Null),
        Reply::Int(i) => Ok(GraphValue::Integer(*i)),
        Reply::Double(d) => Ok(GraphValue::Double(*d)),
        Reply::Bool(b) => Ok(GraphValue::Boolean(*b)),
        Reply::Text(s) => Ok(GraphValue::String(s.clone())),
        Reply::Error(msg) => Err(FalkorError::Query(msg.clone())),
        Reply::Array(items) => match items.as_slice() {
            [] => Ok(GraphValue::Array(Vec::new())),
            [Reply::Int(code), payload] => decode_tagged(*code, payload),
            // Single node/relationship envelope
            [inner @ Reply::Array(_)] => decode_value(inner),
            _ => items
                .iter()
                .map(decode_value)
                .collect::<FalkorResult<Vec<_>>>()
                .map(GraphValue::Array),
        },
    }
}

fn decode_tagged(code: i64, payload: &Reply) -> FalkorResult<GraphValue> {
    let value_type = ValueType::from_code(code).ok_or_else(|| {
        FalkorError::Protocol(format!(
            "unknown compact type code {code} (type table v{COMPACT_TYPE_TABLE_VERSION})"
        ))
    })?;

    match value_type {
        ValueType::Null => Ok(GraphValue::Null),
        ValueType::String => Ok(match payload {
            Reply::Text(s) => GraphValue::String(s.clone()),
            Reply::Nil => GraphValue::Null,
            other => GraphValue::String(scalar_text(other)?),
        }),
        ValueType::Integer => match payload {
            Reply::Int(i) => Ok(GraphValue::Integer(*i)),
            Reply::Nil => Ok(GraphValue::Integer(0)),
            Reply::Text(s) => s
                .trim()
                .parse()
                .map(GraphValue::Integer)
                .map_err(|_| FalkorError::Protocol(format!("invalid integer payload: {s}"))),
            other => Err(unexpected("integer", other)),
        },
        ValueType::Boolean => match payload {
            Reply::Bool(b) => Ok(GraphValue::Boolean(*b)),
            Reply::Int(i) => Ok(GraphValue::Boolean(*i != 0)),
            Reply::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(GraphValue::Boolean(true)),
                "false" | "0" | "" => Ok(GraphValue::Boolean(false)),
                _ => Err(FalkorError::Protocol(format!("invalid boolean payload: {s}"))),
            },
            Reply::Nil => Ok(GraphValue::Boolean(false)),
            other => Err(unexpected("boolean", other)),
        },
        ValueType::Double => match payload {
            Reply::Double(d) => Ok(GraphValue::Double(*d)),
            Reply::Int(i) => Ok(GraphValue::Double(*i as f64)),
            Reply::Nil => Ok(GraphValue::Double(0.0)),
            Reply::Text(s) => s
                .trim()
                .parse()
                .map(GraphValue::Double)
                .map_err(|_| FalkorError::Protocol(format!("invalid double payload: {s}"))),
            other => Err(unexpected("double", other)),
        },
        ValueType::Array | ValueType::Path => match payload {
            Reply::Array(items) => items
                .iter()
                .map(decode_value)
                .collect::<FalkorResult<Vec<_>>>()
                .map(GraphValue::Array),
            other => decode_value(other),
        },
        ValueType::Vector => match payload {
            Reply::Array(items) => items
                .iter()
                .map(|item| decode_tagged(ValueType::Double.code(), item))
                .collect::<FalkorResult<Vec<_>>>()
                .map(GraphValue::Array),
            other => Err(unexpected("vector", other)),
        },
        ValueType::Map => decode_flat_map(payload).map(GraphValue::Map),
        // [id, [label_ids], properties]
        ValueType::Node => match payload {
            Reply::Array(parts) if parts.len() >= 3 => decode_properties(&parts[2]),
            _ => Ok(GraphValue::Map(PropertyMap::new())),
        },
        // [id, type, source_id, target_id, properties]
        ValueType::Edge => match payload {
            Reply::Array(parts) if parts.len() >= 5 => decode_properties(&parts[4]),
            _ => Ok(GraphValue::Map(PropertyMap::new())),
        },
        ValueType::Point => match payload {
            Reply::Array(parts) if parts.len() == 2 => {
                let mut map = PropertyMap::new();
                map.insert("latitude".into(), decode_tagged(ValueType::Double.code(), &parts[0])?);
                map.insert("longitude".into(), decode_tagged(ValueType::Double.code(), &parts[1])?);
                Ok(GraphValue::Map(map))
            }
            other => Err(unexpected("point", other)),
        },
    }
}

fn unexpected(expected: &str, got: &Reply) -> FalkorError {
    FalkorError::Protocol(format!("expected {expected} payload, got {got:?}"))
}

fn scalar_text(reply: &Reply) -> FalkorResult<String> {
    match reply {
        Reply::Text(s) => Ok(s.clone()),
        Reply::Int(i) => Ok(i.to_string()),
        Reply::Double(d) => Ok(d.to_string()),
        Reply::Bool(b) => Ok(b.to_string()),
        other => Err(unexpected("string", other)),
    }
}

/// `[key, value, key, value, ...]`; non-string keys are skipped.
fn decode_flat_map(payload: &Reply) -> FalkorResult<PropertyMap> {
    let items = match payload {
        Reply::Array(items) => items,
        _ => return Ok(PropertyMap::new()),
    };

    let mut map = PropertyMap::new();
    let mut i = 0;
    while i + 1 < items.len() {
        match items[i].as_text() {
            Some(key) => {
                map.insert(key.to_string(), decode_value(&items[i + 1])?);
                i += 2;
            }
            None => i += 1,
        }
    }
    Ok(map)
}

/// Node/edge properties: a tagged map, a flat key/value list, or
/// `[[key, type, value], ...]` triples.
fn decode_properties(payload: &Reply) -> FalkorResult<GraphValue> {
    let items = match payload {
        Reply::Array(items) => items,
        other => return decode_value(other),
    };

    match items.as_slice() {
        [Reply::Int(_), _] => decode_value(payload),
        [Reply::Array(_), ..] => {
            let mut map = PropertyMap::new();
            for item in items {
                if let Reply::Array(triple) = item {
                    if let [key, Reply::Int(code), value] = triple.as_slice() {
                        map.insert(scalar_text(key)?, decode_tagged(*code, value)?);
                    }
                }
            }
            Ok(GraphValue::Map(map))
        }
        _ => decode_flat_map(payload).map(GraphValue::Map),
    }
}

/// Update counters from the statistics block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    /// Server-side execution time, when reported
    pub execution_time_ms: Option<f64>,
}

impl QueryStats {
    fn parse(reply: &Reply) -> Self {
        let mut stats = Self::default();
        let lines = match reply {
            Reply::Array(lines) => lines.as_slice(),
            single @ Reply::Text(_) => std::slice::from_ref(single),
            _ => return stats,
        };

        for line in lines.iter().filter_map(Reply::as_text) {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let number = value.split_whitespace().next().unwrap_or("");
            let count = number.parse::<u64>().unwrap_or(0);
            match label.trim() {
                "Nodes created" => stats.nodes_created = count,
                "Nodes deleted" => stats.nodes_deleted = count,
                "Relationships created" => stats.relationships_created = count,
                "Relationships deleted" => stats.relationships_deleted = count,
                "Properties set" => stats.properties_set = count,
                "Labels added" => stats.labels_added = count,
                "Query internal execution time" => {
                    stats.execution_time_ms = number.parse().ok();
                }
                _ => {}
            }
        }
        stats
    }
}

/// One row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, GraphValue>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        self.values.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(GraphValue::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(GraphValue::as_i64)
    }

    pub fn get_map(&self, column: &str) -> Option<&PropertyMap> {
        self.get(column).and_then(GraphValue::as_map)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decoded query reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub stats: QueryStats,
}

impl ResultSet {
    /// Decode a compact reply.
    pub fn from_reply(reply: &Reply) -> FalkorResult<Self> {
        let parts = match reply {
            Reply::Array(parts) => parts,
            Reply::Error(msg) => return Err(FalkorError::Query(msg.clone())),
            Reply::Nil => return Ok(Self::default()),
            other => {
                return Err(FalkorError::Protocol(format!(
                    "expected array reply, got {other:?}"
                )))
            }
        };

        if let Some(Reply::Error(msg)) = parts.iter().find(|p| matches!(p, Reply::Error(_))) {
            return Err(FalkorError::Query(msg.clone()));
        }

        match parts.as_slice() {
            [] => Ok(Self::default()),
            [stats] => Ok(Self {
                stats: QueryStats::parse(stats),
                ..Self::default()
            }),
            [header, rows, rest @ ..] => {
                let columns = match header {
                    Reply::Array(cols) => cols.iter().map(column_name).collect(),
                    _ => Vec::new(),
                };
                let records = match rows {
                    Reply::Array(rows) => decode_rows(&columns, rows)?,
                    _ => Vec::new(),
                };
                Ok(Self {
                    columns,
                    records,
                    stats: rest.first().map(QueryStats::parse).unwrap_or_default(),
                })
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }
}

/// `"name"` or `[column_type, "name"]`.
fn column_name(header: &Reply) -> String {
    match header {
        Reply::Text(name) => name.clone(),
        Reply::Array(parts) => parts
            .last()
            .and_then(|last| scalar_text(last).ok())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn decode_rows(columns: &[String], rows: &[Reply]) -> FalkorResult<Vec<Record>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let Reply::Array(cells) = row else {
            continue;
        };
        let mut values = BTreeMap::new();
        for (column, cell) in columns.iter().zip(cells) {
            values.insert(column.clone(), decode_value(cell)?);
        }
        if !values.is_empty() {
            records.push(Record { values });
        }
    }
    Ok(records)
}
