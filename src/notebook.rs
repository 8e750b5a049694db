//! In-memory model of an `.ipynb` document.
//!
//! Only the pieces the conversion touches are typed: the cell kind and its
//! `source`. Every other key rides along in a flattened `extra` map so a
//! load/save cycle does not lose anything.
//!
//! Reading goes through `serde_json::Value` and pulls the typed fields out of
//! each object by hand. Numbers are kept as their original text
//! (`arbitrary_precision`), and serde's buffering for `#[serde(flatten)]`
//! cannot hand those back to typed fields, so `flatten` is only used when
//! writing.

use std::fs;
use std::path::Path;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{NotebookError, Result};
use crate::upgrade::{upgrade_v3, V3_MAJOR};

/// The major format version this tool works on and writes. Version 3 files
/// are upgraded on read.
pub const NBFORMAT_MAJOR: u64 = 4;

/// Cell ids were introduced in format 4.5.
const CELL_ID_MINOR: u32 = 5;

/// Cell text. On disk it is either one string or a list of lines; in memory it
/// is always the joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSource", into = "Vec<String>")]
pub struct Source(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    Text(String),
    Lines(Vec<String>),
}

impl From<RawSource> for Source {
    fn from(raw: RawSource) -> Self {
        match raw {
            RawSource::Text(text) => Source(text),
            RawSource::Lines(lines) => Source(lines.concat()),
        }
    }
}

impl From<Source> for Vec<String> {
    fn from(source: Source) -> Self {
        source.0.split_inclusive('\n').map(str::to_owned).collect()
    }
}

impl Source {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source(text)
    }
}

/// Random 8 hex-char cell id.
pub(crate) fn random_cell_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

fn take<T: DeserializeOwned>(
    raw: &mut Map<String, Value>,
    key: &str,
) -> serde_json::Result<Option<T>> {
    raw.remove(key).map(serde_json::from_value).transpose()
}

fn require<T: DeserializeOwned>(
    raw: &mut Map<String, Value>,
    key: &'static str,
) -> serde_json::Result<T> {
    take(raw, key)?.ok_or_else(|| de::Error::missing_field(key))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkdownCell {
    pub source: Source,
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarkdownCell {
    fn from_map(mut raw: Map<String, Value>) -> serde_json::Result<Self> {
        let source = require(&mut raw, "source")?;
        let metadata = take(&mut raw, "metadata")?.unwrap_or_default();
        Ok(MarkdownCell {
            source,
            metadata,
            extra: raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeCell {
    pub source: Source,
    pub metadata: Map<String, Value>,
    pub execution_count: Option<u64>,
    pub outputs: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CodeCell {
    /// A fresh, never-executed code cell. `with_id` adds the random 8-char
    /// cell id that format 4.5+ requires.
    pub fn new(source: impl Into<Source>, with_id: bool) -> Self {
        let mut extra = Map::new();
        if with_id {
            extra.insert("id".to_string(), Value::String(random_cell_id()));
        }
        CodeCell {
            source: source.into(),
            metadata: Map::new(),
            execution_count: None,
            outputs: Vec::new(),
            extra,
        }
    }

    fn from_map(mut raw: Map<String, Value>) -> serde_json::Result<Self> {
        let source = require(&mut raw, "source")?;
        let metadata = take(&mut raw, "metadata")?.unwrap_or_default();
        let execution_count = take::<Option<u64>>(&mut raw, "execution_count")?.flatten();
        let outputs = take(&mut raw, "outputs")?.unwrap_or_default();
        Ok(CodeCell {
            source,
            metadata,
            execution_count,
            outputs,
            extra: raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Markdown(MarkdownCell),
    Code(CodeCell),
    /// Raw and any other cell kind, kept exactly as read.
    Other(Map<String, Value>),
}

#[derive(Serialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum TaggedCell<'a> {
    Markdown(&'a MarkdownCell),
    Code(&'a CodeCell),
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Markdown(cell) => TaggedCell::Markdown(cell).serialize(serializer),
            Cell::Code(cell) => TaggedCell::Code(cell).serialize(serializer),
            Cell::Other(raw) => raw.serialize(serializer),
        }
    }
}

impl Cell {
    fn from_map(mut raw: Map<String, Value>) -> serde_json::Result<Self> {
        let cell_type = match raw.get("cell_type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(de::Error::custom("`cell_type` must be a string")),
            None => return Err(de::Error::missing_field("cell_type")),
        };
        match cell_type.as_str() {
            "markdown" => {
                raw.remove("cell_type");
                MarkdownCell::from_map(raw).map(Cell::Markdown)
            }
            "code" => {
                raw.remove("cell_type");
                CodeCell::from_map(raw).map(Cell::Code)
            }
            _ => Ok(Cell::Other(raw)),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        Cell::from_map(raw).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notebook {
    pub nbformat: u32,
    pub nbformat_minor: u32,
    pub metadata: Map<String, Value>,
    pub cells: Vec<Cell>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notebook {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a format 4 notebook, upgrading format 3 first. Anything else
    /// is rejected.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let version = value.get("nbformat").cloned().unwrap_or(Value::Null);
        let raw = match (version.as_u64(), value) {
            (Some(NBFORMAT_MAJOR), Value::Object(raw)) => raw,
            (Some(V3_MAJOR), Value::Object(raw)) => upgrade_v3(raw),
            _ => return Err(NotebookError::UnsupportedVersion(version)),
        };
        Ok(Self::from_map(raw)?)
    }

    fn from_map(mut raw: Map<String, Value>) -> serde_json::Result<Self> {
        let nbformat = require(&mut raw, "nbformat")?;
        let nbformat_minor = require(&mut raw, "nbformat_minor")?;
        let metadata = take(&mut raw, "metadata")?.unwrap_or_default();
        let cells = require(&mut raw, "cells")?;
        Ok(Notebook {
            nbformat,
            nbformat_minor,
            metadata,
            cells,
            extra: raw,
        })
    }

    /// Canonical on-disk layout: one-space indent, sorted keys, literal
    /// non-ASCII, trailing newline.
    pub fn to_json(&self) -> Result<String> {
        // `Map` is ordered by key unless serde_json's `preserve_order` is on,
        // so going through `Value` sorts every object.
        let value = serde_json::to_value(self)?;
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut serializer)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| NotebookError::Json(ser::Error::custom(e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Whether new cells need an `id` to stay valid for this document.
    pub fn wants_cell_ids(&self) -> bool {
        self.nbformat_minor >= CELL_ID_MINOR
    }
}
