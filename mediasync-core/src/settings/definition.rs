//! Settings definition tree.
//!
//! Definitions are loaded from XML documents shaped
//! `<settings version="1"> <section> <category> <group> <setting/>...`.
//! A definition describes a typed leaf with a default; concrete values live
//! in the [`super::SettingsBundle`].

use crate::{Error, Result};

/// The type of a setting leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Int,
    Number,
    String,
    List,
    Action,
}

impl SettingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SettingKind::Bool => "bool",
            SettingKind::Int => "integer",
            SettingKind::Number => "number",
            SettingKind::String => "string",
            SettingKind::List => "list",
            SettingKind::Action => "action",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "bool" | "boolean" => Ok(SettingKind::Bool),
            "integer" | "int" => Ok(SettingKind::Int),
            "number" => Ok(SettingKind::Number),
            "string" => Ok(SettingKind::String),
            "list" => Ok(SettingKind::List),
            "action" => Ok(SettingKind::Action),
            other => Err(Error::SettingsParse(format!(
                "unknown setting type '{other}'"
            ))),
        }
    }
}

/// A concrete, typed setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Number(f64),
    String(String),
    List(Vec<String>),
    /// Actions carry no value; they exist so a definition can describe a
    /// button-like entry.
    Action,
}

impl SettingValue {
    #[must_use]
    pub const fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::Number(_) => SettingKind::Number,
            SettingValue::String(_) => SettingKind::String,
            SettingValue::List(_) => SettingKind::List,
            SettingValue::Action => SettingKind::Action,
        }
    }

    /// Parses the textual representation of a scalar value of `kind`.
    pub fn parse_scalar(kind: SettingKind, raw: &str) -> Result<Self> {
        match kind {
            SettingKind::Bool => match raw {
                "true" | "1" => Ok(SettingValue::Bool(true)),
                "false" | "0" => Ok(SettingValue::Bool(false)),
                other => Err(Error::SettingsParse(format!(
                    "invalid boolean value '{other}'"
                ))),
            },
            SettingKind::Int => raw
                .parse::<i64>()
                .map(SettingValue::Int)
                .map_err(|e| Error::SettingsParse(format!("invalid integer '{raw}': {e}"))),
            SettingKind::Number => raw
                .parse::<f64>()
                .map(SettingValue::Number)
                .map_err(|e| Error::SettingsParse(format!("invalid number '{raw}': {e}"))),
            SettingKind::String => Ok(SettingValue::String(raw.to_string())),
            SettingKind::List => Ok(SettingValue::List(
                raw.split(',')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            SettingKind::Action => Err(Error::SettingsParse(
                "action settings carry no value".to_string(),
            )),
        }
    }

    /// The textual form used in value snapshots (lists are serialized as
    /// `<item>` children instead and return `None` here).
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            SettingValue::Bool(v) => Some(v.to_string()),
            SettingValue::Int(v) => Some(v.to_string()),
            SettingValue::Number(v) => Some(v.to_string()),
            SettingValue::String(v) => Some(v.clone()),
            SettingValue::List(_) | SettingValue::Action => None,
        }
    }
}

/// Definition of a single setting leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
    /// Fully qualified id, e.g. `sync.importtrigger`.
    pub id: String,
    pub label: Option<String>,
    pub kind: SettingKind,
    pub default: SettingValue,
    /// Id of a boolean setting this one depends on; while the parent is
    /// false this setting is disabled and reads as its default.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingGroup {
    pub id: String,
    pub settings: Vec<SettingDefinition>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingCategory {
    pub id: String,
    pub label: Option<String>,
    pub groups: Vec<SettingGroup>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingSection {
    pub id: String,
    pub label: Option<String>,
    pub categories: Vec<SettingCategory>,
}

/// One parsed definition document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingsDefinition {
    pub sections: Vec<SettingSection>,
}

impl SettingsDefinition {
    /// All setting leaves in document order.
    pub fn settings(&self) -> impl Iterator<Item = &SettingDefinition> {
        self.sections
            .iter()
            .flat_map(|s| &s.categories)
            .flat_map(|c| &c.groups)
            .flat_map(|g| &g.settings)
    }
}
