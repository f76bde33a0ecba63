//! The settings bundle carried by every source and import.

use indexmap::IndexMap;

use crate::{Error, Result};

use super::definition::{SettingDefinition, SettingKind, SettingValue, SettingsDefinition};
use super::xml::{self, RawValue};

/// A typed settings tree: merged definitions plus a value overlay.
///
/// Definitions come from one or more XML documents (the engine's built-in
/// ones plus whatever an importer adapter installs at settings-load time).
/// Values are kept per id; a serialized snapshot only contains leaves whose
/// value differs from the definition default. Values whose id has no
/// definition yet are preserved verbatim so a later definition merge can
/// claim them, which keeps `parse(serialize(s)) == s` stable across partial
/// definition loads.
#[derive(Debug, Clone, Default)]
pub struct SettingsBundle {
    definitions: Vec<SettingsDefinition>,
    definition_sources: Vec<String>,
    index: IndexMap<String, SettingDefinition>,
    values: IndexMap<String, SettingValue>,
    unknown: IndexMap<String, RawValue>,
}

impl SettingsBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a definition document and merges its settings. Documents are
    /// deduplicated by their verbatim text, so repeated loads are no-ops.
    /// Setting ids already defined keep their first definition.
    pub fn add_definition(&mut self, document: &str) -> Result<()> {
        if self.has_definition(document) {
            return Ok(());
        }

        let definition = xml::parse_definition(document)?;
        for setting in definition.settings() {
            if self.index.contains_key(&setting.id) {
                continue;
            }
            self.index.insert(setting.id.clone(), setting.clone());
            self.claim_unknown(setting);
        }

        self.definitions.push(definition);
        self.definition_sources.push(document.to_string());
        Ok(())
    }

    /// Whether the given definition document has already been merged.
    #[must_use]
    pub fn has_definition(&self, document: &str) -> bool {
        self.definition_sources.iter().any(|d| d == document)
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&SettingDefinition> {
        self.index.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// The effective value of a setting: the stored one, else the default.
    #[must_use]
    pub fn value(&self, id: &str) -> Option<SettingValue> {
        let definition = self.index.get(id)?;
        Some(
            self.values
                .get(id)
                .cloned()
                .unwrap_or_else(|| definition.default.clone()),
        )
    }

    /// A setting is enabled when every setting on its parent chain is a
    /// boolean that currently reads true.
    #[must_use]
    pub fn is_enabled(&self, id: &str) -> bool {
        let mut current = match self.index.get(id) {
            Some(definition) => definition,
            None => return false,
        };
        let mut hops = 0;
        while let Some(parent_id) = &current.parent {
            // defend against definition cycles
            hops += 1;
            if hops > self.index.len() {
                return false;
            }
            match self.value(parent_id) {
                Some(SettingValue::Bool(true)) => {}
                _ => return false,
            }
            current = match self.index.get(parent_id) {
                Some(definition) => definition,
                None => return false,
            };
        }
        true
    }

    fn set_value(&mut self, id: &str, value: SettingValue) -> Result<bool> {
        let definition = self
            .index
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("setting '{id}'")))?;
        if definition.kind != value.kind() {
            return Err(Error::InvalidInput(format!(
                "setting '{id}' is of type {}, not {}",
                definition.kind.as_str(),
                value.kind().as_str()
            )));
        }

        let changed = self.value(id).as_ref() != Some(&value);
        self.values.insert(id.to_string(), value);
        Ok(changed)
    }

    #[must_use]
    pub fn get_bool(&self, id: &str) -> Option<bool> {
        match self.value(id)? {
            SettingValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_bool(&mut self, id: &str, value: bool) -> Result<bool> {
        self.set_value(id, SettingValue::Bool(value))
    }

    #[must_use]
    pub fn get_int(&self, id: &str) -> Option<i64> {
        match self.value(id)? {
            SettingValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_int(&mut self, id: &str, value: i64) -> Result<bool> {
        self.set_value(id, SettingValue::Int(value))
    }

    #[must_use]
    pub fn get_number(&self, id: &str) -> Option<f64> {
        match self.value(id)? {
            SettingValue::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_number(&mut self, id: &str, value: f64) -> Result<bool> {
        self.set_value(id, SettingValue::Number(value))
    }

    #[must_use]
    pub fn get_string(&self, id: &str) -> Option<String> {
        match self.value(id)? {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_string(&mut self, id: &str, value: &str) -> Result<bool> {
        self.set_value(id, SettingValue::String(value.to_string()))
    }

    #[must_use]
    pub fn get_list(&self, id: &str) -> Option<Vec<String>> {
        match self.value(id)? {
            SettingValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_list(&mut self, id: &str, value: Vec<String>) -> Result<bool> {
        self.set_value(id, SettingValue::List(value))
    }

    /// Drops the stored value so the setting reads its default again.
    pub fn reset(&mut self, id: &str) {
        self.values.shift_remove(id);
    }

    /// Replaces the current values with the ones from a snapshot. On parse
    /// failure the bundle is left untouched.
    pub fn load_values(&mut self, snapshot: &str) -> Result<()> {
        let entries = xml::parse_values(snapshot)?;

        let mut values = IndexMap::new();
        let mut unknown = IndexMap::new();
        for (id, raw) in entries {
            match self.index.get(&id) {
                Some(definition) => {
                    values.insert(id, parse_raw(definition, &raw)?);
                }
                None => {
                    unknown.insert(id, raw);
                }
            }
        }

        self.values = values;
        self.unknown = unknown;
        Ok(())
    }

    /// Serializes the non-default leaves (plus any still-unclaimed values).
    pub fn values_to_xml(&self) -> Result<String> {
        let mut entries: Vec<(String, RawValue)> = Vec::new();
        for (id, value) in &self.values {
            let Some(definition) = self.index.get(id) else {
                continue;
            };
            if *value == definition.default {
                continue;
            }
            let raw = match value {
                SettingValue::List(items) => RawValue::Items(items.clone()),
                other => RawValue::Text(other.as_text().unwrap_or_default()),
            };
            entries.push((id.clone(), raw));
        }
        for (id, raw) in &self.unknown {
            entries.push((id.clone(), raw.clone()));
        }

        xml::write_values(&entries)
    }

    fn claim_unknown(&mut self, definition: &SettingDefinition) {
        let Some(raw) = self.unknown.shift_remove(&definition.id) else {
            return;
        };
        match parse_raw(definition, &raw) {
            Ok(value) => {
                self.values.insert(definition.id.clone(), value);
            }
            Err(err) => {
                tracing::warn!(
                    setting = %definition.id,
                    %err,
                    "dropping stored value that does not match its definition"
                );
            }
        }
    }
}

fn parse_raw(definition: &SettingDefinition, raw: &RawValue) -> Result<SettingValue> {
    match raw {
        RawValue::Items(items) => {
            if definition.kind != SettingKind::List {
                return Err(Error::SettingsParse(format!(
                    "setting '{}' is not a list",
                    definition.id
                )));
            }
            Ok(SettingValue::List(items.clone()))
        }
        RawValue::Text(text) => SettingValue::parse_scalar(definition.kind, text),
    }
}

impl PartialEq for SettingsBundle {
    fn eq(&self, other: &Self) -> bool {
        if self.definitions != other.definitions || self.unknown != other.unknown {
            return false;
        }
        // compare effective values so "explicitly set to default" and
        // "unset" are the same state
        self.index
            .keys()
            .chain(other.index.keys())
            .all(|id| self.value(id) == other.value(id))
    }
}
