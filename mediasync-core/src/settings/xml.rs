//! XML (de)serialization of settings definitions and value snapshots.
//!
//! Definition documents:
//!
//! ```xml
//! <settings version="1">
//!   <section id="sync">
//!     <category id="general" label="General">
//!       <group id="1">
//!         <setting id="sync.importtrigger" type="string" default="auto"/>
//!         <setting id="sync.updateimporteditems" type="bool" default="true"/>
//!       </group>
//!     </category>
//!   </section>
//! </settings>
//! ```
//!
//! Value snapshots carry only the leaves that differ from their defaults:
//!
//! ```xml
//! <settings version="1">
//!   <setting id="sync.importtrigger">manual</setting>
//!   <setting id="filter.genres"><item>Drama</item><item>Sci-Fi</item></setting>
//! </settings>
//! ```

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{Error, Result};

use super::definition::{
    SettingCategory, SettingDefinition, SettingGroup, SettingKind, SettingSection,
    SettingValue, SettingsDefinition,
};

/// A value as it appears in a snapshot, before a definition gives it a type.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Items(Vec<String>),
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::SettingsParse(e.to_string()))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::SettingsParse(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(element: &BytesStart<'_>, name: &str) -> Result<String> {
    attribute(element, name)?.ok_or_else(|| {
        Error::SettingsParse(format!(
            "missing '{name}' attribute on <{}>",
            String::from_utf8_lossy(element.name().as_ref())
        ))
    })
}

fn default_for(kind: SettingKind, raw: Option<&str>) -> Result<SettingValue> {
    match raw {
        Some(raw) if kind != SettingKind::Action => SettingValue::parse_scalar(kind, raw),
        _ => Ok(match kind {
            SettingKind::Bool => SettingValue::Bool(false),
            SettingKind::Int => SettingValue::Int(0),
            SettingKind::Number => SettingValue::Number(0.0),
            SettingKind::String => SettingValue::String(String::new()),
            SettingKind::List => SettingValue::List(Vec::new()),
            SettingKind::Action => SettingValue::Action,
        }),
    }
}

fn parse_setting_element(element: &BytesStart<'_>) -> Result<SettingDefinition> {
    let id = required_attribute(element, "id")?;
    let kind = SettingKind::parse(&required_attribute(element, "type")?)?;
    let default = default_for(kind, attribute(element, "default")?.as_deref())?;

    Ok(SettingDefinition {
        id,
        label: attribute(element, "label")?,
        kind,
        default,
        parent: attribute(element, "parent")?,
    })
}

/// Parses a settings definition document.
pub fn parse_definition(xml: &str) -> Result<SettingsDefinition> {
    let mut reader = Reader::from_str(xml);
    let mut definition = SettingsDefinition::default();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"settings" => {
                if let Some(version) = attribute(&e, "version")? {
                    if version != "1" {
                        return Err(Error::SettingsParse(format!(
                            "unsupported settings version '{version}'"
                        )));
                    }
                }
                saw_root = true;
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"section" => {
                definition.sections.push(SettingSection {
                    id: required_attribute(&e, "id")?,
                    label: attribute(&e, "label")?,
                    categories: Vec::new(),
                });
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"category" => {
                let section = definition.sections.last_mut().ok_or_else(|| {
                    Error::SettingsParse("<category> outside of <section>".to_string())
                })?;
                section.categories.push(SettingCategory {
                    id: required_attribute(&e, "id")?,
                    label: attribute(&e, "label")?,
                    groups: Vec::new(),
                });
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"group" => {
                let category = definition
                    .sections
                    .last_mut()
                    .and_then(|s| s.categories.last_mut())
                    .ok_or_else(|| {
                        Error::SettingsParse("<group> outside of <category>".to_string())
                    })?;
                category.groups.push(SettingGroup {
                    id: required_attribute(&e, "id")?,
                    settings: Vec::new(),
                });
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"setting" => {
                let group = definition
                    .sections
                    .last_mut()
                    .and_then(|s| s.categories.last_mut())
                    .and_then(|c| c.groups.last_mut())
                    .ok_or_else(|| {
                        Error::SettingsParse("<setting> outside of <group>".to_string())
                    })?;
                group.settings.push(parse_setting_element(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::SettingsParse(
            "missing <settings> root element".to_string(),
        ));
    }

    Ok(definition)
}

/// Parses a value snapshot into `(id, raw value)` pairs in document order.
pub fn parse_values(xml: &str) -> Result<Vec<(String, RawValue)>> {
    let mut reader = Reader::from_str(xml);
    let mut entries: Vec<(String, RawValue)> = Vec::new();
    let mut current_id: Option<String> = None;
    let mut text = String::new();
    let mut items: Vec<String> = Vec::new();
    let mut has_items = false;
    let mut in_item = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"settings" => {}
            Event::Start(e) if e.name().as_ref() == b"setting" => {
                current_id = Some(required_attribute(&e, "id")?);
                text.clear();
                items.clear();
                has_items = false;
            }
            Event::Empty(e) if e.name().as_ref() == b"setting" => {
                entries.push((
                    required_attribute(&e, "id")?,
                    RawValue::Text(String::new()),
                ));
            }
            Event::Start(e) if e.name().as_ref() == b"item" => {
                in_item = true;
                has_items = true;
                text.clear();
            }
            Event::Empty(e) if e.name().as_ref() == b"item" => {
                has_items = true;
                items.push(String::new());
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| Error::SettingsParse(e.to_string()))?;
                text.push_str(&value);
            }
            Event::End(e) if e.name().as_ref() == b"item" => {
                in_item = false;
                // indentation around the markup is not part of the value
                items.push(text.trim().to_string());
                text.clear();
            }
            Event::End(e) if e.name().as_ref() == b"setting" => {
                if in_item {
                    return Err(Error::SettingsParse("unclosed <item>".to_string()));
                }
                let id = current_id.take().ok_or_else(|| {
                    Error::SettingsParse("</setting> without <setting>".to_string())
                })?;
                let raw = if has_items {
                    RawValue::Items(std::mem::take(&mut items))
                } else {
                    RawValue::Text(text.trim().to_string())
                };
                text.clear();
                entries.push((id, raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Serializes a value snapshot.
pub fn write_values(entries: &[(String, RawValue)]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut root = BytesStart::new("settings");
    root.push_attribute(("version", "1"));
    writer.write_event(Event::Start(root))?;

    for (id, value) in entries {
        let mut element = BytesStart::new("setting");
        element.push_attribute(("id", id.as_str()));
        writer.write_event(Event::Start(element))?;
        match value {
            RawValue::Text(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            RawValue::Items(items) => {
                for item in items {
                    writer.write_event(Event::Start(BytesStart::new("item")))?;
                    writer.write_event(Event::Text(BytesText::new(item)))?;
                    writer.write_event(Event::End(BytesEnd::new("item")))?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new("setting")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("settings")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| Error::Internal(e.to_string()))
}
