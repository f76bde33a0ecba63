//! Built-in source/import settings and their typed wrappers.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

use super::SettingsBundle;

/// When an import is synchronised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportTrigger {
    /// Synchronise whenever the source becomes available (and on the
    /// periodic heartbeat).
    #[default]
    Auto,
    /// Only synchronise on explicit user request.
    Manual,
}

impl ImportTrigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ImportTrigger::Auto => "auto",
            ImportTrigger::Manual => "manual",
        }
    }
}

impl fmt::Display for ImportTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportTrigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(ImportTrigger::Auto),
            "manual" => Ok(ImportTrigger::Manual),
            other => Err(Error::InvalidInput(format!(
                "invalid import trigger '{other}'"
            ))),
        }
    }
}

pub const SETTING_IMPORT_TRIGGER: &str = "sync.importtrigger";
pub const SETTING_UPDATE_ITEMS: &str = "sync.updateimporteditems";
pub const SETTING_UPDATE_PLAYBACK_FROM_SOURCE: &str = "sync.updateplaybackmetadatafromsource";
pub const SETTING_UPDATE_PLAYBACK_ON_SOURCE: &str = "sync.updateplaybackmetadataonsource";

const IMPORT_SETTINGS_DEFINITION: &str = r#"<settings version="1">
  <section id="synchronisation">
    <category id="sync" label="Synchronisation">
      <group id="1">
        <setting id="sync.importtrigger" type="string" default="auto"/>
        <setting id="sync.updateimporteditems" type="bool" default="true"/>
        <setting id="sync.updateplaybackmetadatafromsource" type="bool" default="true"
                 parent="sync.updateimporteditems"/>
        <setting id="sync.updateplaybackmetadataonsource" type="bool" default="true"/>
      </group>
    </category>
  </section>
</settings>"#;

/// Settings of an [`crate::models::Import`]: the built-in `sync.*` leaves
/// plus whatever definitions the owning importer adapter merges in.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    bundle: SettingsBundle,
}

impl ImportSettings {
    #[must_use]
    pub fn new() -> Self {
        let mut bundle = SettingsBundle::new();
        bundle
            .add_definition(IMPORT_SETTINGS_DEFINITION)
            .expect("built-in import settings definition is valid");
        Self { bundle }
    }

    /// Restores settings from a serialized value snapshot.
    pub fn from_snapshot(snapshot: &str) -> Result<Self> {
        let mut settings = Self::new();
        settings.bundle.load_values(snapshot)?;
        Ok(settings)
    }

    #[must_use]
    pub fn bundle(&self) -> &SettingsBundle {
        &self.bundle
    }

    pub fn bundle_mut(&mut self) -> &mut SettingsBundle {
        &mut self.bundle
    }

    #[must_use]
    pub fn import_trigger(&self) -> ImportTrigger {
        self.bundle
            .get_string(SETTING_IMPORT_TRIGGER)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_import_trigger(&mut self, trigger: ImportTrigger) -> bool {
        self.bundle
            .set_string(SETTING_IMPORT_TRIGGER, trigger.as_str())
            .unwrap_or(false)
    }

    #[must_use]
    pub fn update_imported_items(&self) -> bool {
        self.bundle.get_bool(SETTING_UPDATE_ITEMS).unwrap_or(true)
    }

    pub fn set_update_imported_items(&mut self, update: bool) -> bool {
        self.bundle
            .set_bool(SETTING_UPDATE_ITEMS, update)
            .unwrap_or(false)
    }

    /// Whether playback metadata retrieved from the source may overwrite the
    /// local state. Reads false while its parent setting is disabled.
    #[must_use]
    pub fn update_playback_metadata_from_source(&self) -> bool {
        self.bundle.is_enabled(SETTING_UPDATE_PLAYBACK_FROM_SOURCE)
            && self
                .bundle
                .get_bool(SETTING_UPDATE_PLAYBACK_FROM_SOURCE)
                .unwrap_or(true)
    }

    pub fn set_update_playback_metadata_from_source(&mut self, update: bool) -> bool {
        self.bundle
            .set_bool(SETTING_UPDATE_PLAYBACK_FROM_SOURCE, update)
            .unwrap_or(false)
    }

    /// Whether local playback state should be pushed back to the source.
    /// Only honored for adapters that declare a write capability.
    #[must_use]
    pub fn update_playback_metadata_on_source(&self) -> bool {
        self.bundle
            .get_bool(SETTING_UPDATE_PLAYBACK_ON_SOURCE)
            .unwrap_or(true)
    }

    pub fn set_update_playback_metadata_on_source(&mut self, update: bool) -> bool {
        self.bundle
            .set_bool(SETTING_UPDATE_PLAYBACK_ON_SOURCE, update)
            .unwrap_or(false)
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings of a [`crate::models::Source`]. There are no built-in leaves;
/// the bundle only carries what the source's importer adapter defines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceSettings {
    bundle: SettingsBundle,
}

impl SourceSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores settings from a serialized value snapshot. Values stay
    /// unclaimed until the adapter merges its definitions.
    pub fn from_snapshot(snapshot: &str) -> Result<Self> {
        let mut settings = Self::new();
        settings.bundle.load_values(snapshot)?;
        Ok(settings)
    }

    #[must_use]
    pub fn bundle(&self) -> &SettingsBundle {
        &self.bundle
    }

    pub fn bundle_mut(&mut self) -> &mut SettingsBundle {
        &mut self.bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ImportSettings::new();
        assert_eq!(settings.import_trigger(), ImportTrigger::Auto);
        assert!(settings.update_imported_items());
        assert!(settings.update_playback_metadata_from_source());
        assert!(settings.update_playback_metadata_on_source());
    }

    #[test]
    fn test_playback_from_source_follows_parent() {
        let mut settings = ImportSettings::new();
        settings.set_update_imported_items(false);
        assert!(!settings.update_playback_metadata_from_source());
        settings.set_update_imported_items(true);
        assert!(settings.update_playback_metadata_from_source());
    }

    #[test]
    fn test_trigger_round_trip() {
        let mut settings = ImportSettings::new();
        assert!(settings.set_import_trigger(ImportTrigger::Manual));
        assert!(!settings.set_import_trigger(ImportTrigger::Manual));

        let snapshot = settings.bundle().values_to_xml().unwrap();
        let restored = ImportSettings::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.import_trigger(), ImportTrigger::Manual);
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_invalid_trigger_string() {
        assert!("sometimes".parse::<ImportTrigger>().is_err());
    }
}
