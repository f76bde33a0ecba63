//! Typed, XML-backed settings for sources and imports.

mod definition;
mod import;
mod values;
mod xml;

pub use definition::{
    SettingCategory, SettingDefinition, SettingGroup, SettingKind, SettingSection,
    SettingValue, SettingsDefinition,
};
pub use import::{
    ImportSettings, ImportTrigger, SourceSettings, SETTING_IMPORT_TRIGGER,
    SETTING_UPDATE_ITEMS, SETTING_UPDATE_PLAYBACK_FROM_SOURCE,
    SETTING_UPDATE_PLAYBACK_ON_SOURCE,
};
pub use values::SettingsBundle;
