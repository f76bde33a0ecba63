//! Entity types of the import engine.

mod changeset;
mod import;
mod item;
mod source;

pub use changeset::{ChangesetItem, ChangesetItems, ChangesetType};
pub use import::{Import, ImportKey};
pub use item::{CastMember, MediaItem, MusicInfo, PlaybackInfo, VideoInfo};
pub use source::Source;
