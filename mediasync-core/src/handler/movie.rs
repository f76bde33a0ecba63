//! Movie handler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::library::MediaLibrary;
use crate::media_type::MediaType;
use crate::models::{ChangesetType, Import, MediaItem};
use crate::{Error, Result};

use super::video;
use super::MediaTypeHandler;

pub struct MovieImportHandler {
    library: Arc<dyn MediaLibrary>,
}

impl MovieImportHandler {
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl MediaTypeHandler for MovieImportHandler {
    fn media_type(&self) -> MediaType {
        MediaType::Movie
    }

    fn create(&self) -> Box<dyn MediaTypeHandler> {
        Box::new(Self::new(self.library.clone()))
    }

    async fn local_items(&self, import: &Import) -> Result<Vec<MediaItem>> {
        self.library
            .items(
                MediaType::Movie,
                &import.source.identifier,
                Some(&import.path),
            )
            .await
    }

    fn find_matching_local_item(
        &self,
        _import: &Import,
        remote: &MediaItem,
        local_items: &[MediaItem],
    ) -> Option<usize> {
        video::find_by_path(local_items, &remote.path)
    }

    fn determine_changeset(
        &self,
        import: &Import,
        remote: &MediaItem,
        local: &MediaItem,
    ) -> ChangesetType {
        video::determine_video_changeset(import, remote, local)
    }

    fn prepare_imported_item(&self, import: &Import, remote: &mut MediaItem, local: &MediaItem) {
        video::prepare_video_item(import, remote, local);
    }

    async fn start_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.begin(MediaType::Movie).await
    }

    async fn finish_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.commit(MediaType::Movie).await
    }

    async fn abort_synchronisation(&mut self, _import: &Import) -> Result<()> {
        self.library.rollback(MediaType::Movie).await
    }

    async fn add_imported_item(&mut self, import: &Import, item: &mut MediaItem) -> Result<()> {
        video::attribute_item(import, item);
        self.library.insert(item).await?;
        Ok(())
    }

    async fn update_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        self.library.update(item).await
    }

    async fn remove_imported_item(&mut self, _import: &Import, item: &MediaItem) -> Result<()> {
        let id = item
            .library_id
            .ok_or_else(|| Error::InvalidInput("movie has no library id".into()))?;
        self.library.remove(MediaType::Movie, id).await
    }

    async fn cleanup_imported_items(&mut self, _import: &Import) -> Result<()> {
        Ok(())
    }

    async fn remove_imported_items(&mut self, import: &Import) -> Result<()> {
        video::remove_all_imported(&self.library, MediaType::Movie, import).await
    }

    async fn set_imported_items_enabled(&self, import: &Import, enabled: bool) -> Result<()> {
        self.library
            .set_enabled(
                MediaType::Movie,
                &import.source.identifier,
                &import.path,
                enabled,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::InMemoryMediaLibrary;
    use crate::media_type::GroupedMediaTypes;
    use crate::models::Source;

    fn import() -> Import {
        Import::recursive(
            "src://uuid-A/",
            GroupedMediaTypes::new(vec![MediaType::Movie]),
            Source::new("uuid-A", "src://uuid-A/"),
        )
    }

    #[tokio::test]
    async fn test_add_update_remove_cycle() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = MovieImportHandler::new(library.clone());
        let import = import();

        let mut item = MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "M1");
        handler.start_synchronisation(&import).await.unwrap();
        handler.add_imported_item(&import, &mut item).await.unwrap();
        handler.finish_synchronisation(&import).await.unwrap();

        assert_eq!(item.source_id, "uuid-A");
        let locals = handler.local_items(&import).await.unwrap();
        assert_eq!(locals.len(), 1);

        let mut renamed = locals[0].clone();
        renamed.title = "M1 Director's Cut".to_string();
        handler.update_imported_item(&import, &renamed).await.unwrap();
        let locals = handler.local_items(&import).await.unwrap();
        assert_eq!(locals[0].title, "M1 Director's Cut");

        handler.remove_imported_item(&import, &renamed).await.unwrap();
        assert!(handler.local_items(&import).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_rolls_back() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let mut handler = MovieImportHandler::new(library.clone());
        let import = import();

        handler.start_synchronisation(&import).await.unwrap();
        let mut item = MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "M1");
        handler.add_imported_item(&import, &mut item).await.unwrap();
        handler.abort_synchronisation(&import).await.unwrap();

        assert!(handler.local_items(&import).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_matching_is_by_path() {
        let library: Arc<dyn MediaLibrary> = Arc::new(InMemoryMediaLibrary::new());
        let handler = MovieImportHandler::new(library);
        let import = import();

        let local = vec![
            MediaItem::new(MediaType::Movie, "src://uuid-A/m1", "M1"),
            MediaItem::new(MediaType::Movie, "src://uuid-A/m2", "M2"),
        ];
        let remote = MediaItem::new(MediaType::Movie, "src://uuid-A/m2", "renamed");
        assert_eq!(
            handler.find_matching_local_item(&import, &remote, &local),
            Some(1)
        );
    }
}
