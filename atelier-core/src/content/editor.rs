//! In-memory authoring model for one article body.

use thiserror::Error;
use tracing::debug;

use super::block::{BlockBody, BlockId, ContentBlock, SourceCitation};
use super::citations::{self, SourceList};
use super::codec::{parse_content_blocks, serialize_content_blocks};
use crate::article::UploadedImage;

/// Editor operation failures. None of these touch the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("block {0} not found")]
    BlockNotFound(BlockId),

    #[error("block {0} is not a text block")]
    NotTextBlock(BlockId),

    #[error("block {0} is not an image block")]
    NotImageBlock(BlockId),

    #[error("the last remaining block cannot be removed")]
    LastBlock,

    #[error("source index {0} out of range")]
    SourceOutOfRange(usize),

    #[error("no source numbered {0}")]
    UnknownSource(u32),
}

/// Direction for [`ArticleDraft::move_block`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Ordered blocks plus citation registry for one article.
///
/// Always holds at least one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArticleDraft {
    blocks: Vec<ContentBlock>,
    sources: SourceList,
}

impl Default for ArticleDraft {
    fn default() -> Self {
        Self {
            blocks: vec![ContentBlock::text("")],
            sources: SourceList::new(),
        }
    }
}

impl ArticleDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a draft from a persisted `content` field (either format)
    pub fn from_content(content: &str) -> Self {
        let (blocks, sources) = parse_content_blocks(content);
        Self::from_parts(blocks, sources)
    }

    pub fn from_parts(blocks: Vec<ContentBlock>, sources: Vec<SourceCitation>) -> Self {
        let blocks = if blocks.is_empty() {
            vec![ContentBlock::text("")]
        } else {
            blocks
        };
        Self {
            blocks,
            sources: SourceList::from_decoded(sources),
        }
    }

    /// Encoded `content` string for the articles API
    pub fn to_content(&self) -> String {
        serialize_content_blocks(&self.blocks, self.sources.as_slice())
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn sources(&self) -> &[SourceCitation] {
        self.sources.as_slice()
    }

    /// True when encoding would store nothing meaningful
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(ContentBlock::is_blank)
            && self.sources.iter().all(|s| s.text.trim().is_empty())
    }

    fn position(&self, id: BlockId) -> Result<usize, EditorError> {
        self.blocks
            .iter()
            .position(|block| block.id == id)
            .ok_or(EditorError::BlockNotFound(id))
    }

    fn insert_at(&mut self, after: Option<BlockId>, block: ContentBlock) -> Result<BlockId, EditorError> {
        let id = block.id;
        match after {
            Some(anchor) => {
                let idx = self.position(anchor)?;
                self.blocks.insert(idx + 1, block);
            }
            None => self.blocks.push(block),
        }
        Ok(id)
    }

    /// Add a text block after `after` (or at the end)
    pub fn add_text_block(
        &mut self,
        after: Option<BlockId>,
        content: impl Into<String>,
    ) -> Result<BlockId, EditorError> {
        self.insert_at(after, ContentBlock::text(content))
    }

    /// Add an image block after `after` (or at the end)
    pub fn add_image_block(
        &mut self,
        after: Option<BlockId>,
        url: impl Into<String>,
        alt: impl Into<String>,
    ) -> Result<BlockId, EditorError> {
        self.insert_at(after, ContentBlock::image(url, alt))
    }

    /// Insert one image block per uploaded file, in upload order
    pub fn insert_uploaded_images(
        &mut self,
        after: Option<BlockId>,
        uploads: &[UploadedImage],
    ) -> Result<Vec<BlockId>, EditorError> {
        let mut anchor = after;
        let mut ids = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let Some(url) = upload.urls.preferred() else {
                continue;
            };
            let id = self.insert_at(anchor, ContentBlock::image(url, ""))?;
            anchor = Some(id);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn update_text(&mut self, id: BlockId, content: impl Into<String>) -> Result<(), EditorError> {
        let idx = self.position(id)?;
        match &mut self.blocks[idx].body {
            BlockBody::Text { content: current } => {
                *current = content.into();
                Ok(())
            }
            BlockBody::Image { .. } => Err(EditorError::NotTextBlock(id)),
        }
    }

    pub fn update_image(
        &mut self,
        id: BlockId,
        url: impl Into<String>,
        alt: impl Into<String>,
    ) -> Result<(), EditorError> {
        let idx = self.position(id)?;
        match &mut self.blocks[idx].body {
            BlockBody::Image { url: u, alt: a } => {
                *u = url.into();
                *a = alt.into();
                Ok(())
            }
            BlockBody::Text { .. } => Err(EditorError::NotImageBlock(id)),
        }
    }

    /// Swap a block with its neighbour. Returns false at either end.
    pub fn move_block(&mut self, id: BlockId, direction: MoveDirection) -> Result<bool, EditorError> {
        let idx = self.position(id)?;
        let target = match direction {
            MoveDirection::Up if idx > 0 => idx - 1,
            MoveDirection::Down if idx + 1 < self.blocks.len() => idx + 1,
            _ => return Ok(false),
        };
        self.blocks.swap(idx, target);
        Ok(true)
    }

    pub fn remove_block(&mut self, id: BlockId) -> Result<ContentBlock, EditorError> {
        let idx = self.position(id)?;
        if self.blocks.len() == 1 {
            return Err(EditorError::LastBlock);
        }
        Ok(self.blocks.remove(idx))
    }

    /// Append a source and return its number
    pub fn add_source(&mut self, text: impl Into<String>) -> u32 {
        self.sources.add(text)
    }

    pub fn update_source(&mut self, index: usize, text: impl Into<String>) -> Result<(), EditorError> {
        if self.sources.update(index, text) {
            Ok(())
        } else {
            Err(EditorError::SourceOutOfRange(index))
        }
    }

    /// Remove a source and renumber the rest.
    ///
    /// Markers already in the text keep their old numbers; check
    /// [`ArticleDraft::stale_markers`] afterwards.
    pub fn remove_source(&mut self, index: usize) -> Result<SourceCitation, EditorError> {
        let removed = self
            .sources
            .remove(index)
            .ok_or(EditorError::SourceOutOfRange(index))?;
        let stale = self.stale_markers();
        if !stale.is_empty() {
            debug!(removed = removed.num, ?stale, "source removed, markers now dangling");
        }
        Ok(removed)
    }

    /// Append a `[num]` marker to the end of a text block
    pub fn insert_marker(&mut self, id: BlockId, num: u32) -> Result<(), EditorError> {
        if !self.sources.contains_num(num) {
            return Err(EditorError::UnknownSource(num));
        }
        let idx = self.position(id)?;
        match &mut self.blocks[idx].body {
            BlockBody::Text { content } => {
                content.push_str(&citations::marker(num));
                Ok(())
            }
            BlockBody::Image { .. } => Err(EditorError::NotTextBlock(id)),
        }
    }

    /// Add a source and immediately cite it at the end of `id`
    pub fn cite(&mut self, id: BlockId, text: impl Into<String>) -> Result<u32, EditorError> {
        // Validate the block before touching the registry
        let idx = self.position(id)?;
        if self.blocks[idx].content().is_none() {
            return Err(EditorError::NotTextBlock(id));
        }
        let num = self.add_source(text);
        self.insert_marker(id, num)?;
        Ok(num)
    }

    /// Marker numbers in the text that no longer resolve to a source
    pub fn stale_markers(&self) -> Vec<u32> {
        citations::stale_markers(
            self.blocks.iter().filter_map(ContentBlock::content),
            self.sources.len(),
        )
    }
}
