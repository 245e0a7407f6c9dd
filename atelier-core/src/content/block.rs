use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-side identifier for a block. Never persisted; regenerated on decode.
pub type BlockId = Uuid;

/// Block kinds as they appear in the persisted envelope's `type` field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Type-specific payload of a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockBody {
    /// Paragraph text, may contain `[k]` citation markers
    Text { content: String },
    /// Image reference with caption
    Image { url: String, alt: String },
}

/// One unit of article body content
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: BlockId,
    #[serde(flatten)]
    pub body: BlockBody,
}

impl ContentBlock {
    /// Create a new text block
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: BlockBody::Text {
                content: content.into(),
            },
        }
    }

    /// Create a new image block
    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: BlockBody::Image {
                url: url.into(),
                alt: alt.into(),
            },
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self.body {
            BlockBody::Text { .. } => BlockKind::Text,
            BlockBody::Image { .. } => BlockKind::Image,
        }
    }

    /// Text content, `None` for image blocks
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Text { content } => Some(content),
            BlockBody::Image { .. } => None,
        }
    }

    /// True for a text block with only whitespace
    pub fn is_blank(&self) -> bool {
        match &self.body {
            BlockBody::Text { content } => content.trim().is_empty(),
            BlockBody::Image { url, .. } => url.trim().is_empty(),
        }
    }
}

/// Equality ignores `id`: ids are a client-side handle, not content.
impl PartialEq for ContentBlock {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl Eq for ContentBlock {}

/// A numbered footnote attached to an article
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// 1-based display position. Not stable across edits.
    pub num: u32,
    pub text: String,
}

impl SourceCitation {
    pub fn new(num: u32, text: impl Into<String>) -> Self {
        Self {
            num,
            text: text.into(),
        }
    }

    /// Anchor id the renderer gives this source's list entry
    pub fn anchor_id(&self) -> String {
        format!("source-{}", self.num)
    }
}
