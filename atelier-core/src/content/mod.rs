//! Block-based article content: codec, citations, editor and renderer.

pub mod block;
pub mod citations;
pub mod codec;
pub mod editor;
pub mod render;

pub use block::{BlockBody, BlockId, BlockKind, ContentBlock, SourceCitation};
pub use citations::{link_citations, link_citations_where, stale_markers, SourceList};
pub use codec::{parse_content_blocks, serialize_content_blocks, DecodedContent};
pub use editor::{ArticleDraft, EditorError, MoveDirection};
pub use render::{escape_html, render_article, render_blocks, simple_markdown_to_html};
