//! Encode/decode between the persisted article `content` string and the
//! in-memory block list.
//!
//! Two formats live in storage side by side:
//!
//! ```text
//! legacy:   <p>Any plain text or HTML written before the block editor</p>
//! envelope: {"blocks":[{"type":"text","content":"..."},
//!                      {"type":"image","url":"...","alt":"..."}],
//!            "sources":[{"num":1,"text":"..."}]}
//! ```
//!
//! Decoding never fails: anything that is not a usable envelope is treated as
//! one literal text block, so old articles render without migration.

use serde_json::{Map, Value};

use super::block::{BlockBody, ContentBlock, SourceCitation};

/// Result of decoding a persisted `content` field
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedContent {
    /// Pre-editor body (or empty input), kept verbatim
    Legacy(String),
    /// Structured envelope
    Blocks {
        blocks: Vec<ContentBlock>,
        sources: Vec<SourceCitation>,
    },
}

impl DecodedContent {
    /// Decode a persisted `content` string. Never fails.
    pub fn decode(raw: &str) -> Self {
        if raw.is_empty() {
            return DecodedContent::Legacy(String::new());
        }

        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => return DecodedContent::Legacy(raw.to_owned()),
        };

        match parsed {
            Value::Object(ref obj) if obj.contains_key("blocks") => {
                let Some(items) = obj.get("blocks").and_then(Value::as_array) else {
                    return DecodedContent::Legacy(raw.to_owned());
                };
                let sources = obj
                    .get("sources")
                    .and_then(Value::as_array)
                    .map(|items| normalize_sources(items))
                    .unwrap_or_default();
                DecodedContent::Blocks {
                    blocks: items.iter().map(normalize_block).collect(),
                    sources,
                }
            }
            // Array-only format used before sources existed
            Value::Array(ref items) if !items.is_empty() => DecodedContent::Blocks {
                blocks: items.iter().map(normalize_block).collect(),
                sources: Vec::new(),
            },
            _ => DecodedContent::Legacy(raw.to_owned()),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, DecodedContent::Legacy(_))
    }

    /// Editor view: legacy bodies become a single text block
    pub fn into_parts(self) -> (Vec<ContentBlock>, Vec<SourceCitation>) {
        match self {
            DecodedContent::Legacy(body) => (vec![ContentBlock::text(body)], Vec::new()),
            DecodedContent::Blocks { blocks, sources } => (blocks, sources),
        }
    }
}

/// Decode persisted content into blocks and sources.
///
/// Empty input yields one empty text block so an editor always has something
/// to type into.
pub fn parse_content_blocks(raw: &str) -> (Vec<ContentBlock>, Vec<SourceCitation>) {
    DecodedContent::decode(raw).into_parts()
}

/// Encode blocks and sources into the persisted envelope.
///
/// Sources with blank text are dropped. Returns an empty string when there is
/// nothing left to store.
pub fn serialize_content_blocks(blocks: &[ContentBlock], sources: &[SourceCitation]) -> String {
    let blocks: Vec<Value> = blocks.iter().map(|block| encode_block(&block.body)).collect();
    let sources: Vec<Value> = sources
        .iter()
        .filter(|source| !source.text.trim().is_empty())
        .map(encode_source)
        .collect();

    if blocks.is_empty() && sources.is_empty() {
        return String::new();
    }

    let mut envelope = Map::new();
    envelope.insert("blocks".to_owned(), Value::Array(blocks));
    envelope.insert("sources".to_owned(), Value::Array(sources));
    Value::Object(envelope).to_string()
}

fn encode_block(body: &BlockBody) -> Value {
    let mut obj = Map::new();
    match body {
        BlockBody::Text { content } => {
            obj.insert("type".to_owned(), Value::from("text"));
            obj.insert("content".to_owned(), Value::from(content.as_str()));
        }
        BlockBody::Image { url, alt } => {
            obj.insert("type".to_owned(), Value::from("image"));
            obj.insert("url".to_owned(), Value::from(url.as_str()));
            obj.insert("alt".to_owned(), Value::from(alt.as_str()));
        }
    }
    Value::Object(obj)
}

fn encode_source(source: &SourceCitation) -> Value {
    let mut obj = Map::new();
    obj.insert("num".to_owned(), Value::from(source.num));
    obj.insert("text".to_owned(), Value::from(source.text.as_str()));
    Value::Object(obj)
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

/// Anything not explicitly an image is a text block; missing fields are empty
fn normalize_block(value: &Value) -> ContentBlock {
    let is_image = value.get("type").and_then(Value::as_str) == Some("image");
    if is_image {
        ContentBlock::image(string_field(value, "url"), string_field(value, "alt"))
    } else {
        ContentBlock::text(string_field(value, "content"))
    }
}

fn normalize_sources(items: &[Value]) -> Vec<SourceCitation> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let num = item
                .get("num")
                .and_then(Value::as_u64)
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(idx as u32 + 1);
            SourceCitation::new(num, string_field(item, "text"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BlockKind;

    #[test]
    fn empty_input_yields_one_empty_text_block() {
        let (blocks, sources) = parse_content_blocks("");
        assert_eq!(blocks, vec![ContentBlock::text("")]);
        assert!(sources.is_empty());
    }

    #[test]
    fn legacy_html_is_kept_verbatim() {
        let (blocks, sources) = parse_content_blocks("<p>legacy html</p>");
        assert_eq!(blocks, vec![ContentBlock::text("<p>legacy html</p>")]);
        assert!(sources.is_empty());
        assert!(DecodedContent::decode("<p>legacy html</p>").is_legacy());
    }

    #[test]
    fn image_block_alt_defaults_to_empty() {
        let (blocks, sources) =
            parse_content_blocks(r#"{"blocks":[{"type":"image","url":"x.png"}],"sources":[]}"#);
        assert_eq!(blocks, vec![ContentBlock::image("x.png", "")]);
        assert!(sources.is_empty());
    }

    #[test]
    fn missing_sources_key_means_no_sources() {
        let (blocks, sources) = parse_content_blocks(r#"{"blocks":[{"type":"text","content":"hi"}]}"#);
        assert_eq!(blocks, vec![ContentBlock::text("hi")]);
        assert!(sources.is_empty());
    }

    #[test]
    fn unknown_block_types_become_text() {
        let (blocks, _) = parse_content_blocks(
            r#"{"blocks":[{"type":"video","content":"clip"},{"content":"untyped"},42],"sources":[]}"#,
        );
        assert_eq!(
            blocks,
            vec![
                ContentBlock::text("clip"),
                ContentBlock::text("untyped"),
                ContentBlock::text(""),
            ]
        );
    }

    #[test]
    fn legacy_array_format_has_no_sources() {
        let (blocks, sources) = parse_content_blocks(
            r#"[{"type":"text","content":"one"},{"type":"image","url":"a.jpg","alt":"A"}]"#,
        );
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind(), BlockKind::Image);
        assert!(sources.is_empty());
    }

    #[test]
    fn unusable_json_falls_back_to_literal_text() {
        for raw in ["[]", "42", r#""quoted""#, r#"{"title":"no blocks"}"#, r#"{"blocks":null}"#, "{not json"] {
            let (blocks, sources) = parse_content_blocks(raw);
            assert_eq!(blocks, vec![ContentBlock::text(raw)], "input: {raw}");
            assert!(sources.is_empty());
        }
    }

    #[test]
    fn sources_keep_stored_numbers_and_fill_gaps() {
        let (_, sources) = parse_content_blocks(
            r#"{"blocks":[],"sources":[{"num":2,"text":"b"},{"text":"c"},{"num":0,"text":"d"}]}"#,
        );
        assert_eq!(
            sources,
            vec![
                SourceCitation::new(2, "b"),
                SourceCitation::new(2, "c"),
                SourceCitation::new(3, "d"),
            ]
        );
    }

    #[test]
    fn encode_empty_is_empty_string() {
        assert_eq!(serialize_content_blocks(&[], &[]), "");
    }

    #[test]
    fn encode_drops_blank_sources() {
        let sources = vec![SourceCitation::new(1, "  "), SourceCitation::new(2, "Vasari, Lives")];
        assert_eq!(serialize_content_blocks(&[], &sources[..1]), "");

        let encoded = serialize_content_blocks(&[ContentBlock::text("x")], &sources);
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["sources"].as_array().unwrap().len(), 1);
        assert_eq!(value["sources"][0]["text"], "Vasari, Lives");
    }

    #[test]
    fn encode_omits_ids_and_foreign_fields() {
        let encoded = serialize_content_blocks(
            &[ContentBlock::text("para"), ContentBlock::image("p.png", "Panel")],
            &[],
        );
        let value: Value = serde_json::from_str(&encoded).unwrap();
        let blocks = value["blocks"].as_array().unwrap();
        assert_eq!(blocks[0], serde_json::json!({"type": "text", "content": "para"}));
        assert_eq!(
            blocks[1],
            serde_json::json!({"type": "image", "url": "p.png", "alt": "Panel"})
        );
        assert!(!encoded.contains("\"id\""));
    }

    #[test]
    fn round_trip_preserves_content() {
        let blocks = vec![
            ContentBlock::text("The **Annunciation** panel [1]"),
            ContentBlock::image("https://cdn.example.org/a.jpg", "Fra Angelico"),
        ];
        let sources = vec![SourceCitation::new(1, "Pope-Hennessy, Fra Angelico, 1952")];

        let encoded = serialize_content_blocks(&blocks, &sources);
        let (decoded_blocks, decoded_sources) = parse_content_blocks(&encoded);
        assert_eq!(decoded_blocks, blocks);
        assert_eq!(decoded_sources, sources);
        assert_ne!(decoded_blocks[0].id, blocks[0].id);
    }
}
