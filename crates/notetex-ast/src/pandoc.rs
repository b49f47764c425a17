//! Pandoc AST types
//!
//! A subset of the Pandoc document model, encoded the way `pandoc -t json`
//! writes it and `pandoc -f json` reads it: every node is an object with a
//! `"t"` tag and, for non-unit nodes, a `"c"` content field.
//! Reference: https://hackage.haskell.org/package/pandoc-types
//!
//! Nodes outside the subset are kept as [`Block::Other`] / [`Inline::Other`]
//! holding the original JSON, so a document survives a round trip unchanged.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API version stamped on documents built from scratch
pub const PANDOC_API_VERSION: [u32; 3] = [1, 23, 1];

/// Root of a Pandoc document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pandoc {
    #[serde(rename = "pandoc-api-version")]
    pub api_version: Vec<u32>,
    pub meta: Value,
    pub blocks: Vec<Block>,
}

impl Pandoc {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            api_version: PANDOC_API_VERSION.to_vec(),
            meta: Value::Object(Map::new()),
            blocks,
        }
    }
}

/// Identifier, classes and key-value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr(pub String, pub Vec<String>, pub Vec<(String, String)>);

/// Link target: URL and title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(pub String, pub String);

/// Output format tag of a raw block or raw inline (e.g. `latex`, `html`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Format(pub String);

impl Format {
    pub fn latex() -> Self {
        Format("latex".to_string())
    }

    /// Whether raw content in this format can be emitted into LaTeX as is
    pub fn is_latex(&self) -> bool {
        self.0 == "latex" || self.0 == "tex"
    }
}

/// Inline or display math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum MathType {
    InlineMath,
    DisplayMath,
}

/// Start number, numbering style and delimiter of an ordered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAttributes(pub i64, pub ListNumberStyle, pub ListNumberDelim);

impl Default for ListAttributes {
    fn default() -> Self {
        ListAttributes(1, ListNumberStyle::Decimal, ListNumberDelim::Period)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ListNumberStyle {
    DefaultStyle,
    Example,
    Decimal,
    LowerRoman,
    UpperRoman,
    LowerAlpha,
    UpperAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ListNumberDelim {
    DefaultDelim,
    Period,
    OneParen,
    TwoParens,
}

/// A block-level node
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Plain(Vec<Inline>),
    Para(Vec<Inline>),
    CodeBlock(Attr, String),
    RawBlock(Format, String),
    BlockQuote(Vec<Block>),
    OrderedList(ListAttributes, Vec<Vec<Block>>),
    BulletList(Vec<Vec<Block>>),
    Header(i64, Attr, Vec<Inline>),
    HorizontalRule,
    Div(Attr, Vec<Block>),
    /// Any other Pandoc block, kept as its original JSON
    Other(Value),
}

/// An inline node
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Str(String),
    Emph(Vec<Inline>),
    Strong(Vec<Inline>),
    Code(Attr, String),
    Space,
    SoftBreak,
    LineBreak,
    Math(MathType, String),
    RawInline(Format, String),
    Link(Attr, Vec<Inline>, Target),
    /// Any other Pandoc inline, kept as its original JSON
    Other(Value),
}

// Convenience constructors
impl Block {
    pub fn para(inlines: Vec<Inline>) -> Self {
        Block::Para(inlines)
    }

    pub fn plain(inlines: Vec<Inline>) -> Self {
        Block::Plain(inlines)
    }

    pub fn block_quote(blocks: Vec<Block>) -> Self {
        Block::BlockQuote(blocks)
    }

    pub fn bullet_list(items: Vec<Vec<Block>>) -> Self {
        Block::BulletList(items)
    }

    pub fn ordered_list(items: Vec<Vec<Block>>) -> Self {
        Block::OrderedList(ListAttributes::default(), items)
    }

    pub fn raw_latex(text: impl Into<String>) -> Self {
        Block::RawBlock(Format::latex(), text.into())
    }

    pub fn header(level: i64, inlines: Vec<Inline>) -> Self {
        Block::Header(level, Attr::default(), inlines)
    }

    pub fn code_block(text: impl Into<String>) -> Self {
        Block::CodeBlock(Attr::default(), text.into())
    }

    /// Pandoc tag of this block (`"Para"`, `"Table"`, ...)
    pub fn tag(&self) -> &str {
        match self {
            Block::Plain(_) => "Plain",
            Block::Para(_) => "Para",
            Block::CodeBlock(..) => "CodeBlock",
            Block::RawBlock(..) => "RawBlock",
            Block::BlockQuote(_) => "BlockQuote",
            Block::OrderedList(..) => "OrderedList",
            Block::BulletList(_) => "BulletList",
            Block::Header(..) => "Header",
            Block::HorizontalRule => "HorizontalRule",
            Block::Div(..) => "Div",
            Block::Other(value) => value.get("t").and_then(Value::as_str).unwrap_or("?"),
        }
    }
}

impl Inline {
    pub fn str(s: impl Into<String>) -> Self {
        Inline::Str(s.into())
    }

    pub fn inline_math(source: impl Into<String>) -> Self {
        Inline::Math(MathType::InlineMath, source.into())
    }

    pub fn display_math(source: impl Into<String>) -> Self {
        Inline::Math(MathType::DisplayMath, source.into())
    }

    /// Append the plain-text rendering of this inline to `out`
    ///
    /// Follows `pandoc.utils.stringify`: breaks and spaces become a single
    /// space, code and math contribute their source, containers recurse
    /// (including the unmodeled ones such as `Span` or `Strikeout`), quotes
    /// become curly quote marks, raw inlines and notes contribute nothing.
    pub fn write_plain(&self, out: &mut String) {
        match self {
            Inline::Str(s) | Inline::Code(_, s) | Inline::Math(_, s) => out.push_str(s),
            Inline::Space | Inline::SoftBreak | Inline::LineBreak => out.push(' '),
            Inline::Emph(children) | Inline::Strong(children) | Inline::Link(_, children, _) => {
                for child in children {
                    child.write_plain(out);
                }
            }
            Inline::RawInline(..) => {}
            Inline::Other(value) => write_plain_value(value, out),
        }
    }
}

/// Plain text of node JSON outside the modeled subset
///
/// Bare strings are attributes, targets or identifiers and are skipped;
/// only `Str` nodes and the sources of `Code` and `Math` carry text.
fn write_plain_value(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            for item in items {
                write_plain_value(item, out);
            }
        }
        Value::Object(node) => {
            let content = node.get("c").unwrap_or(&Value::Null);
            match node.get("t").and_then(Value::as_str) {
                Some("Str") => out.push_str(content.as_str().unwrap_or_default()),
                Some("Space" | "SoftBreak" | "LineBreak") => out.push(' '),
                Some("Code" | "Math") => {
                    out.push_str(content.get(1).and_then(Value::as_str).unwrap_or_default())
                }
                Some("RawInline" | "Note") | None => {}
                Some("Quoted") => {
                    let single = content
                        .get(0)
                        .and_then(|kind| kind.get("t"))
                        .and_then(Value::as_str)
                        == Some("SingleQuote");
                    let (open, close) = if single {
                        ('\u{2018}', '\u{2019}')
                    } else {
                        ('\u{201C}', '\u{201D}')
                    };
                    out.push(open);
                    if let Some(children) = content.get(1) {
                        write_plain_value(children, out);
                    }
                    out.push(close);
                }
                Some(_) => write_plain_value(content, out),
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Plain-text rendering of a sequence of inlines
pub fn stringify(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        inline.write_plain(&mut out);
    }
    out
}

/// Split text into `Str`, `Space` and `SoftBreak` inlines the way Pandoc's
/// Markdown reader tokenizes a paragraph
pub fn inlines_from_text(text: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            inlines.push(Inline::SoftBreak);
        }
        for (j, word) in line.split_whitespace().enumerate() {
            if j > 0 {
                inlines.push(Inline::Space);
            }
            inlines.push(Inline::str(word));
        }
    }
    inlines
}

fn tagged<S, T>(serializer: S, tag: &str, content: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry("t", tag)?;
    map.serialize_entry("c", content)?;
    map.end()
}

fn unit<S: Serializer>(serializer: S, tag: &str) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry("t", tag)?;
    map.end()
}

/// Split a node object into its tag and fields, or hand the value back if it
/// is not a tagged object
fn split_node(value: Value) -> Result<(String, Map<String, Value>), Value> {
    let Value::Object(map) = value else {
        return Err(value);
    };
    match map.get("t") {
        Some(Value::String(tag)) => Ok((tag.clone(), map)),
        _ => Err(Value::Object(map)),
    }
}

/// Deserialize the `"c"` field of a node, treating a missing field as null
fn take_content<T: DeserializeOwned>(node: &mut Map<String, Value>) -> serde_json::Result<T> {
    serde_json::from_value(node.remove("c").unwrap_or(Value::Null))
}

impl Block {
    fn from_value(value: Value) -> serde_json::Result<Self> {
        let (tag, mut node) = match split_node(value) {
            Ok(parts) => parts,
            Err(value) => return Ok(Block::Other(value)),
        };
        let block = match tag.as_str() {
            "Plain" => Block::Plain(take_content(&mut node)?),
            "Para" => Block::Para(take_content(&mut node)?),
            "CodeBlock" => {
                let (attr, text) = take_content(&mut node)?;
                Block::CodeBlock(attr, text)
            }
            "RawBlock" => {
                let (format, text) = take_content(&mut node)?;
                Block::RawBlock(format, text)
            }
            "BlockQuote" => Block::BlockQuote(take_content(&mut node)?),
            "OrderedList" => {
                let (attrs, items) = take_content(&mut node)?;
                Block::OrderedList(attrs, items)
            }
            "BulletList" => Block::BulletList(take_content(&mut node)?),
            "Header" => {
                let (level, attr, inlines) = take_content(&mut node)?;
                Block::Header(level, attr, inlines)
            }
            "HorizontalRule" => Block::HorizontalRule,
            "Div" => {
                let (attr, blocks) = take_content(&mut node)?;
                Block::Div(attr, blocks)
            }
            _ => Block::Other(Value::Object(node)),
        };
        Ok(block)
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Block::Plain(inlines) => tagged(serializer, "Plain", inlines),
            Block::Para(inlines) => tagged(serializer, "Para", inlines),
            Block::CodeBlock(attr, text) => tagged(serializer, "CodeBlock", &(attr, text)),
            Block::RawBlock(format, text) => tagged(serializer, "RawBlock", &(format, text)),
            Block::BlockQuote(blocks) => tagged(serializer, "BlockQuote", blocks),
            Block::OrderedList(attrs, items) => {
                tagged(serializer, "OrderedList", &(attrs, items))
            }
            Block::BulletList(items) => tagged(serializer, "BulletList", items),
            Block::Header(level, attr, inlines) => {
                tagged(serializer, "Header", &(level, attr, inlines))
            }
            Block::HorizontalRule => unit(serializer, "HorizontalRule"),
            Block::Div(attr, blocks) => tagged(serializer, "Div", &(attr, blocks)),
            Block::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Block::from_value(value).map_err(de::Error::custom)
    }
}

impl Inline {
    fn from_value(value: Value) -> serde_json::Result<Self> {
        let (tag, mut node) = match split_node(value) {
            Ok(parts) => parts,
            Err(value) => return Ok(Inline::Other(value)),
        };
        let inline = match tag.as_str() {
            "Str" => Inline::Str(take_content(&mut node)?),
            "Emph" => Inline::Emph(take_content(&mut node)?),
            "Strong" => Inline::Strong(take_content(&mut node)?),
            "Code" => {
                let (attr, text) = take_content(&mut node)?;
                Inline::Code(attr, text)
            }
            "Space" => Inline::Space,
            "SoftBreak" => Inline::SoftBreak,
            "LineBreak" => Inline::LineBreak,
            "Math" => {
                let (kind, source) = take_content(&mut node)?;
                Inline::Math(kind, source)
            }
            "RawInline" => {
                let (format, text) = take_content(&mut node)?;
                Inline::RawInline(format, text)
            }
            "Link" => {
                let (attr, inlines, target) = take_content(&mut node)?;
                Inline::Link(attr, inlines, target)
            }
            _ => Inline::Other(Value::Object(node)),
        };
        Ok(inline)
    }
}

impl Serialize for Inline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Inline::Str(s) => tagged(serializer, "Str", s),
            Inline::Emph(inlines) => tagged(serializer, "Emph", inlines),
            Inline::Strong(inlines) => tagged(serializer, "Strong", inlines),
            Inline::Code(attr, text) => tagged(serializer, "Code", &(attr, text)),
            Inline::Space => unit(serializer, "Space"),
            Inline::SoftBreak => unit(serializer, "SoftBreak"),
            Inline::LineBreak => unit(serializer, "LineBreak"),
            Inline::Math(kind, source) => tagged(serializer, "Math", &(kind, source)),
            Inline::RawInline(format, text) => tagged(serializer, "RawInline", &(format, text)),
            Inline::Link(attr, inlines, target) => {
                tagged(serializer, "Link", &(attr, inlines, target))
            }
            Inline::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Inline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Inline::from_value(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_paragraph() {
        let block: Block = serde_json::from_value(json!({
            "t": "Para",
            "c": [
                {"t": "Str", "c": "Hello"},
                {"t": "Space"},
                {"t": "Math", "c": [{"t": "InlineMath"}, "x^2"]}
            ]
        }))
        .unwrap();

        assert_eq!(
            block,
            Block::para(vec![
                Inline::str("Hello"),
                Inline::Space,
                Inline::inline_math("x^2"),
            ])
        );
    }

    #[test]
    fn test_ordered_list_attributes() {
        let block: Block = serde_json::from_value(json!({
            "t": "OrderedList",
            "c": [
                [3, {"t": "LowerAlpha"}, {"t": "OneParen"}],
                [[{"t": "Plain", "c": [{"t": "Str", "c": "c"}]}]]
            ]
        }))
        .unwrap();

        let Block::OrderedList(attrs, items) = &block else {
            panic!("expected an ordered list, got {block:?}");
        };
        assert_eq!(
            *attrs,
            ListAttributes(3, ListNumberStyle::LowerAlpha, ListNumberDelim::OneParen)
        );
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_unknown_nodes_round_trip() {
        let source = json!({
            "pandoc-api-version": [1, 23, 1],
            "meta": {"title": {"t": "MetaInlines", "c": [{"t": "Str", "c": "T"}]}},
            "blocks": [
                {"t": "Table", "c": [["", [], []], {"long": [], "short": null}]},
                {"t": "Para", "c": [
                    {"t": "Image", "c": [["", [], []], [], ["a.png", ""]]},
                    {"t": "Note", "c": []}
                ]},
                {"t": "HorizontalRule"}
            ]
        });

        let doc: Pandoc = serde_json::from_value(source.clone()).unwrap();
        assert!(matches!(doc.blocks[0], Block::Other(_)));
        assert_eq!(doc.blocks[0].tag(), "Table");
        let Block::Para(inlines) = &doc.blocks[1] else {
            panic!("expected a paragraph");
        };
        assert!(inlines.iter().all(|i| matches!(i, Inline::Other(_))));

        assert_eq!(serde_json::to_value(&doc).unwrap(), source);
    }

    #[test]
    fn test_serialize_unit_and_raw() {
        let blocks = vec![Block::HorizontalRule, Block::raw_latex("\\newpage")];
        let value = serde_json::to_value(&blocks).unwrap();
        assert_eq!(
            value,
            json!([
                {"t": "HorizontalRule"},
                {"t": "RawBlock", "c": ["latex", "\\newpage"]}
            ])
        );
    }

    #[test]
    fn test_stringify() {
        let inlines = vec![
            Inline::str("a"),
            Inline::Space,
            Inline::Emph(vec![Inline::str("b"), Inline::SoftBreak, Inline::str("c")]),
            Inline::LineBreak,
            Inline::Code(Attr::default(), "d()".to_string()),
            Inline::RawInline(Format("html".to_string()), "<br>".to_string()),
            Inline::display_math("e"),
        ];
        assert_eq!(stringify(&inlines), "a b c d()e");
    }

    #[test]
    fn test_stringify_unmodeled_inlines() {
        let inlines: Vec<Inline> = serde_json::from_value(json!([
            {"t": "Quoted", "c": [{"t": "DoubleQuote"}, [{"t": "Str", "c": "quoted"}]]},
            {"t": "Space"},
            {"t": "Quoted", "c": [{"t": "SingleQuote"}, [{"t": "Str", "c": "single"}]]},
            {"t": "Space"},
            {"t": "Span", "c": [["id", ["cls"], [["k", "v"]]], [{"t": "Str", "c": "span"}]]},
            {"t": "Space"},
            {"t": "Strikeout", "c": [
                {"t": "Str", "c": "struck"},
                {"t": "SoftBreak"},
                {"t": "Emph", "c": [{"t": "Str", "c": "deep"}]}
            ]},
            {"t": "Space"},
            {"t": "Image", "c": [["", [], []], [{"t": "Str", "c": "alt"}], ["a.png", ""]]},
            {"t": "Note", "c": [{"t": "Para", "c": [{"t": "Str", "c": "footnote"}]}]},
            {"t": "Space"},
            {"t": "Subscript", "c": [{"t": "Math", "c": [{"t": "InlineMath"}, "x_1"]}]}
        ]))
        .unwrap();

        assert!(inlines.iter().all(|i| matches!(i, Inline::Other(_) | Inline::Space)));
        assert_eq!(
            stringify(&inlines),
            "\u{201C}quoted\u{201D} \u{2018}single\u{2019} span struck deep alt x_1"
        );
    }

    #[test]
    fn test_unknown_node_with_null_content_round_trips() {
        let source = json!([
            {"t": "Figure", "c": null},
            {"t": "Para", "c": [{"t": "Underline", "c": null}, {"t": "Str", "c": "x"}]}
        ]);
        let blocks: Vec<Block> = serde_json::from_value(source.clone()).unwrap();
        assert!(matches!(blocks[0], Block::Other(_)));
        assert_eq!(serde_json::to_value(&blocks).unwrap(), source);
    }

    #[test]
    fn test_inlines_from_text() {
        assert_eq!(
            inlines_from_text("[!NOTE] Title\nBody  text"),
            vec![
                Inline::str("[!NOTE]"),
                Inline::Space,
                Inline::str("Title"),
                Inline::SoftBreak,
                Inline::str("Body"),
                Inline::Space,
                Inline::str("text"),
            ]
        );
    }

    #[test]
    fn test_format_is_latex() {
        assert!(Format::latex().is_latex());
        assert!(Format("tex".to_string()).is_latex());
        assert!(!Format("html".to_string()).is_latex());
    }
}
