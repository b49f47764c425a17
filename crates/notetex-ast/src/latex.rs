//! Pandoc AST to LaTeX writer
//!
//! A native rendition of what `pandoc -t latex` produces for the block and
//! inline subset modeled in [`crate::pandoc`]. Used wherever a single block
//! has to be turned into LaTeX without a round trip through Pandoc.

use crate::pandoc::{Block, Inline, ListAttributes, MathType};
use serde_json::Value;
use tracing::{debug, warn};

/// Block tags with a [`Block`] variant of their own
const MODELED_BLOCKS: &[&str] = &[
    "Plain",
    "Para",
    "CodeBlock",
    "RawBlock",
    "BlockQuote",
    "OrderedList",
    "BulletList",
    "Header",
    "HorizontalRule",
    "Div",
];

/// Converts a single block into target markup
///
/// Implementations must not fail: a block they cannot express is rendered
/// as an empty string.
pub trait BlockConverter {
    fn convert_block(&self, block: &Block) -> String;
}

impl<T: BlockConverter + ?Sized> BlockConverter for &T {
    fn convert_block(&self, block: &Block) -> String {
        (**self).convert_block(block)
    }
}

/// Built-in LaTeX writer
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexWriter;

impl BlockConverter for LatexWriter {
    fn convert_block(&self, block: &Block) -> String {
        let mut writer = Writer::new();
        writer.write_block(block);
        writer.output
    }
}

/// Convert a sequence of blocks to LaTeX, separated by blank lines
pub fn blocks_to_latex(blocks: &[Block]) -> String {
    let mut writer = Writer::new();
    writer.write_blocks(blocks);
    writer.output
}

/// Convert a sequence of inlines to LaTeX
pub fn inlines_to_latex(inlines: &[Inline]) -> String {
    let mut writer = Writer::new();
    writer.write_inlines(inlines);
    writer.output
}

/// LaTeX writer state
struct Writer {
    output: String,
}

impl Writer {
    fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    fn write_blocks(&mut self, blocks: &[Block]) {
        let mut first = true;
        for block in blocks {
            let start = self.output.len();
            if !first {
                self.output.push_str("\n\n");
            }
            let content_start = self.output.len();
            self.write_block(block);
            if self.output.len() == content_start {
                // Nothing written, drop the separator as well
                self.output.truncate(start);
            } else {
                first = false;
            }
        }
    }

    fn write_block(&mut self, block: &Block) {
        match block {
            Block::Plain(inlines) | Block::Para(inlines) => self.write_inlines(inlines),
            Block::CodeBlock(_, text) => {
                self.output.push_str("\\begin{verbatim}\n");
                self.output.push_str(text);
                self.output.push_str("\n\\end{verbatim}");
            }
            Block::RawBlock(format, text) => {
                if format.is_latex() {
                    self.output.push_str(text);
                } else {
                    debug!(format = %format.0, "dropping raw block in foreign format");
                }
            }
            Block::BlockQuote(blocks) => {
                self.output.push_str("\\begin{quote}\n");
                self.write_blocks(blocks);
                self.output.push_str("\n\\end{quote}");
            }
            Block::OrderedList(attrs, items) => self.write_ordered_list(attrs, items),
            Block::BulletList(items) => self.write_list("itemize", items),
            Block::Header(level, attr, inlines) => {
                self.output.push('\\');
                self.output.push_str(sectioning_command(*level));
                self.output.push('{');
                self.write_inlines(inlines);
                self.output.push('}');
                if !attr.0.is_empty() {
                    self.output.push_str(&format!("\\label{{{}}}", attr.0));
                }
            }
            Block::HorizontalRule => {
                self.output
                    .push_str("\\begin{center}\\rule{0.5\\linewidth}{0.5pt}\\end{center}");
            }
            Block::Div(_, blocks) => self.write_blocks(blocks),
            Block::Other(value) => {
                let nested = nested_blocks(value);
                warn!(
                    tag = block.tag(),
                    nested = nested.len(),
                    "no LaTeX rendering for block, keeping only the blocks inside it"
                );
                self.write_blocks(&nested);
            }
        }
    }

    fn write_ordered_list(&mut self, attrs: &ListAttributes, items: &[Vec<Block>]) {
        let ListAttributes(start, _, _) = attrs;
        self.output.push_str("\\begin{enumerate}\n");
        if *start != 1 {
            self.output
                .push_str(&format!("\\setcounter{{enumi}}{{{}}}\n", start - 1));
        }
        self.write_items(items);
        self.output.push_str("\\end{enumerate}");
    }

    fn write_list(&mut self, environment: &str, items: &[Vec<Block>]) {
        self.output
            .push_str(&format!("\\begin{{{}}}\n", environment));
        self.write_items(items);
        self.output.push_str(&format!("\\end{{{}}}", environment));
    }

    fn write_items(&mut self, items: &[Vec<Block>]) {
        for item in items {
            self.output.push_str("\\item ");
            self.write_blocks(item);
            self.output.push('\n');
        }
    }

    fn write_inlines(&mut self, inlines: &[Inline]) {
        for inline in inlines {
            self.write_inline(inline);
        }
    }

    fn write_inline(&mut self, inline: &Inline) {
        match inline {
            Inline::Str(s) => self.output.push_str(&escape_latex(s)),
            Inline::Emph(children) => self.write_command("emph", children),
            Inline::Strong(children) => self.write_command("textbf", children),
            Inline::Code(_, text) => {
                self.output.push_str("\\texttt{");
                self.output.push_str(&escape_latex(text));
                self.output.push('}');
            }
            Inline::Space => self.output.push(' '),
            Inline::SoftBreak => self.output.push('\n'),
            Inline::LineBreak => self.output.push_str("\\\\\n"),
            Inline::Math(MathType::InlineMath, source) => {
                self.output.push_str("\\(");
                self.output.push_str(source);
                self.output.push_str("\\)");
            }
            Inline::Math(MathType::DisplayMath, source) => {
                self.output.push_str("\\[");
                self.output.push_str(source);
                self.output.push_str("\\]");
            }
            Inline::RawInline(format, text) => {
                if format.is_latex() {
                    self.output.push_str(text);
                }
            }
            Inline::Link(_, children, target) => {
                self.output.push_str("\\href{");
                self.output.push_str(&escape_url(&target.0));
                self.output.push_str("}{");
                self.write_inlines(children);
                self.output.push('}');
            }
            Inline::Other(_) => {
                let mut text = String::new();
                inline.write_plain(&mut text);
                self.output.push_str(&escape_latex(&text));
            }
        }
    }

    fn write_command(&mut self, command: &str, children: &[Inline]) {
        self.output.push('\\');
        self.output.push_str(command);
        self.output.push('{');
        self.write_inlines(children);
        self.output.push('}');
    }
}

/// Blocks nested anywhere inside an unmodeled block (table cells, figure
/// bodies, definition list entries), in document order. `LineBlock` lines
/// become plain blocks.
fn nested_blocks(value: &Value) -> Vec<Block> {
    let mut blocks = Vec::new();
    if let Some(content) = value.get("c") {
        collect_blocks(content, &mut blocks);
    }
    blocks
}

fn collect_blocks(value: &Value, blocks: &mut Vec<Block>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_blocks(item, blocks);
            }
        }
        Value::Object(node) => match node.get("t").and_then(Value::as_str) {
            Some(tag) if MODELED_BLOCKS.contains(&tag) => {
                match serde_json::from_value(value.clone()) {
                    Ok(block) => blocks.push(block),
                    Err(e) => debug!(tag, "skipping malformed block: {}", e),
                }
            }
            Some("LineBlock") => {
                let lines = node.get("c").and_then(Value::as_array);
                for line in lines.into_iter().flatten() {
                    if let Ok(inlines) = serde_json::from_value(line.clone()) {
                        blocks.push(Block::Plain(inlines));
                    }
                }
            }
            Some(_) => {
                if let Some(content) = node.get("c") {
                    collect_blocks(content, blocks);
                }
            }
            None => {}
        },
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

fn sectioning_command(level: i64) -> &'static str {
    match level {
        i64::MIN..=1 => "section",
        2 => "subsection",
        3 => "subsubsection",
        4 => "paragraph",
        _ => "subparagraph",
    }
}

/// Escape characters with special meaning in LaTeX text
pub fn escape_latex(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '_' | '%' => {
                result.push('\\');
                result.push(ch);
            }
            '~' => result.push_str("\\textasciitilde{}"),
            '^' => result.push_str("\\textasciicircum{}"),
            _ => result.push(ch),
        }
    }
    result
}

fn escape_url(url: &str) -> String {
    url.replace('%', "\\%").replace('#', "\\#")
}
