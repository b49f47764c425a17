//! Callout to LaTeX environment rewriting
//!
//! Callouts are blockquotes whose first paragraph opens with a `[!KIND]`
//! marker, optionally followed by a custom title on the same line:
//!
//! ```markdown
//! > [!WARNING] Mind the gap
//! > Body text
//! ```
//!
//! [`CalloutRewriter::rewrite`] turns such a blockquote into one raw LaTeX
//! block that wraps the rendered content in the environment mapped to `KIND`.
//! Any other block comes back untouched.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use notetex_ast::{Block, BlockConverter, Format, Inline, LatexWriter, MathType, stringify};
use regex::Regex;
use tracing::debug;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[!(\w+)\]").expect("callout marker pattern is valid"));

/// Environment used for kinds without a mapping
pub const DEFAULT_ENVIRONMENT: &str = "calloutbox";

/// Built-in kind to environment table
const BUILTIN_ENVIRONMENTS: &[(&str, &str)] = &[
    ("NOTE", "notebox"),
    ("INFO", "infobox"),
    ("TODO", "todobox"),
    ("ABSTRACT", "abstractbox"),
    ("SUMMARY", "abstractbox"),
    ("TLDR", "abstractbox"),
    ("TIP", "tipbox"),
    ("HINT", "tipbox"),
    ("IMPORTANT", "importantbox"),
    ("SUCCESS", "successbox"),
    ("CHECK", "successbox"),
    ("DONE", "successbox"),
    ("QUESTION", "questionbox"),
    ("HELP", "questionbox"),
    ("FAQ", "questionbox"),
    ("WARNING", "warningbox"),
    ("CAUTION", "warningbox"),
    ("ATTENTION", "warningbox"),
    ("FAILURE", "failurebox"),
    ("FAIL", "failurebox"),
    ("MISSING", "failurebox"),
    ("DANGER", "dangerbox"),
    ("ERROR", "dangerbox"),
    ("BUG", "bugbox"),
    ("EXAMPLE", "examplebox"),
    ("QUOTE", "quotebox"),
    ("CITE", "quotebox"),
];

/// Mapping from callout kind to LaTeX environment name
///
/// Kinds are stored upper-cased; lookups are case-insensitive. The mapping is
/// fixed once the rewriter is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalloutConfig {
    environments: BTreeMap<String, String>,
    default_environment: String,
}

impl CalloutConfig {
    /// An empty mapping: every kind resolves to `default_environment`
    pub fn new(default_environment: impl Into<String>) -> Self {
        Self {
            environments: BTreeMap::new(),
            default_environment: default_environment.into(),
        }
    }

    /// The built-in table with [`DEFAULT_ENVIRONMENT`] as fallback
    pub fn builtin() -> Self {
        BUILTIN_ENVIRONMENTS
            .iter()
            .fold(Self::new(DEFAULT_ENVIRONMENT), |config, (kind, env)| {
                config.with_environment(kind, *env)
            })
    }

    /// Map `kind` to `environment`, replacing any previous mapping
    pub fn with_environment(mut self, kind: &str, environment: impl Into<String>) -> Self {
        self.environments
            .insert(kind.to_uppercase(), environment.into());
        self
    }

    pub fn with_default_environment(mut self, environment: impl Into<String>) -> Self {
        self.default_environment = environment.into();
        self
    }

    /// Environment for `kind`, falling back to the default environment
    pub fn resolve(&self, kind: &str) -> &str {
        self.environments
            .get(&kind.to_uppercase())
            .map(String::as_str)
            .unwrap_or(self.default_environment.as_str())
    }

    pub fn default_environment(&self) -> &str {
        &self.default_environment
    }

    /// Explicit mappings, ordered by kind
    pub fn environments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.environments
            .iter()
            .map(|(kind, env)| (kind.as_str(), env.as_str()))
    }
}

impl Default for CalloutConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Rewrites callout blockquotes into raw LaTeX environments
///
/// Content the rewriter has no rule for (headers, code blocks, tables,
/// nested blockquotes, ...) is handed to the [`BlockConverter`].
#[derive(Debug, Clone)]
pub struct CalloutRewriter<C = LatexWriter> {
    config: CalloutConfig,
    converter: C,
}

impl CalloutRewriter<LatexWriter> {
    pub fn new(config: CalloutConfig) -> Self {
        Self::with_converter(config, LatexWriter)
    }
}

impl Default for CalloutRewriter<LatexWriter> {
    fn default() -> Self {
        Self::new(CalloutConfig::default())
    }
}

impl<C: BlockConverter> CalloutRewriter<C> {
    pub fn with_converter(config: CalloutConfig, converter: C) -> Self {
        Self { config, converter }
    }

    pub fn config(&self) -> &CalloutConfig {
        &self.config
    }

    /// Rewrite `block` if it is a callout, otherwise return it unchanged
    pub fn rewrite(&self, block: Block) -> Block {
        match block {
            Block::BlockQuote(content) => match self.rewrite_quote(content) {
                Ok(raw) => raw,
                Err(content) => Block::BlockQuote(content),
            },
            other => other,
        }
    }

    fn rewrite_quote(&self, mut content: Vec<Block>) -> Result<Block, Vec<Block>> {
        let Some(kind) = callout_kind(&content) else {
            return Err(content);
        };

        let title = match content.first_mut() {
            Some(Block::Para(inlines)) => take_header(inlines),
            _ => Vec::new(),
        };
        let environment = self.config.resolve(&kind);

        let mut latex = format!("\\begin{{{}}}", environment);
        if !title.is_empty() {
            latex.push_str(&format!("\\textbf{{{}}}\\\\", stringify(&title)));
        }
        latex.push('\n');
        latex.push_str(&self.render_blocks(&content));
        latex.push('\n');
        latex.push_str(&format!("\\end{{{}}}", environment));

        debug!(kind = %kind, environment, "rewrote callout");
        Ok(Block::RawBlock(Format::latex(), latex))
    }

    fn render_blocks(&self, blocks: &[Block]) -> String {
        blocks
            .iter()
            .map(|block| self.render_block(block))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_block(&self, block: &Block) -> String {
        match block {
            Block::Para(inlines) => render_inlines(inlines),
            Block::Plain(inlines) => stringify(inlines),
            Block::BulletList(items) => self.render_list("itemize", items),
            Block::OrderedList(_, items) => self.render_list("enumerate", items),
            Block::RawBlock(format, text) if format.is_latex() => text.clone(),
            Block::RawBlock(..)
            | Block::BlockQuote(_)
            | Block::CodeBlock(..)
            | Block::Header(..)
            | Block::HorizontalRule
            | Block::Div(..)
            | Block::Other(_) => self.converter.convert_block(block),
        }
    }

    fn render_list(&self, environment: &str, items: &[Vec<Block>]) -> String {
        let mut out = format!("\\begin{{{}}}\n", environment);
        for item in items {
            out.push_str("\\item ");
            out.push_str(&self.render_blocks(item));
            out.push('\n');
        }
        out.push_str(&format!("\\end{{{}}}", environment));
        out
    }
}

/// Whether `block` is a blockquote carrying a callout marker
pub fn is_callout(block: &Block) -> bool {
    matches!(block, Block::BlockQuote(content) if callout_kind(content).is_some())
}

/// Kind named by the marker opening the first paragraph, if any
fn callout_kind(content: &[Block]) -> Option<String> {
    let Some(Block::Para(inlines)) = content.first() else {
        return None;
    };
    let Some(Inline::Str(text)) = inlines.first() else {
        return None;
    };
    MARKER_RE.captures(text).map(|caps| caps[1].to_string())
}

/// Strip the marker line from a callout's first paragraph, returning the
/// custom title spans (empty when the callout has none)
fn take_header(inlines: &mut Vec<Inline>) -> Vec<Inline> {
    inlines.remove(0);
    if matches!(inlines.first(), Some(Inline::Space)) {
        inlines.remove(0);
    }
    let end = inlines
        .iter()
        .position(|inline| matches!(inline, Inline::SoftBreak))
        .unwrap_or(inlines.len());
    let title: Vec<Inline> = inlines.drain(..end).collect();
    if matches!(inlines.first(), Some(Inline::SoftBreak)) {
        inlines.remove(0);
    }
    title
}

/// Paragraph content: math keeps its delimiters, everything else is plain text
fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Math(MathType::DisplayMath, source) => {
                out.push_str("\n\\[\n");
                out.push_str(source);
                out.push_str("\n\\]\n");
            }
            Inline::Math(MathType::InlineMath, source) => {
                out.push('$');
                out.push_str(source);
                out.push('$');
            }
            other => other.write_plain(&mut out),
        }
    }
    out
}
