//! notetex-ast: Pandoc AST types and LaTeX writer for notetex
//!
//! This crate provides:
//! - Pandoc JSON AST types (subset, unknown nodes preserved verbatim)
//! - A native LaTeX writer for single blocks
//!
//! ## Example
//!
//! ```rust
//! use notetex_ast::{Block, BlockConverter, Inline, LatexWriter};
//!
//! let block = Block::para(vec![Inline::str("50%"), Inline::Space, Inline::inline_math("x")]);
//! assert_eq!(LatexWriter.convert_block(&block), "50\\% \\(x\\)");
//! ```

pub mod latex;
pub mod pandoc;

pub use latex::{BlockConverter, LatexWriter, blocks_to_latex, escape_latex, inlines_to_latex};
pub use pandoc::{
    Attr, Block, Format, Inline, ListAttributes, ListNumberDelim, ListNumberStyle, MathType,
    PANDOC_API_VERSION, Pandoc, Target, inlines_from_text, stringify,
};
