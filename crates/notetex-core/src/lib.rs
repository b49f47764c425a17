//! notetex-core: Callout rewriting and drawing extraction for notetex
//!
//! This crate provides:
//! - Callout blockquote to LaTeX environment rewriting
//! - Document-wide callout rewriting over a Pandoc AST
//! - Breadth-first PNG payload search in drawing render results
//! - Drawing export (decode and write, with a freshness check)
//! - A `tcolorbox` preamble for the configured environments

pub mod callout;
pub mod export;
pub mod extract;
pub mod filter;
pub mod preamble;

pub use callout::{CalloutConfig, CalloutRewriter, DEFAULT_ENVIRONMENT, is_callout};
pub use export::{
    ExportError, ExportOutcome, decode_payload, default_output_path, export_drawing, export_png,
    load_render_result, needs_refresh, parse_render_result,
};
pub use extract::{RenderValue, extract_png_base64, payload_from_str};
pub use filter::rewrite_callouts;
pub use preamble::preamble;
