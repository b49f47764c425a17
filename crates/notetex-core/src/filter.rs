//! Document-wide callout rewriting
//!
//! Walks a Pandoc document top-down and offers every blockquote to a
//! [`CalloutRewriter`]. Ordinary blockquotes, lists and divs are descended
//! into; a rewritten callout is not, so callouts nested inside callouts are
//! rendered by the rewriter's fallback converter rather than rewritten.

use notetex_ast::{Block, BlockConverter, Pandoc};
use tracing::debug;

use crate::callout::CalloutRewriter;

/// Rewrite all callouts in `doc`, returning how many were rewritten
pub fn rewrite_callouts<C: BlockConverter>(doc: &mut Pandoc, rewriter: &CalloutRewriter<C>) -> usize {
    let count = rewrite_blocks(&mut doc.blocks, rewriter);
    debug!(count, "rewrote callouts in document");
    count
}

fn rewrite_blocks<C: BlockConverter>(blocks: &mut [Block], rewriter: &CalloutRewriter<C>) -> usize {
    let mut count = 0;
    for block in blocks.iter_mut() {
        if matches!(block, Block::BlockQuote(_)) {
            let quote = std::mem::replace(block, Block::Plain(Vec::new()));
            *block = rewriter.rewrite(quote);
            if matches!(block, Block::RawBlock(..)) {
                count += 1;
                continue;
            }
        }
        count += match block {
            Block::BlockQuote(children) | Block::Div(_, children) => {
                rewrite_blocks(children, rewriter)
            }
            Block::BulletList(items) | Block::OrderedList(_, items) => items
                .iter_mut()
                .map(|item| rewrite_blocks(item, rewriter))
                .sum(),
            _ => 0,
        };
    }
    count
}
