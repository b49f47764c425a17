//! Block conversion through the `pandoc` executable

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use notetex_ast::{Block, BlockConverter, LatexWriter, PANDOC_API_VERSION, Pandoc};
use tracing::warn;

/// Renders single blocks with `pandoc -f json -t latex`
///
/// When pandoc cannot be run or rejects the block, the block is rendered
/// with [`LatexWriter`] instead and a warning is logged.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
    api_version: Vec<u32>,
}

impl PandocConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            api_version: PANDOC_API_VERSION.to_vec(),
        }
    }

    /// Stamp generated documents with `api_version`, normally the version of
    /// the document being filtered so pandoc accepts it
    pub fn with_api_version(mut self, api_version: Vec<u32>) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, block: &Block) -> Result<String> {
        let doc = Pandoc {
            api_version: self.api_version.clone(),
            ..Pandoc::new(vec![block.clone()])
        };
        let input = serde_json::to_vec(&doc).context("Failed to serialize block")?;

        let mut child = Command::new(&self.program)
            .args(["-f", "json", "-t", "latex"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .context("Failed to write to pandoc")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for pandoc")?;
        if !output.status.success() {
            anyhow::bail!(
                "pandoc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let latex = String::from_utf8(output.stdout).context("pandoc output is not UTF-8")?;
        Ok(latex.trim_end().to_string())
    }
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl BlockConverter for PandocConverter {
    fn convert_block(&self, block: &Block) -> String {
        match self.run(block) {
            Ok(latex) => latex,
            Err(e) => {
                warn!(block = block.tag(), "pandoc conversion failed, using built-in writer: {:#}", e);
                LatexWriter.convert_block(block)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notetex_ast::inlines_from_text;

    #[test]
    fn test_falls_back_to_builtin_writer() {
        let converter = PandocConverter::new("notetex-pandoc-that-does-not-exist");
        let block = Block::header(2, inlines_from_text("A & B"));
        assert_eq!(
            converter.convert_block(&block),
            LatexWriter.convert_block(&block)
        );
    }

    #[test]
    fn test_api_version() {
        let converter = PandocConverter::default().with_api_version(vec![1, 22]);
        assert_eq!(converter.program(), Path::new("pandoc"));
        assert_eq!(converter.api_version, vec![1, 22]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_pandoc_falls_back() {
        // `false` ignores its arguments and exits non-zero
        let converter = PandocConverter::new("false");
        let block = Block::code_block("x <- 1");
        assert_eq!(
            converter.convert_block(&block),
            LatexWriter.convert_block(&block)
        );
    }
}
