//! Drawing export
//!
//! Turns a drawing's render result into a PNG file next to the drawing:
//! extract the base64 payload, decode it, write it out. Re-exporting is
//! skipped when the PNG is newer than the drawing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::extract_png_base64;

/// Standard alphabet, padding optional
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Errors that can occur while exporting a drawing
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No embedded PNG data found in {0}")]
    NoPayload(PathBuf),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// What [`export_drawing`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The PNG was written, with this many bytes
    Written { output: PathBuf, bytes: usize },
    /// The PNG was already newer than the drawing
    UpToDate { output: PathBuf },
}

/// PNG path used when none is given: the drawing path with a `.png` extension
pub fn default_output_path(source: &Path) -> PathBuf {
    source.with_extension("png")
}

/// Whether `output` has to be (re)generated from `source`
///
/// True when forced, when the output is missing, or when the source was
/// modified after the output.
pub fn needs_refresh(source: &Path, output: &Path, force: bool) -> io::Result<bool> {
    if force || !output.exists() {
        return Ok(true);
    }
    let source_modified = fs::metadata(source)?.modified()?;
    let output_modified = fs::metadata(output)?.modified()?;
    Ok(source_modified > output_modified)
}

/// Read a render result (or a drawing document with an embedded preview)
/// from a JSON file
pub fn load_render_result(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_render_result(content.as_bytes()).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a render result without a nesting limit
///
/// Render results nest as deep as the drawing does. The recursion limit is
/// lifted and the stack grows on demand instead.
pub fn parse_render_result(json: &[u8]) -> serde_json::Result<Value> {
    let mut deserializer = serde_json::Deserializer::from_slice(json);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

/// Decode a base64 payload into raw image bytes
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let bytes = PAYLOAD_ENGINE.decode(payload.trim())?;
    if !bytes.starts_with(PNG_SIGNATURE) {
        warn!(len = bytes.len(), "decoded payload does not start with a PNG signature");
    }
    Ok(bytes)
}

/// Extract the PNG from `result` and write it to `output`
///
/// `source` names the drawing in error messages.
pub fn export_png(result: &Value, source: &Path, output: &Path) -> Result<usize> {
    let payload =
        extract_png_base64(result).ok_or_else(|| ExportError::NoPayload(source.to_path_buf()))?;
    let bytes = decode_payload(payload)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(output, &bytes).map_err(|source| ExportError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    debug!(output = %output.display(), bytes = bytes.len(), "wrote PNG");
    Ok(bytes.len())
}

/// Export the embedded preview of the drawing at `source` to `output`,
/// unless `output` is already fresh
pub fn export_drawing(source: &Path, output: &Path, force: bool) -> Result<ExportOutcome> {
    let stale = needs_refresh(source, output, force).map_err(|err| ExportError::Read {
        path: source.to_path_buf(),
        source: err,
    })?;
    if !stale {
        debug!(output = %output.display(), "PNG is up to date");
        return Ok(ExportOutcome::UpToDate {
            output: output.to_path_buf(),
        });
    }

    let result = load_render_result(source)?;
    let bytes = export_png(&result, source, output)?;
    Ok(ExportOutcome::Written {
        output: output.to_path_buf(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;
    use std::time::{Duration, SystemTime};

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend((0u8..=255).cycle().take(200));
        bytes
    }

    fn drawing_json() -> Value {
        json!({
            "tldrawFileFormatVersion": 1,
            "records": [
                {"id": "document:document", "typeName": "document"},
                {"id": "asset:preview", "props": {"src": format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()))}}
            ]
        })
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("notes/canvas.tldr")),
            PathBuf::from("notes/canvas.png")
        );
    }

    #[test]
    fn test_decode_payload_padding_optional() {
        assert_eq!(decode_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_payload("aGVsbG8").unwrap(), b"hello");
        assert!(matches!(
            decode_payload("not base64!"),
            Err(ExportError::Decode(_))
        ));
    }

    #[test]
    fn test_export_png_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out/canvas.png");

        let bytes = export_png(&drawing_json(), Path::new("canvas.tldr"), &output).unwrap();

        assert_eq!(bytes, png_bytes().len());
        assert_eq!(fs::read(&output).unwrap(), png_bytes());
    }

    #[test]
    fn test_export_png_without_payload() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("canvas.png");
        let result = json!({"records": [{"id": "shape:1"}]});

        let err = export_png(&result, Path::new("canvas.tldr"), &output).unwrap_err();
        assert!(matches!(err, ExportError::NoPayload(ref p) if p == Path::new("canvas.tldr")));
        assert!(!output.exists());
    }

    #[test]
    fn test_load_render_result_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.tldr");
        assert!(matches!(
            load_render_result(&missing),
            Err(ExportError::Read { .. })
        ));

        let broken = dir.path().join("broken.tldr");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            load_render_result(&broken),
            Err(ExportError::Json { .. })
        ));
    }

    #[test]
    fn test_load_deeply_nested_render_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.json");
        let payload = STANDARD.encode(png_bytes());
        let depth = 2_000;
        let json = format!(
            "{}{{\"dataURL\": \"data:image/png;base64,{}\"}}{}",
            "[".repeat(depth),
            payload,
            "]".repeat(depth)
        );
        fs::write(&path, json).unwrap();

        let result = load_render_result(&path).unwrap();
        assert_eq!(extract_png_base64(&result), Some(payload.as_str()));

        let output = dir.path().join("deep.png");
        assert_eq!(export_png(&result, &path, &output).unwrap(), png_bytes().len());
    }

    #[test]
    fn test_parse_render_result_rejects_trailing_data() {
        assert!(parse_render_result(b"{} {}").is_err());
        assert!(parse_render_result(b"[[[").is_err());
        assert_eq!(parse_render_result(b" [1] ").unwrap(), json!([1]));
    }

    #[test]
    fn test_needs_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("canvas.tldr");
        let output = dir.path().join("canvas.png");
        fs::write(&source, "{}").unwrap();

        assert!(needs_refresh(&source, &output, false).unwrap());

        fs::write(&output, b"png").unwrap();
        let now = SystemTime::now();
        set_mtime(&source, now - Duration::from_secs(60));
        set_mtime(&output, now);
        assert!(!needs_refresh(&source, &output, false).unwrap());
        assert!(needs_refresh(&source, &output, true).unwrap());

        set_mtime(&source, now + Duration::from_secs(60));
        assert!(needs_refresh(&source, &output, false).unwrap());
    }

    #[test]
    fn test_export_drawing_skips_fresh_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("canvas.tldr");
        let output = default_output_path(&source);
        fs::write(&source, drawing_json().to_string()).unwrap();

        let outcome = export_drawing(&source, &output, false).unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::Written {
                output: output.clone(),
                bytes: png_bytes().len()
            }
        );

        let now = SystemTime::now();
        set_mtime(&source, now - Duration::from_secs(60));
        set_mtime(&output, now);
        assert_eq!(
            export_drawing(&source, &output, false).unwrap(),
            ExportOutcome::UpToDate {
                output: output.clone()
            }
        );
        assert!(matches!(
            export_drawing(&source, &output, true).unwrap(),
            ExportOutcome::Written { .. }
        ));
    }
}
