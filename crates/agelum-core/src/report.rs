//! Bug report intake: an annotated screenshot becomes an inbox task.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::annotation::{self, Annotation, Viewport};
use crate::error::{AgelumError, Result};
use crate::frontmatter;
use crate::io::{atomic_write, ensure_dir};
use crate::naming::{sanitize_file_base, timestamp_prefix, unique_path};
use crate::paths;
use crate::store::{self, CreatedFile};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
pub const DEFAULT_TOOL: &str = "Chrome Plugin";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `data:image/png;base64,...` or bare base64.
    #[serde(default)]
    pub screenshot: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Needed to map annotation coordinates; without it they are taken as
    /// image pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReport {
    #[serde(flatten)]
    pub task: CreatedFile,
    pub screenshot: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
}

/// Decode a PNG data URL (or bare base64) into bytes.
pub fn decode_png_data_url(data: &str) -> Result<Vec<u8>> {
    let payload = data.trim();
    let payload = payload.strip_prefix(PNG_DATA_URL_PREFIX).unwrap_or(payload);
    if payload.starts_with("data:") {
        return Err(AgelumError::InvalidReport(
            "screenshot must be a PNG data URL".into(),
        ));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| AgelumError::InvalidReport(format!("screenshot is not valid base64: {e}")))
}

/// Width and height from a PNG IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.len() < 24 || !bytes.starts_with(SIGNATURE) || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let w = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let h = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((w, h))
}

/// Markdown body of a report task.
pub fn report_body(req: &ReportRequest, image_name: Option<&str>) -> String {
    let mut body = String::new();
    if !req.description.trim().is_empty() {
        body.push_str(req.description.trim());
        body.push_str("\n\n");
    }
    body.push_str("## Context\n");
    if !req.source_url.is_empty() {
        body.push_str(&format!("- **Source URL**: {}\n", req.source_url));
    }
    body.push_str(&format!(
        "- **Tool**: {}\n",
        req.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    ));

    if !req.annotations.is_empty() {
        body.push_str("\n## Annotations\n\n");
        body.push_str(&annotation::prompt_list(&req.annotations));
    }

    if let Some(name) = image_name {
        body.push_str(&format!("\n![Screenshot](../images/{name}.png)\n"));
        if !req.annotations.is_empty() {
            body.push_str(&format!("![Annotated screenshot](../images/{name}.svg)\n"));
        }
    }
    body
}

/// Store the screenshot and its overlay under the task images dir and file
/// an `inbox` task describing the report.
pub fn create_report(root: &Path, req: &ReportRequest) -> Result<CreatedReport> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AgelumError::InvalidReport("title is required".into()));
    }

    let png = if req.screenshot.trim().is_empty() {
        None
    } else {
        Some(decode_png_data_url(&req.screenshot)?)
    };

    let images = root.join(paths::TASK_IMAGES_DIR);
    let mut screenshot = None;
    let mut overlay = None;
    let mut image_name = None;

    if let Some(bytes) = &png {
        ensure_dir(&images)?;
        let base = format!("{}-{}", timestamp_prefix(), sanitize_file_base(title));
        let png_path = unique_path(&images, &base, "png");
        let name = png_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(base);
        atomic_write(&png_path, bytes)?;

        if !req.annotations.is_empty() {
            let view = req.viewport.unwrap_or_else(|| {
                let (w, h) = png_dimensions(bytes).unwrap_or((0, 0));
                Viewport::natural(f64::from(w), f64::from(h))
            });
            let svg = annotation::render_overlay(&req.annotations, view, &format!("{name}.png"));
            let svg_path = images.join(format!("{name}.svg"));
            atomic_write(&svg_path, svg.as_bytes())?;
            overlay = Some(svg_path);
        }
        screenshot = Some(png_path);
        image_name = Some(name);
    }

    let mut fields = vec![
        ("created", Utc::now().to_rfc3339()),
        ("state", "inbox".to_string()),
    ];
    if !req.source_url.is_empty() {
        fields.push(("source", req.source_url.clone()));
    }
    let content = format!(
        "{}{}",
        frontmatter::render(&fields),
        report_body(req, image_name.as_deref())
    );
    let task = store::create_from_content(root, Some("inbox"), Some(title), &content)?;
    tracing::info!(id = %task.id, annotations = req.annotations.len(), "filed report");

    Ok(CreatedReport {
        task,
        screenshot,
        overlay,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationType;
    use crate::item;
    use crate::types::{ItemKind, ItemState};
    use tempfile::TempDir;

    /// Minimal PNG header with a 4x3 IHDR.
    fn png_bytes() -> Vec<u8> {
        let mut b = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec();
        b.extend_from_slice(&4u32.to_be_bytes());
        b.extend_from_slice(&3u32.to_be_bytes());
        b.extend_from_slice(&[8, 6, 0, 0, 0]);
        b
    }

    fn request() -> ReportRequest {
        ReportRequest {
            title: "Button overlaps footer".into(),
            description: "The save button covers the footer links.".into(),
            screenshot: format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png_bytes())),
            annotations: vec![Annotation {
                id: 1,
                kind: AnnotationType::Modify,
                x: 1.0,
                y: 1.0,
                width: Some(2.0),
                height: Some(1.0),
                end_x: None,
                end_y: None,
                prompt: "move it up".into(),
            }],
            source_url: "http://localhost:3000/settings".into(),
            tool: None,
            viewport: None,
        }
    }

    #[test]
    fn decodes_data_urls_and_bare_base64() {
        let encoded = STANDARD.encode(b"abc");
        assert_eq!(decode_png_data_url(&format!("{PNG_DATA_URL_PREFIX}{encoded}")).unwrap(), b"abc");
        assert_eq!(decode_png_data_url(&encoded).unwrap(), b"abc");
        assert!(decode_png_data_url("data:image/jpeg;base64,AAAA").is_err());
        assert!(decode_png_data_url("not base64!").is_err());
    }

    #[test]
    fn reads_png_dimensions() {
        assert_eq!(png_dimensions(&png_bytes()), Some((4, 3)));
        assert_eq!(png_dimensions(b"GIF89a"), None);
    }

    #[test]
    fn creates_inbox_task_with_images() {
        let dir = TempDir::new().unwrap();
        let out = create_report(dir.path(), &request()).unwrap();

        let png = out.screenshot.as_ref().unwrap();
        assert!(png.starts_with(dir.path().join(".agelum/work/tasks/images")));
        assert_eq!(std::fs::read(png).unwrap(), png_bytes());
        let svg = std::fs::read_to_string(out.overlay.as_ref().unwrap()).unwrap();
        assert!(svg.contains(r#"width="4" height="3""#));

        let content = std::fs::read_to_string(&out.task.path).unwrap();
        assert!(content.contains("source: http://localhost:3000/settings"));
        assert!(content.contains("- **Tool**: Chrome Plugin"));
        assert!(content.contains("1. **Modify** (at 1,1): move it up"));
        let name = png.file_stem().unwrap().to_string_lossy();
        assert!(content.contains(&format!("![Screenshot](../images/{name}.png)")));

        let parsed = item::parse_file(ItemKind::Task, &out.task.path, ItemState::Inbox, None).unwrap();
        assert_eq!(parsed.source_url.as_deref(), Some("http://localhost:3000/settings"));
        assert_eq!(parsed.state, ItemState::Inbox);
    }

    #[test]
    fn report_without_screenshot_still_files_task() {
        let dir = TempDir::new().unwrap();
        let mut req = request();
        req.screenshot.clear();
        let out = create_report(dir.path(), &req).unwrap();
        assert!(out.screenshot.is_none());
        assert!(!out.task.content.contains("![Screenshot]"));
    }

    #[test]
    fn blank_title_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut req = request();
        req.title = "  ".into();
        assert!(matches!(
            create_report(dir.path(), &req),
            Err(AgelumError::InvalidReport(_))
        ));
    }
}
