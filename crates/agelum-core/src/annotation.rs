//! Screenshot annotations: geometry, SVG rendering and the prompt list that
//! goes into bug reports.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    Modify,
    Arrow,
    Remove,
}

impl AnnotationType {
    pub fn label(self) -> &'static str {
        match self {
            AnnotationType::Modify => "Modify",
            AnnotationType::Arrow => "Arrow",
            AnnotationType::Remove => "Remove",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            AnnotationType::Modify => Palette {
                stroke: "#f59e0b",
                fill: "rgba(245, 158, 11, 0.15)",
                badge: "#f97316",
                glow: "rgba(245, 158, 11, 0.8)",
            },
            AnnotationType::Arrow => Palette {
                stroke: "#3b82f6",
                fill: "transparent",
                badge: "#2563eb",
                glow: "rgba(37, 99, 235, 0.8)",
            },
            AnnotationType::Remove => Palette {
                stroke: "#dc2626",
                fill: "rgba(220, 38, 38, 0.15)",
                badge: "#dc2626",
                glow: "rgba(220, 38, 38, 0.8)",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub stroke: &'static str,
    pub fill: &'static str,
    pub badge: &'static str,
    pub glow: &'static str,
}

/// One mark on a screenshot, in display (CSS pixel) coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_y: Option<f64>,
    #[serde(default)]
    pub prompt: String,
}

impl Annotation {
    fn arrow_end(&self) -> Option<(f64, f64)> {
        match (self.kind, self.end_x, self.end_y) {
            (AnnotationType::Arrow, Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

/// Attribute sets for the SVG primitives an annotation is drawn with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SvgElement {
    #[serde(rename_all = "camelCase")]
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke: String,
        stroke_width: f64,
    },
    Polygon {
        points: String,
        fill: String,
    },
    #[serde(rename_all = "camelCase")]
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        stroke: String,
        stroke_width: f64,
        fill: String,
    },
}

impl SvgElement {
    pub fn to_markup(&self) -> String {
        match self {
            SvgElement::Line {
                x1,
                y1,
                x2,
                y2,
                stroke,
                stroke_width,
            } => format!(
                r#"<line x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}" stroke="{}" stroke-width="{stroke_width}" stroke-linecap="round"/>"#,
                escape_attr(stroke)
            ),
            SvgElement::Polygon { points, fill } => {
                format!(r#"<polygon points="{points}" fill="{}"/>"#, escape_attr(fill))
            }
            SvgElement::Rect {
                x,
                y,
                width,
                height,
                stroke,
                stroke_width,
                fill,
            } => format!(
                r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" stroke="{}" stroke-width="{stroke_width}" fill="{}"/>"#,
                escape_attr(stroke),
                escape_attr(fill)
            ),
        }
    }
}

/// Polygon points for an arrowhead at `(x2, y2)` pointing away from
/// `(x1, y1)`, with wings at ±30°.
pub fn arrowhead_points(x1: f64, y1: f64, x2: f64, y2: f64, length: f64) -> String {
    let angle = (y2 - y1).atan2(x2 - x1);
    let p1x = x2 - length * (angle - PI / 6.0).cos();
    let p1y = y2 - length * (angle - PI / 6.0).sin();
    let p2x = x2 - length * (angle + PI / 6.0).cos();
    let p2y = y2 - length * (angle + PI / 6.0).sin();
    format!("{x2},{y2} {p1x},{p1y} {p2x},{p2y}")
}

pub const ARROWHEAD_LENGTH: f64 = 12.0;
const REMOVE_LABEL: &str = "REMOVE THIS";

/// Primitives for `ann` in its own coordinate space.
pub fn svg_elements(ann: &Annotation) -> Vec<SvgElement> {
    let colors = ann.kind.palette();
    if let Some((ex, ey)) = ann.arrow_end() {
        return vec![
            SvgElement::Line {
                x1: ann.x,
                y1: ann.y,
                x2: ex,
                y2: ey,
                stroke: colors.stroke.to_string(),
                stroke_width: 3.0,
            },
            SvgElement::Polygon {
                points: arrowhead_points(ann.x, ann.y, ex, ey, ARROWHEAD_LENGTH),
                fill: colors.stroke.to_string(),
            },
        ];
    }
    vec![SvgElement::Rect {
        x: ann.x,
        y: ann.y,
        width: ann.width.unwrap_or(0.0),
        height: ann.height.unwrap_or(0.0),
        stroke: colors.stroke.to_string(),
        stroke_width: 2.0,
        fill: colors.fill.to_string(),
    }]
}

/// Size of the screenshot as shown to the annotator and as captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub display_width: f64,
    pub display_height: f64,
    pub natural_width: f64,
    pub natural_height: f64,
}

impl Viewport {
    /// Viewport where display and natural size agree.
    pub fn natural(width: f64, height: f64) -> Self {
        Self {
            display_width: width,
            display_height: height,
            natural_width: width,
            natural_height: height,
        }
    }

    fn scales(&self) -> (f64, f64, f64) {
        let ratio = |n: f64, d: f64| {
            let r = n / d;
            if r.is_finite() && r > 0.0 {
                r
            } else {
                1.0
            }
        };
        let sx = ratio(self.natural_width, self.display_width);
        let sy = ratio(self.natural_height, self.display_height);
        (sx, sy, sx.min(sy))
    }
}

/// Standalone SVG that draws `annotations` over the screenshot at
/// `image_href`, mapped from display to natural pixels, with a numbered
/// badge at each annotation's origin.
pub fn render_overlay(annotations: &[Annotation], view: Viewport, image_href: &str) -> String {
    let (sx, sy, scale) = view.scales();
    let (w, h) = (view.natural_width, view.natural_height);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    if !image_href.is_empty() {
        let _ = writeln!(
            svg,
            r#"  <image href="{}" x="0" y="0" width="{w}" height="{h}"/>"#,
            escape_attr(image_href)
        );
    }

    let badge_radius = (12.0 * scale).max(10.0);
    let stroke_width = (2.0 * scale).max(2.0);
    let font_size = (10.0 * scale).max(10.0);

    for ann in annotations {
        let colors = ann.kind.palette();
        let (x, y) = (ann.x * sx, ann.y * sy);
        let _ = writeln!(svg, r#"  <g data-annotation="{}">"#, ann.id);

        let elements = match ann.arrow_end() {
            Some((ex, ey)) => {
                let (ex, ey) = (ex * sx, ey * sy);
                vec![
                    SvgElement::Line {
                        x1: x,
                        y1: y,
                        x2: ex,
                        y2: ey,
                        stroke: colors.stroke.to_string(),
                        stroke_width: stroke_width * 1.5,
                    },
                    SvgElement::Polygon {
                        points: arrowhead_points(x, y, ex, ey, ARROWHEAD_LENGTH * scale),
                        fill: colors.stroke.to_string(),
                    },
                ]
            }
            None => vec![SvgElement::Rect {
                x,
                y,
                width: ann.width.unwrap_or(0.0) * sx,
                height: ann.height.unwrap_or(0.0) * sy,
                stroke: colors.stroke.to_string(),
                stroke_width,
                fill: colors.fill.to_string(),
            }],
        };
        for el in &elements {
            let _ = writeln!(svg, "    {}", el.to_markup());
        }

        if ann.kind == AnnotationType::Remove && ann.arrow_end().is_none() {
            let label_h = (14.0 * scale).max(12.0);
            let label_font = (9.0 * scale).max(8.0);
            let label_w = REMOVE_LABEL.len() as f64 * label_font * 0.62 + 8.0 * scale;
            let (lx, ly) = (x + 12.0 * scale, y - 25.0 * scale);
            let _ = writeln!(
                svg,
                r##"    <rect x="{lx}" y="{ly}" width="{label_w}" height="{label_h}" rx="{}" fill="#dc2626"/>"##,
                2.0 * scale
            );
            let _ = writeln!(
                svg,
                r##"    <text x="{}" y="{}" font-family="sans-serif" font-weight="bold" font-size="{label_font}" fill="#ffffff" dominant-baseline="middle">{REMOVE_LABEL}</text>"##,
                lx + 4.0 * scale,
                ly + label_h / 2.0,
            );
        }

        let _ = writeln!(
            svg,
            r##"    <circle cx="{x}" cy="{y}" r="{badge_radius}" fill="#ffffff"/>"##
        );
        let _ = writeln!(
            svg,
            r#"    <circle cx="{x}" cy="{y}" r="{}" fill="{}"/>"#,
            badge_radius - 2.0 * scale,
            colors.badge
        );
        let _ = writeln!(
            svg,
            r##"    <text x="{x}" y="{y}" font-family="sans-serif" font-weight="bold" font-size="{font_size}" fill="#ffffff" text-anchor="middle" dominant-baseline="middle">{}</text>"##,
            ann.id
        );
        svg.push_str("  </g>\n");
    }
    svg.push_str("</svg>\n");
    svg
}

/// Numbered markdown instructions, one per annotation.
pub fn prompt_list(annotations: &[Annotation]) -> String {
    annotations
        .iter()
        .enumerate()
        .map(|(i, ann)| {
            let prompt = match ann.prompt.trim() {
                "" => "(no instructions)",
                p => p,
            };
            format!(
                "{}. **{}** (at {},{}): {}\n",
                i + 1,
                ann.kind.label(),
                ann.x.round(),
                ann.y.round(),
                prompt
            )
        })
        .collect()
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
