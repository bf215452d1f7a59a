use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    error::{VidbadgeError, VidbadgeResult},
    overlay::Overlay,
};

/// Ordered `label: value` pairs. Order is the top-to-bottom order in the badge.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LabelSet(Vec<(String, String)>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, or replace the value in place when the label is already present.
    pub fn set(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.0.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.iter().map(|(l, v)| format!("{l}: {v}")).collect()
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (L, V)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (l, v) in iter {
            set.set(l, v);
        }
        set
    }
}

/// Badge layout. Height grows by `row_height` per label.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BadgeStyle {
    pub width: u32,
    pub row_height: u32,
    /// Straight-alpha RGBA8.
    pub background: [u8; 4],
    pub text_color: [u8; 4],
    pub font_size: f32,
    pub font_family: String,
    /// Top of the first text line.
    pub first_line_top: f32,
    pub line_step: f32,
    /// Extra directory scanned for `.ttf`/`.otf`/`.ttc` files.
    pub font_dir: Option<PathBuf>,
}

impl Default for BadgeStyle {
    fn default() -> Self {
        Self {
            width: 400,
            row_height: 100,
            background: [255, 255, 255, 100],
            text_color: [0, 0, 0, 255],
            font_size: 30.0,
            font_family: "Arial, 'DejaVu Sans', 'Liberation Sans', sans-serif".to_string(),
            first_line_top: 30.0,
            line_step: 80.0,
            font_dir: None,
        }
    }
}

impl BadgeStyle {
    pub fn size_for(&self, labels: &LabelSet) -> (u32, u32) {
        (self.width, self.row_height.saturating_mul(labels.len() as u32))
    }
}

/// Render `labels` into a semi-transparent badge.
pub fn render_labels(labels: &LabelSet, style: &BadgeStyle) -> VidbadgeResult<Overlay> {
    if labels.is_empty() {
        return Err(VidbadgeError::validation("badge needs at least one label"));
    }
    let (width, height) = style.size_for(labels);
    if width == 0 || height == 0 {
        return Err(VidbadgeError::validation(
            "badge width/row_height must be non-zero",
        ));
    }

    let svg = badge_svg(labels, style, width, height);
    let opts = usvg::Options {
        fontdb: build_fontdb(style.font_dir.as_deref()),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts).context("parse badge svg")?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| VidbadgeError::render("failed to allocate badge pixmap"))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );

    let mut rgba = pixmap.take();
    demultiply_rgba8_in_place(&mut rgba);
    tracing::debug!(width, height, labels = labels.len(), "rendered label badge");
    Overlay::from_rgba8(width, height, &rgba)
}

/// Render `labels` and write the badge as a PNG.
pub fn render_labels_to_png(
    labels: &LabelSet,
    style: &BadgeStyle,
    out: &Path,
) -> VidbadgeResult<Overlay> {
    let overlay = render_labels(labels, style)?;
    overlay.save_png(out)?;
    Ok(overlay)
}

fn badge_svg(labels: &LabelSet, style: &BadgeStyle, width: u32, height: u32) -> String {
    use std::fmt::Write as _;

    let [br, bg, bb, ba] = style.background;
    let [tr, tg, tb, ta] = style.text_color;
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = write!(
        svg,
        r#"<rect x="0" y="0" width="{width}" height="{height}" fill="rgb({br},{bg},{bb})" fill-opacity="{}"/>"#,
        f32::from(ba) / 255.0
    );

    // SVG positions text by its baseline; shift by the ascent so `first_line_top` is the glyph top.
    let ascent = style.font_size * 0.8;
    let cx = f64::from(width) / 2.0;
    for (i, line) in labels.lines().iter().enumerate() {
        let y = style.first_line_top + style.line_step * i as f32 + ascent;
        let _ = write!(
            svg,
            r#"<text x="{cx}" y="{y}" text-anchor="middle" font-family="{}" font-size="{}" fill="rgb({tr},{tg},{tb})" fill-opacity="{}">{}</text>"#,
            escape_xml(&style.font_family),
            style.font_size,
            f32::from(ta) / 255.0,
            escape_xml(line)
        );
    }
    svg.push_str("</svg>");
    svg
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn build_fontdb(font_dir: Option<&Path>) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = font_dir {
        load_fonts_from_dir(&mut db, dir);
    }
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "font directory is not readable");
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if path.is_file() && matches!(ext.as_str(), "ttf" | "otf" | "ttc") {
            let _ = db.load_font_file(&path);
        }
    }
}

fn demultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
