use std::path::Path;

use anyhow::Context as _;

use crate::error::{VidbadgeError, VidbadgeResult};

/// A still image burned into every frame of a video.
///
/// Color is straight (not premultiplied) RGB8. The alpha plane is optional: three-channel
/// overlays are treated as fully opaque. Immutable after construction, so one overlay can be
/// shared by several pipeline runs.
#[derive(Clone, Debug)]
pub struct Overlay {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
    blend_factor: f64,
}

impl Overlay {
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> VidbadgeResult<Self> {
        check_dims(width, height)?;
        let px = width as usize * height as usize;
        if rgba.len() != px * 4 {
            return Err(VidbadgeError::validation(format!(
                "overlay rgba data has {} bytes, expected {}",
                rgba.len(),
                px * 4
            )));
        }

        let mut rgb = Vec::with_capacity(px * 3);
        let mut alpha = Vec::with_capacity(px);
        for p in rgba.chunks_exact(4) {
            rgb.extend_from_slice(&p[..3]);
            alpha.push(p[3]);
        }
        let blend_factor = mean_alpha(&alpha);

        Ok(Self {
            width,
            height,
            rgb,
            alpha: Some(alpha),
            blend_factor,
        })
    }

    pub fn from_rgb8(width: u32, height: u32, rgb: Vec<u8>) -> VidbadgeResult<Self> {
        check_dims(width, height)?;
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(VidbadgeError::validation(format!(
                "overlay rgb data has {} bytes, expected {expected}",
                rgb.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgb,
            alpha: None,
            blend_factor: 1.0,
        })
    }

    /// Keep the alpha plane only if the decoded image actually carries one.
    pub fn from_dynamic_image(img: image::DynamicImage) -> VidbadgeResult<Self> {
        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            Self::from_rgba8(w, h, rgba.as_raw())
        } else {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            Self::from_rgb8(w, h, rgb.into_raw())
        }
    }

    pub fn load(path: &Path) -> VidbadgeResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode overlay image '{}'", path.display()))?;
        Self::from_dynamic_image(img)
    }

    pub fn save_png(&self, path: &Path) -> VidbadgeResult<()> {
        let (bytes, color) = match &self.alpha {
            Some(alpha) => {
                let mut rgba = Vec::with_capacity(alpha.len() * 4);
                for (c, a) in self.rgb.chunks_exact(3).zip(alpha) {
                    rgba.extend_from_slice(c);
                    rgba.push(*a);
                }
                (rgba, image::ColorType::Rgba8)
            }
            None => (self.rgb.clone(), image::ColorType::Rgb8),
        };
        image::save_buffer_with_format(
            path,
            &bytes,
            self.width,
            self.height,
            color,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub fn alpha(&self) -> Option<&[u8]> {
        self.alpha.as_deref()
    }

    /// Single blend weight for the whole overlay: the mean of the alpha plane divided by 255.
    ///
    /// This is a global average, not a per-pixel composite.
    pub fn blend_factor(&self) -> f64 {
        self.blend_factor
    }
}

fn check_dims(width: u32, height: u32) -> VidbadgeResult<()> {
    if width == 0 || height == 0 {
        return Err(VidbadgeError::validation(
            "overlay width/height must be non-zero",
        ));
    }
    Ok(())
}

fn mean_alpha(alpha: &[u8]) -> f64 {
    if alpha.is_empty() {
        return 1.0;
    }
    let sum: u64 = alpha.iter().map(|&a| u64::from(a)).sum();
    (sum as f64) / (alpha.len() as f64) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_factor_is_mean_alpha() {
        let rgba = [0, 0, 0, 0, 0, 0, 0, 255];
        let o = Overlay::from_rgba8(2, 1, &rgba).unwrap();
        assert!((o.blend_factor() - 0.5).abs() < 1e-12);
        assert_eq!(o.rgb(), &[0, 0, 0, 0, 0, 0]);
        assert_eq!(o.alpha(), Some(&[0u8, 255][..]));
    }

    #[test]
    fn rgb_overlay_is_opaque() {
        let o = Overlay::from_rgb8(1, 1, vec![1, 2, 3]).unwrap();
        assert_eq!(o.blend_factor(), 1.0);
        assert!(o.alpha().is_none());
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(Overlay::from_rgba8(0, 1, &[]).is_err());
        assert!(Overlay::from_rgba8(1, 1, &[0, 0, 0]).is_err());
        assert!(Overlay::from_rgb8(2, 1, vec![0; 3]).is_err());
    }

    #[test]
    fn png_roundtrip_keeps_alpha_plane() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("badge.png");

        let o = Overlay::from_rgba8(2, 1, &[255, 255, 255, 100, 0, 0, 0, 255]).unwrap();
        o.save_png(&path).unwrap();

        let back = Overlay::load(&path).unwrap();
        assert_eq!((back.width(), back.height()), (2, 1));
        assert_eq!(back.rgb(), o.rgb());
        assert_eq!(back.alpha(), o.alpha());
    }

    #[test]
    fn dynamic_rgb_image_has_no_alpha() {
        let img = image::RgbImage::from_raw(1, 1, vec![9, 8, 7]).unwrap();
        let o = Overlay::from_dynamic_image(image::DynamicImage::ImageRgb8(img)).unwrap();
        assert!(o.alpha().is_none());
        assert_eq!(o.rgb(), &[9, 8, 7]);
    }
}
