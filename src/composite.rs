use crate::{
    core::RgbFrame,
    error::{VidbadgeError, VidbadgeResult},
    overlay::Overlay,
    placement::Placement,
};

/// Weighted sum of two channel values, `dst * (1 - a) + src * a`.
///
/// Computed in f64, rounded half-to-even and saturated to `0..=255`.
pub fn weighted(dst: u8, src: u8, a: f64) -> u8 {
    let v = f64::from(dst) * (1.0 - a) + f64::from(src) * a;
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Blend `overlay` into `frame` at `placement`, in place.
///
/// The whole overlay uses [`Overlay::blend_factor`] as its weight. When the overlay region does
/// not lie fully inside the frame, nothing is written and a geometry error is returned.
pub fn blend(frame: &mut RgbFrame, overlay: &Overlay, placement: Placement) -> VidbadgeResult<()> {
    let (ow, oh) = (overlay.width(), overlay.height());
    if !placement.fits(frame.width, frame.height, ow, oh) {
        return Err(VidbadgeError::geometry(format!(
            "overlay {ow}x{oh} at ({}, {}) does not fit frame {}x{}",
            placement.x, placement.y, frame.width, frame.height
        )));
    }
    if frame.data.len() != frame.width as usize * frame.height as usize * 3 {
        return Err(VidbadgeError::validation(
            "frame.data size mismatch with width*height*3",
        ));
    }

    let a = overlay.blend_factor();
    let frame_stride = frame.width as usize * 3;
    let row_len = ow as usize * 3;
    let x0 = placement.x as usize * 3;

    for (row, src) in overlay.rgb().chunks_exact(row_len).enumerate() {
        let off = (placement.y as usize + row) * frame_stride + x0;
        let dst = &mut frame.data[off..off + row_len];
        for (d, s) in dst.iter_mut().zip(src) {
            *d = weighted(*d, *s, a);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::resolve;

    fn solid_rgba(w: u32, h: u32, px: [u8; 4]) -> Overlay {
        let mut data = Vec::new();
        for _ in 0..(w * h) {
            data.extend_from_slice(&px);
        }
        Overlay::from_rgba8(w, h, &data).unwrap()
    }

    #[test]
    fn weighted_endpoints_and_midpoint() {
        assert_eq!(weighted(10, 200, 0.0), 10);
        assert_eq!(weighted(10, 200, 1.0), 200);
        // 127.5 rounds to the even neighbour.
        assert_eq!(weighted(0, 255, 0.5), 128);
        assert_eq!(weighted(255, 0, 0.5), 128);
        assert_eq!(weighted(0, 253, 0.5), 126);
    }

    #[test]
    fn hd_scenario_half_alpha_red_over_blue() {
        let mut frame = RgbFrame::filled(1280, 720, [0, 0, 255]);
        // 255 and 0 alternating alpha averages to exactly 0.5.
        let mut data = Vec::new();
        for i in 0..(400 * 300) {
            data.extend_from_slice(&[255, 0, 0, if i % 2 == 0 { 255 } else { 0 }]);
        }
        let overlay = Overlay::from_rgba8(400, 300, &data).unwrap();
        assert!((overlay.blend_factor() - 0.5).abs() < 1e-12);

        let p = resolve(1280, 720, 400, 300);
        blend(&mut frame, &overlay, p).unwrap();

        for (x, y) in [(860, 20), (1259, 20), (860, 319), (1259, 319), (1000, 100)] {
            assert_eq!(frame.pixel(x, y), [128, 0, 128], "at ({x}, {y})");
        }
        for (x, y) in [(859, 20), (1260, 20), (860, 19), (860, 320), (0, 0)] {
            assert_eq!(frame.pixel(x, y), [0, 0, 255], "at ({x}, {y})");
        }
    }

    #[test]
    fn opaque_overlay_is_idempotent() {
        let mut frame = RgbFrame::filled(64, 48, [12, 34, 56]);
        frame.data[0] = 200;
        let overlay = solid_rgba(16, 8, [90, 80, 70, 255]);
        let p = resolve(64, 48, 16, 8);

        blend(&mut frame, &overlay, p).unwrap();
        let once = frame.clone();
        blend(&mut frame, &overlay, p).unwrap();
        assert_eq!(frame, once);

        for y in 20..28 {
            for x in 28..44 {
                assert_eq!(frame.pixel(x, y), [90, 80, 70]);
            }
        }
    }

    #[test]
    fn transparent_overlay_is_identity() {
        let original = RgbFrame {
            width: 40,
            height: 40,
            data: (0..40 * 40 * 3).map(|i| (i % 251) as u8).collect(),
        };
        let mut frame = original.clone();
        let overlay = solid_rgba(10, 10, [255, 255, 255, 0]);
        blend(&mut frame, &overlay, resolve(40, 40, 10, 10)).unwrap();
        assert_eq!(frame, original);
    }

    #[test]
    fn rgb_overlay_replaces_region() {
        let mut frame = RgbFrame::filled(30, 30, [0, 0, 0]);
        let overlay = Overlay::from_rgb8(2, 2, vec![9; 12]).unwrap();
        blend(&mut frame, &overlay, Placement { x: 0, y: 0 }).unwrap();
        assert_eq!(frame.pixel(1, 1), [9, 9, 9]);
        assert_eq!(frame.pixel(2, 2), [0, 0, 0]);
    }

    #[test]
    fn off_frame_placement_leaves_frame_untouched() {
        let original = RgbFrame::filled(300, 300, [1, 2, 3]);
        let mut frame = original.clone();
        let overlay = solid_rgba(400, 300, [255, 0, 0, 255]);

        let err = blend(&mut frame, &overlay, resolve(300, 300, 400, 300)).unwrap_err();
        assert!(matches!(err, VidbadgeError::Geometry(_)));
        assert_eq!(frame, original);
    }
}
