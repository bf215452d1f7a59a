/// Distance in pixels between the overlay and the top/right frame edges.
pub const DEFAULT_MARGIN: i64 = 20;

/// Top-left corner of the overlay inside a frame.
///
/// Signed on purpose: an overlay wider than the frame yields a negative `x`, which the
/// compositor rejects instead of the resolver clamping it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
}

/// Anchor the overlay to the top-right corner with a 20px margin.
pub fn resolve(
    frame_width: u32,
    frame_height: u32,
    overlay_width: u32,
    overlay_height: u32,
) -> Placement {
    resolve_with_margin(
        frame_width,
        frame_height,
        overlay_width,
        overlay_height,
        DEFAULT_MARGIN,
    )
}

pub fn resolve_with_margin(
    frame_width: u32,
    _frame_height: u32,
    overlay_width: u32,
    _overlay_height: u32,
    margin: i64,
) -> Placement {
    Placement {
        x: i64::from(frame_width) - i64::from(overlay_width) - margin,
        y: margin,
    }
}

impl Placement {
    /// Return `true` when an `overlay_width x overlay_height` region at this placement lies fully
    /// inside a `frame_width x frame_height` frame.
    pub fn fits(
        self,
        frame_width: u32,
        frame_height: u32,
        overlay_width: u32,
        overlay_height: u32,
    ) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + i64::from(overlay_width) <= i64::from(frame_width)
            && self.y + i64::from(overlay_height) <= i64::from(frame_height)
    }
}
