use crate::error::{VidbadgeError, VidbadgeResult};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> VidbadgeResult<Self> {
        if den == 0 {
            return Err(VidbadgeError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(VidbadgeError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse an ffmpeg-style ratio such as `30000/1001` or a bare integer such as `25`.
    pub fn parse_ratio(s: &str) -> Option<Self> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((a, b)) => (a.trim().parse::<u32>().ok()?, b.trim().parse::<u32>().ok()?),
            None => (s.parse::<u32>().ok()?, 1),
        };
        Self::new(num, den).ok()
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Stream metadata read once when a source is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

impl StreamInfo {
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// One decoded video frame as RGB8, tightly packed, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VidbadgeResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(VidbadgeError::validation(format!(
                "rgb frame data has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let off = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[off], self.data[off + 1], self.data[off + 2]]
    }
}
