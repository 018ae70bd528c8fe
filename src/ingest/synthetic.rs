use anyhow::Result;

use crate::frame::Frame;

/// Synthetic frame generator behind `stub://` locations.
///
/// `stub://name?frames=N` limits the stream to `N` frames; without the query
/// the stream uses the caller's default limit (`None` = endless).
pub(crate) struct SyntheticSource {
    location: String,
    width: u32,
    height: u32,
    frame_limit: Option<u64>,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub(crate) fn new(location: &str, width: u32, height: u32, default_limit: Option<u64>) -> Self {
        Self {
            location: location.to_string(),
            width,
            height,
            frame_limit: parse_frame_limit(location).or(default_limit),
            frame_count: 0,
            scene_state: 0,
        }
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::from_rgb(pixels, self.width, self.height, self.frame_count).map(Some)
    }

    /// Background pattern that shifts every frame and changes scene every 50.
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

fn parse_frame_limit(location: &str) -> Option<u64> {
    let (_, query) = location.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "frames")
        .and_then(|(_, value)| value.parse().ok())
}
