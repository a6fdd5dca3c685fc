//! Colour gradients derived from album artwork.

use std::fmt;

use crate::error::PlayerError;
use crate::PlayerResult;

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One colour at a position in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: Color,
}

/// Evenly spaced colour stops, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub stops: Vec<GradientStop>,
}

impl Gradient {
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl fmt::Display for Gradient {
    /// CSS `linear-gradient(90deg, ...)` notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("linear-gradient(90deg")?;
        for stop in &self.stops {
            write!(f, ", {} {:.2}%", stop.color, stop.position * 100.0)?;
        }
        f.write_str(")")
    }
}

/// Average a PNG or JPEG image into `resolution` vertical bands.
pub fn gradient_from_image(bytes: &[u8], resolution: usize) -> PlayerResult<Gradient> {
    if resolution == 0 {
        return Err(PlayerError::InvalidResolution(resolution));
    }
    if bytes.is_empty() {
        return Err(PlayerError::ArtworkDecode("no artwork".to_string()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| PlayerError::ArtworkDecode(e.to_string()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PlayerError::ArtworkDecode("empty image".to_string()));
    }

    let width = width as usize;
    let stops = (0..resolution)
        .map(|band| {
            let start = band * width / resolution;
            let end = ((band + 1) * width / resolution).max(start + 1).min(width);

            let mut sum = [0u64; 3];
            let mut count = 0u64;
            for x in start..end {
                for y in 0..height {
                    let pixel = image.get_pixel(x as u32, y);
                    for (acc, channel) in sum.iter_mut().zip(pixel.0.iter()) {
                        *acc += *channel as u64;
                    }
                    count += 1;
                }
            }

            let position = if resolution > 1 {
                band as f32 / (resolution - 1) as f32
            } else {
                0.0
            };
            GradientStop {
                position,
                color: Color {
                    r: (sum[0] / count) as u8,
                    g: (sum[1] / count) as u8,
                    b: (sum[2] / count) as u8,
                },
            }
        })
        .collect();

    Ok(Gradient { stops })
}
