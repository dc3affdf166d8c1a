//! Pixel formats exchanged between soft-filter stages.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packed pixel format of a frame buffer.
///
/// Pixels are stored in native byte order, one `u16` or `u32` per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 16bpp, 5-6-5 red/green/blue.
    Rgb565,
    /// 32bpp, top byte unused.
    Xrgb8888,
    /// 16bpp, red/green/blue/alpha nibbles from high to low.
    Rgb4444,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 | Self::Rgb4444 => 2,
            Self::Xrgb8888 => 4,
        }
    }

    /// Single-bit mask for this format.
    pub const fn mask(self) -> FormatMask {
        match self {
            Self::Rgb565 => FormatMask::RGB565,
            Self::Xrgb8888 => FormatMask::XRGB8888,
            Self::Rgb4444 => FormatMask::RGB4444,
        }
    }

    /// Minimum row stride for `width` pixels.
    pub const fn row_bytes(self, width: u32) -> usize {
        width as usize * self.bytes_per_pixel()
    }

    /// Read the pixel at `offset` and expand it to 8-bit `[r, g, b]`.
    #[inline]
    pub fn unpack(self, bytes: &[u8], offset: usize) -> [u8; 3] {
        match self {
            Self::Xrgb8888 => {
                let p = u32::from_ne_bytes([
                    bytes[offset],
                    bytes[offset + 1],
                    bytes[offset + 2],
                    bytes[offset + 3],
                ]);
                [(p >> 16) as u8, (p >> 8) as u8, p as u8]
            }
            Self::Rgb565 => {
                let p = u16::from_ne_bytes([bytes[offset], bytes[offset + 1]]);
                let r = ((p >> 11) & 0x1f) as u8;
                let g = ((p >> 5) & 0x3f) as u8;
                let b = (p & 0x1f) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
            }
            Self::Rgb4444 => {
                let p = u16::from_ne_bytes([bytes[offset], bytes[offset + 1]]);
                let r = ((p >> 12) & 0xf) as u8;
                let g = ((p >> 8) & 0xf) as u8;
                let b = ((p >> 4) & 0xf) as u8;
                [(r << 4) | r, (g << 4) | g, (b << 4) | b]
            }
        }
    }

    /// Write 8-bit `[r, g, b]` at `offset`, reducing to this format's depth.
    #[inline]
    pub fn pack(self, bytes: &mut [u8], offset: usize, rgb: [u8; 3]) {
        let [r, g, b] = rgb;
        match self {
            Self::Xrgb8888 => {
                let p = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
                bytes[offset..offset + 4].copy_from_slice(&p.to_ne_bytes());
            }
            Self::Rgb565 => {
                let p = (((r as u16) >> 3) << 11) | (((g as u16) >> 2) << 5) | ((b as u16) >> 3);
                bytes[offset..offset + 2].copy_from_slice(&p.to_ne_bytes());
            }
            Self::Rgb4444 => {
                let p = (((r as u16) >> 4) << 12)
                    | (((g as u16) >> 4) << 8)
                    | (((b as u16) >> 4) << 4)
                    | 0xf;
                bytes[offset..offset + 2].copy_from_slice(&p.to_ne_bytes());
            }
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb565 => "RGB565",
            Self::Xrgb8888 => "XRGB8888",
            Self::Rgb4444 => "RGB4444",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of pixel formats a stage accepts or produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatMask: u32 {
        const RGB565 = 1 << 0;
        const XRGB8888 = 1 << 1;
        const RGB4444 = 1 << 2;
    }
}

impl FormatMask {
    /// Check whether `format` is part of this set.
    pub fn accepts(self, format: PixelFormat) -> bool {
        self.contains(format.mask())
    }
}
