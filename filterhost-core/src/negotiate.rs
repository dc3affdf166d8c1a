//! Capability negotiation between adjacent stages.

use crate::format::{FormatMask, PixelFormat};

/// Fallback formats, most precise first.
pub const NEGOTIATION_PRIORITY: [PixelFormat; 3] = [
    PixelFormat::Xrgb8888,
    PixelFormat::Rgb565,
    PixelFormat::Rgb4444,
];

/// Pick the format flowing across one stage boundary.
///
/// `current` is the format already produced upstream and `accepted` the set
/// the downstream side takes. The current format wins when accepted, so no
/// conversion is needed; otherwise the first accepted entry of
/// [`NEGOTIATION_PRIORITY`] is chosen. `None` means the two sides share no
/// format.
pub fn negotiate(current: PixelFormat, accepted: FormatMask) -> Option<PixelFormat> {
    if accepted.accepts(current) {
        return Some(current);
    }
    NEGOTIATION_PRIORITY
        .iter()
        .copied()
        .find(|format| accepted.accepts(*format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_current_format() {
        let accepted = FormatMask::RGB565 | FormatMask::XRGB8888;
        assert_eq!(negotiate(PixelFormat::Rgb565, accepted), Some(PixelFormat::Rgb565));
    }

    #[test]
    fn test_falls_back_by_priority() {
        let accepted = FormatMask::RGB565 | FormatMask::XRGB8888;
        assert_eq!(negotiate(PixelFormat::Rgb4444, accepted), Some(PixelFormat::Xrgb8888));
        assert_eq!(
            negotiate(PixelFormat::Xrgb8888, FormatMask::RGB4444 | FormatMask::RGB565),
            Some(PixelFormat::Rgb565)
        );
    }

    #[test]
    fn test_no_common_format() {
        assert_eq!(negotiate(PixelFormat::Rgb565, FormatMask::empty()), None);
    }
}
