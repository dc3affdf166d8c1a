//! Pixel format conversion between stages.

use filterhost_core::PixelFormat;

/// Convert `height` rows of `width` pixels from `src` to `dst`.
///
/// Identical formats are copied row by row.
#[allow(clippy::too_many_arguments)]
pub fn convert_rows(
    src: &[u8],
    src_stride: usize,
    src_format: PixelFormat,
    dst: &mut [u8],
    dst_stride: usize,
    dst_format: PixelFormat,
    width: u32,
    height: u32,
) {
    let src_bpp = src_format.bytes_per_pixel();
    let dst_bpp = dst_format.bytes_per_pixel();
    let row_len = src_format.row_bytes(width);

    for y in 0..height as usize {
        let src_row = &src[y * src_stride..y * src_stride + row_len];
        let dst_row = &mut dst[y * dst_stride..y * dst_stride + dst_format.row_bytes(width)];
        if src_format == dst_format {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        for x in 0..width as usize {
            let rgb = src_format.unpack(src_row, x * src_bpp);
            dst_format.pack(dst_row, x * dst_bpp, rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_xrgb_to_rgb565() {
        let mut src = vec![0u8; 8];
        PixelFormat::Xrgb8888.pack(&mut src, 0, [255, 0, 0]);
        PixelFormat::Xrgb8888.pack(&mut src, 4, [0, 0, 255]);

        let mut dst = vec![0u8; 4];
        convert_rows(&src, 8, PixelFormat::Xrgb8888, &mut dst, 4, PixelFormat::Rgb565, 2, 1);

        assert_eq!(u16::from_ne_bytes([dst[0], dst[1]]), 0xf800);
        assert_eq!(u16::from_ne_bytes([dst[2], dst[3]]), 0x001f);
    }

    #[test]
    fn test_same_format_respects_strides() {
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0xaa; 10];
        // 2x2 RGB565 with source padding of 2 and destination padding of 1
        convert_rows(&src, 6, PixelFormat::Rgb565, &mut dst, 5, PixelFormat::Rgb565, 2, 2);
        assert_eq!(dst, vec![0, 1, 2, 3, 0xaa, 6, 7, 8, 9, 0xaa]);
    }

    #[test]
    fn test_rgb565_to_xrgb_expands() {
        let mut src = vec![0u8; 2];
        PixelFormat::Rgb565.pack(&mut src, 0, [255, 255, 255]);
        let mut dst = vec![0u8; 4];
        convert_rows(&src, 2, PixelFormat::Rgb565, &mut dst, 4, PixelFormat::Xrgb8888, 1, 1);
        assert_eq!(u32::from_ne_bytes([dst[0], dst[1], dst[2], dst[3]]), 0x00ff_ffff);
    }
}
