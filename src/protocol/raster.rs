//! # StarPRNT Raster Decoding
//!
//! CloudPRNT servers deliver print jobs in the `application/vnd.star.raster`
//! media type: a single raster graphics command (ESC GS S) carrying a
//! monochrome bitmap. This module turns that command back into pixels.
//!
//! ## Command Layout
//!
//! | Offset | Bytes | Meaning |
//! |--------|-------|---------|
//! | 0..4 | `1B 1D 53 01` | ESC GS S, m = 1 (monochrome) |
//! | 4..6 | xL xH | Width in bytes, little-endian |
//! | 6..8 | yL yH | Height in dots, little-endian |
//! | 8 | `00` | n = 0 (black) |
//! | 9.. | d1...dk | k = width_bytes × height bytes |
//!
//! ## Bit Packing
//!
//! Each data bit is one dot, most significant bit leftmost:
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0xAA = 10101010 = █░█░█░█░
//! ```
//!
//! A set bit is ink and decodes to opaque black; a clear bit decodes to
//! opaque white.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage, imageops};

use super::commands::{ESC, GS, read_u16_le, u16_le};
use crate::error::CloudPrntError;

/// Media type of a StarPRNT raster job.
pub const MEDIA_TYPE: &str = "application/vnd.star.raster";

/// Length of the ESC GS S header preceding pixel data.
pub const HEADER_LEN: usize = 9;

/// Bytes 0..4 of every monochrome raster command.
const MAGIC: [u8; 4] = [ESC, GS, b'S', 0x01];

/// Byte 8 of every monochrome raster command (n = black).
const COLOR_BLACK: u8 = 0x00;

const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A decoded raster job: RGBA pixels, four bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    image: RgbaImage,
}

impl DecodedImage {
    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major RGBA buffer, `width * height * 4` bytes long.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// RGBA value of a single pixel, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Rotate by 180°: pixel (x, y) moves to (w-1-x, h-1-y).
    ///
    /// Used for printers mounted upside down. Applying it twice yields the
    /// original image.
    pub fn rotate180(mut self) -> Self {
        imageops::rotate180_in_place(&mut self.image);
        self
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, CloudPrntError> {
        let mut png_bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|e| CloudPrntError::Image(format!("Failed to encode PNG: {}", e)))?;
        Ok(png_bytes)
    }
}

/// Decode a StarPRNT raster command into an RGBA image.
///
/// ## Errors
///
/// Returns [`CloudPrntError::MalformedRaster`] if:
/// - The buffer is shorter than the 9-byte header
/// - Bytes 0..4 are not `ESC GS S 1` or byte 8 is not `0`
/// - The buffer holds fewer than `width_bytes × height` data bytes
///
/// Bytes after the declared pixel data are ignored.
///
/// ## Example
///
/// ```
/// use cloudprnt_emulator::protocol::raster;
///
/// // 8 dots wide, 1 row, leftmost dot inked
/// let cmd = raster::encode(8, 1, &[0b1000_0000]);
/// let image = raster::decode(&cmd)?;
///
/// assert_eq!((image.width(), image.height()), (8, 1));
/// assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 255]));
/// assert_eq!(image.pixel(1, 0), Some([255, 255, 255, 255]));
/// assert_eq!(image.pixel(8, 0), None);
/// # Ok::<(), cloudprnt_emulator::CloudPrntError>(())
/// ```
pub fn decode(data: &[u8]) -> Result<DecodedImage, CloudPrntError> {
    if data.len() < HEADER_LEN {
        return Err(CloudPrntError::MalformedRaster(format!(
            "Header needs {} bytes, got {}",
            HEADER_LEN,
            data.len()
        )));
    }
    if data[0..4] != MAGIC || data[8] != COLOR_BLACK {
        return Err(CloudPrntError::MalformedRaster(format!(
            "Bad header magic {:02X?}",
            &data[..HEADER_LEN]
        )));
    }

    let width_bytes = read_u16_le(data[4], data[5]) as usize;
    let height = read_u16_le(data[6], data[7]) as usize;

    let expected_len = HEADER_LEN + width_bytes * height;
    if data.len() < expected_len {
        return Err(CloudPrntError::MalformedRaster(format!(
            "Truncated data. Expected {} bytes ({} bytes × {} rows + header), got {}",
            expected_len,
            width_bytes,
            height,
            data.len()
        )));
    }

    let bits = &data[HEADER_LEN..expected_len];
    let image = RgbaImage::from_fn((width_bytes * 8) as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let byte = bits[y * width_bytes + x / 8];
        if (byte >> (7 - (x % 8))) & 1 == 1 {
            INK
        } else {
            PAPER
        }
    });

    Ok(DecodedImage { image })
}

/// Build a raster command (ESC GS S m xL xH yL yH n d1...dk).
///
/// The inverse of [`decode`]: widths are rounded up to whole bytes.
///
/// ```
/// use cloudprnt_emulator::protocol::raster;
///
/// let cmd = raster::encode(576, 100, &vec![0xAA; 72 * 100]);
/// assert_eq!(&cmd[..9], &[0x1B, 0x1D, 0x53, 1, 72, 0, 100, 0, 0]);
/// ```
pub fn encode(width_dots: u16, height: u16, data: &[u8]) -> Vec<u8> {
    let width_bytes = width_dots.div_ceil(8);

    debug_assert!(
        data.len() == width_bytes as usize * height as usize,
        "Raster data length mismatch. Expected {} ({} bytes × {} rows), got {}",
        width_bytes as usize * height as usize,
        width_bytes,
        height,
        data.len()
    );

    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(HEADER_LEN + data.len());
    cmd.extend_from_slice(&MAGIC);
    cmd.push(xl);
    cmd.push(xh);
    cmd.push(yl);
    cmd.push(yh);
    cmd.push(COLOR_BLACK);
    cmd.extend_from_slice(data);
    cmd
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn header(width_bytes: u8, height: u8) -> Vec<u8> {
        vec![0x1b, 0x1d, 0x53, 0x01, width_bytes, 0x00, height, 0x00, 0x00]
    }

    #[test]
    fn test_dimensions_from_header() {
        let mut data = header(3, 5);
        data.extend(vec![0u8; 3 * 5]);

        let image = decode(&data).unwrap();
        assert_eq!(image.width(), 24);
        assert_eq!(image.height(), 5);
        assert_eq!(image.pixels().len(), 24 * 5 * 4);
    }

    #[test]
    fn test_first_pixel_follows_msb_of_first_data_byte() {
        for (first, black) in [(0x80u8, true), (0x7F, false), (0xFF, true), (0x00, false)] {
            let mut data = header(1, 1);
            data.push(first);

            let image = decode(&data).unwrap();
            let expected = if black { INK.0 } else { PAPER.0 };
            assert_eq!(image.pixel(0, 0).unwrap(), expected, "first byte {:#04x}", first);
        }
    }

    #[test]
    fn test_bit_order_within_row() {
        let mut data = header(2, 1);
        data.extend([0b1010_0000, 0b0000_0001]);

        let image = decode(&data).unwrap();
        let inked: Vec<u32> = (0..16).filter(|&x| image.pixel(x, 0).unwrap() == INK.0).collect();
        assert_eq!(inked, vec![0, 2, 15]);
    }

    #[test]
    fn test_pixel_outside_image() {
        let image = decode(&encode(8, 2, &[0xFF, 0x00])).unwrap();
        assert_eq!(image.pixel(7, 1), Some(PAPER.0));
        assert_eq!(image.pixel(8, 0), None);
        assert_eq!(image.pixel(0, 2), None);
    }

    #[test]
    fn test_rows_are_row_major() {
        let mut data = header(1, 3);
        data.extend([0x00, 0xFF, 0x00]);

        let image = decode(&data).unwrap();
        assert_eq!(image.pixel(4, 0).unwrap(), PAPER.0);
        assert_eq!(image.pixel(4, 1).unwrap(), INK.0);
        assert_eq!(image.pixel(4, 2).unwrap(), PAPER.0);
    }

    #[test]
    fn test_alpha_always_opaque() {
        let mut data = header(1, 2);
        data.extend([0x5A, 0xA5]);

        let image = decode(&data).unwrap();
        assert!(image.pixels().chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_bad_magic_rejected() {
        // Each of offsets 0, 1, 2, 3 and 8 is checked
        for offset in [0usize, 1, 2, 3, 8] {
            let mut data = header(1, 1);
            data.push(0xFF);
            data[offset] ^= 0x40;

            let err = decode(&data).unwrap_err();
            assert!(
                matches!(err, CloudPrntError::MalformedRaster(_)),
                "offset {} gave {:?}",
                offset,
                err
            );
        }
    }

    #[test]
    fn test_short_header_rejected() {
        for len in 0..HEADER_LEN {
            let data = header(1, 1)[..len].to_vec();
            assert!(matches!(
                decode(&data),
                Err(CloudPrntError::MalformedRaster(_))
            ));
        }
    }

    #[test]
    fn test_truncated_data_rejected_without_panic() {
        // Header claims 0xFFFF x 0xFFFF bytes, buffer holds 4
        let mut data = vec![0x1b, 0x1d, 0x53, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        data.extend([0xFF; 4]);

        assert!(matches!(
            decode(&data),
            Err(CloudPrntError::MalformedRaster(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = encode(8, 1, &[0xFF]);
        data.extend(u16_le(0xBEEF));

        let image = decode(&data).unwrap();
        assert_eq!((image.width(), image.height()), (8, 1));
    }

    #[test]
    fn test_rotate180_moves_pixels() {
        // Single inked dot at top-left of a 16x2 image
        let data = encode(16, 2, &[0x80, 0x00, 0x00, 0x00]);
        let image = decode(&data).unwrap().rotate180();

        assert_eq!((image.width(), image.height()), (16, 2));
        assert_eq!(image.pixel(15, 1).unwrap(), INK.0);
        assert_eq!(image.pixel(0, 0).unwrap(), PAPER.0);
    }

    #[test]
    fn test_rotate180_twice_is_identity() {
        let bits: Vec<u8> = (0..4 * 7).map(|i| (i * 37 % 256) as u8).collect();
        let image = decode(&encode(32, 7, &bits)).unwrap();

        let twice = image.clone().rotate180().rotate180();
        assert_eq!(twice.pixels(), image.pixels());
    }

    #[test]
    fn test_encode_header() {
        let data = vec![0xFF; 72 * 500];
        let cmd = encode(576, 500, &data);

        assert_eq!(&cmd[0..4], &[0x1B, 0x1D, 0x53, 0x01]);
        assert_eq!(cmd[4], 72);
        assert_eq!(cmd[5], 0);
        assert_eq!(cmd[6], 0xF4);
        assert_eq!(cmd[7], 0x01);
        assert_eq!(cmd[8], 0);
        assert_eq!(cmd.len(), HEADER_LEN + 72 * 500);
    }

    #[test]
    fn test_png_signature() {
        let image = decode(&encode(8, 1, &[0xF0])).unwrap();
        let png = image.to_png().unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
