//! Minimal indexed-color PNG writer.
//!
//! Emits exactly the chunks an 8-bit paletted image needs, in order:
//! signature, IHDR, PLTE, optional tRNS, one IDAT, IEND. Scanlines carry
//! filter byte 0 and are deflated in a single zlib stream.

use crate::{LbmError, LbmImage, Result};
use crc32fast::Hasher;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Encodes a decoded LBM image as a complete PNG byte stream.
///
/// The output is an 8-bit indexed-color PNG (color type 3). A tRNS chunk is
/// emitted only when the image's masking mode declares a transparent palette
/// index; its alpha table is 255 everywhere except 0 at that index.
///
/// # Errors
///
/// Returns an error if:
/// - The image has no palette ([`LbmError::EmptyPalette`]) — a paletted PNG
///   cannot be produced from a file without a CMAP
/// - The pixel buffer length doesn't equal `width * height`
///   ([`LbmError::BufferSizeMismatch`])
///
/// # Example
///
/// ```no_run
/// use ilbm::{lbm_decode, png_encode};
///
/// let image = lbm_decode(&std::fs::read("BRUSH.LBM")?)?;
/// std::fs::write("brush.png", png_encode(&image)?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use = "this returns the encoded PNG bytes"]
pub fn png_encode(image: &LbmImage) -> Result<Vec<u8>> {
    let width = image.header.width;
    let height = image.header.height;
    if width == 0 || height == 0 {
        return Err(LbmError::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize;
    if image.pixels.len() != expected {
        return Err(LbmError::BufferSizeMismatch {
            expected,
            actual: image.pixels.len(),
        });
    }
    if image.palette.is_empty() {
        return Err(LbmError::EmptyPalette);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);

    // IHDR: bit depth 8, color type 3 (indexed), deflate, filter method 0,
    // no interlace
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
    write_chunk(&mut out, b"IHDR", &ihdr);

    let mut plte = Vec::with_capacity(image.palette.len() * 3);
    for c in &image.palette {
        plte.extend_from_slice(&[c.r, c.g, c.b]);
    }
    write_chunk(&mut out, b"PLTE", &plte);

    if let Some(transparent) = image.header.transparent_color_index() {
        let mut alpha = vec![255u8; image.palette.len()];
        if let Some(entry) = alpha.get_mut(transparent as usize) {
            *entry = 0;
        }
        write_chunk(&mut out, b"tRNS", &alpha);
    }

    // One filter byte (0 = None) in front of each row of raw indices;
    // per-row filtering buys nothing for paletted data
    let row = width as usize;
    let mut scanlines = Vec::with_capacity((row + 1) * height as usize);
    for pixels in image.pixels.chunks_exact(row) {
        scanlines.push(0);
        scanlines.extend_from_slice(pixels);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&scanlines)?;
    let idat = encoder.finish()?;
    write_chunk(&mut out, b"IDAT", &idat);

    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

/// One on-wire PNG chunk: BE u32 payload length, 4-byte type, payload,
/// BE CRC32 over type + payload.
fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(payload);

    let mut crc = Hasher::new();
    crc.update(chunk_type);
    crc.update(payload);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BitmapHeader, Compression as LbmCompression, Masking, Rgb};
    use pretty_assertions::assert_eq;

    fn test_image(masking: Masking, transparent_color: u16) -> LbmImage {
        LbmImage {
            header: BitmapHeader {
                width: 2,
                height: 2,
                planes: 1,
                compression: LbmCompression::None,
                masking,
                transparent_color,
            },
            palette: vec![
                Rgb { r: 0, g: 0, b: 0 },
                Rgb {
                    r: 255,
                    g: 255,
                    b: 255,
                },
            ],
            cycles: vec![],
            pixels: vec![0, 1, 1, 0],
        }
    }

    /// Walks the chunk stream, checking every CRC, and returns the chunk
    /// types in order.
    fn chunk_census(png: &[u8]) -> Vec<[u8; 4]> {
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        let mut types = Vec::new();
        let mut offset = 8;
        while offset < png.len() {
            let len = u32::from_be_bytes(png[offset..offset + 4].try_into().unwrap()) as usize;
            let chunk_type: [u8; 4] = png[offset + 4..offset + 8].try_into().unwrap();
            let payload = &png[offset + 8..offset + 8 + len];

            let mut crc = Hasher::new();
            crc.update(&chunk_type);
            crc.update(payload);
            let stored = u32::from_be_bytes(
                png[offset + 8 + len..offset + 12 + len].try_into().unwrap(),
            );
            assert_eq!(crc.finalize(), stored, "bad CRC in {chunk_type:?}");

            types.push(chunk_type);
            offset += 12 + len;
        }
        types
    }

    #[test]
    fn test_chunk_order_and_crcs() {
        let png = png_encode(&test_image(Masking::None, 0)).unwrap();
        let types = chunk_census(&png);
        assert_eq!(types, vec![*b"IHDR", *b"PLTE", *b"IDAT", *b"IEND"]);
    }

    #[test]
    fn test_trns_only_for_transparent_color_masking() {
        let opaque = png_encode(&test_image(Masking::None, 1)).unwrap();
        assert_eq!(
            chunk_census(&opaque),
            vec![*b"IHDR", *b"PLTE", *b"IDAT", *b"IEND"]
        );

        let transparent = png_encode(&test_image(Masking::HasTransparentColor, 1)).unwrap();
        assert_eq!(
            chunk_census(&transparent),
            vec![*b"IHDR", *b"PLTE", *b"tRNS", *b"IDAT", *b"IEND"]
        );
    }

    #[test]
    fn test_trns_alpha_table() {
        let png = png_encode(&test_image(Masking::HasTransparentColor, 1)).unwrap();
        // tRNS directly follows IHDR(13) and PLTE(6)
        let trns_start = 8 + 25 + 18;
        assert_eq!(&png[trns_start + 4..trns_start + 8], b"tRNS");
        assert_eq!(&png[trns_start + 8..trns_start + 10], &[255, 0]);
    }

    #[test]
    fn test_ihdr_fields() {
        let png = png_encode(&test_image(Masking::None, 0)).unwrap();
        let ihdr = &png[16..29];
        assert_eq!(&ihdr[0..4], &2u32.to_be_bytes());
        assert_eq!(&ihdr[4..8], &2u32.to_be_bytes());
        // depth 8, indexed, deflate, filter 0, no interlace
        assert_eq!(&ihdr[8..13], &[8, 3, 0, 0, 0]);
    }

    #[test]
    fn test_empty_palette_is_an_error() {
        let mut image = test_image(Masking::None, 0);
        image.palette.clear();
        assert!(matches!(png_encode(&image), Err(LbmError::EmptyPalette)));
    }

    #[test]
    fn test_pixel_count_must_match_dimensions() {
        let mut image = test_image(Masking::None, 0);
        image.pixels.pop();
        assert!(matches!(
            png_encode(&image),
            Err(LbmError::BufferSizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_round_trips_through_png_decoder() {
        let png = png_encode(&test_image(Masking::None, 0)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(decoded.get_pixel(0, 1).0, [255, 255, 255]);
        assert_eq!(decoded.get_pixel(1, 1).0, [0, 0, 0]);
    }
}
