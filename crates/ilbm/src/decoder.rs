use crate::iff::{read_u16be, read_u8, ChunkTag, Form};
use crate::{LbmError, Result, BMHD_SIZE, CRNG_SIZE};
use serde::Serialize;

/// BODY compression mode from the BMHD header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compression {
    /// Uncompressed: BODY bytes are copied verbatim
    None,
    /// PackBits-style run-length encoding
    ByteRun1,
}

impl Compression {
    fn from_byte(value: u8) -> Self {
        match value {
            0 => Compression::None,
            1 => Compression::ByteRun1,
            other => {
                log::warn!("unknown BMHD compression mode {other}, decoding as uncompressed");
                Compression::None
            }
        }
    }
}

/// Transparency mode from the BMHD header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Masking {
    /// Fully opaque image
    None,
    /// An extra mask bitplane is interleaved with the color planes
    HasMask,
    /// One palette index is transparent
    HasTransparentColor,
    /// Lasso (outline) transparency; treated as opaque here
    Lasso,
}

impl Masking {
    fn from_byte(value: u8) -> Self {
        match value {
            0 => Masking::None,
            1 => Masking::HasMask,
            2 => Masking::HasTransparentColor,
            3 => Masking::Lasso,
            other => {
                log::warn!("unknown BMHD masking mode {other}, treating as opaque");
                Masking::None
            }
        }
    }
}

/// Parsed BMHD (bitmap header) chunk.
///
/// Immutable once parsed; all other decoding stages take their dimensions
/// and mode flags from here.
#[derive(Debug, Clone, Copy)]
pub struct BitmapHeader {
    /// Image width in pixels (nonzero)
    pub width: u32,
    /// Image height in pixels (nonzero)
    pub height: u32,
    /// Number of color bitplanes (palette index bit count)
    pub planes: u8,
    /// BODY compression mode
    pub compression: Compression,
    /// Transparency mode
    pub masking: Masking,
    /// Raw transparent-color field; meaningful only with
    /// [`Masking::HasTransparentColor`]
    pub transparent_color: u16,
}

impl BitmapHeader {
    /// The transparent palette index, if the masking mode declares one.
    pub fn transparent_color_index(&self) -> Option<u8> {
        (self.masking == Masking::HasTransparentColor).then_some(self.transparent_color as u8)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < BMHD_SIZE {
            return Err(LbmError::TruncatedChunk {
                tag: ChunkTag::BMHD,
            });
        }
        let width = read_u16be(data, 0) as u32;
        let height = read_u16be(data, 2) as u32;
        if width == 0 || height == 0 {
            return Err(LbmError::InvalidDimensions { width, height });
        }
        // Bytes 4..8 are the x/y origin, 11 is a pad byte, 14..20 aspect and
        // page size; none of them affect decoding.
        Ok(BitmapHeader {
            width,
            height,
            planes: read_u8(data, 8),
            masking: Masking::from_byte(read_u8(data, 9)),
            compression: Compression::from_byte(read_u8(data, 10)),
            transparent_color: read_u16be(data, 12),
        })
    }
}

/// RGB palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One CRNG color-cycling range. Pass-through animation metadata; nothing in
/// the decoding pipeline depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleRange {
    /// Cycle runs high-to-low
    pub reverse: bool,
    /// Cycle speed, 16384 = 60 steps/second
    pub rate: u16,
    /// Lowest palette index in the range
    pub low: u8,
    /// Highest palette index in the range
    pub high: u8,
}

impl CycleRange {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < CRNG_SIZE {
            return Err(LbmError::TruncatedChunk {
                tag: ChunkTag::CRNG,
            });
        }
        let flags = read_u16be(data, 4);
        // low/high are unsigned bytes; reading them as signed chars is a
        // long-standing bug in other IFF readers
        Ok(CycleRange {
            reverse: flags & 0x2 != 0,
            rate: read_u16be(data, 2),
            low: read_u8(data, 6),
            high: read_u8(data, 7),
        })
    }
}

/// A fully decoded LBM image: one palette index per pixel.
#[derive(Debug, Clone)]
pub struct LbmImage {
    /// Parsed BMHD header
    pub header: BitmapHeader,
    /// CMAP palette in file order; may be empty if the file has no CMAP
    pub palette: Vec<Rgb>,
    /// CRNG color-cycling metadata in file order
    pub cycles: Vec<CycleRange>,
    /// Palette indices, row-major, `width * height` entries once resolved
    pub pixels: Vec<u8>,
}

/// Decodes a complete LBM/ILBM file.
///
/// This is the main entry point for reading LBM graphics. It parses the IFF
/// `FORM` container, reads the BMHD/CMAP/CRNG chunks, decompresses the BODY
/// payload and, for mask-plane images, folds the interleaved bitplanes back
/// into one palette index per pixel.
///
/// # Errors
///
/// Returns an error if:
/// - The input is not an IFF `FORM` container, or a chunk is truncated
/// - The required BMHD or BODY chunk is missing
/// - A ByteRun1 run would read past the end of the BODY payload
///
/// An unknown compression byte is *not* an error: the BODY is copied raw and
/// a warning is logged.
///
/// # Example
///
/// ```no_run
/// use ilbm::lbm_decode;
///
/// let data = std::fs::read("BRUSH.LBM")?;
/// let image = lbm_decode(&data)?;
/// println!("{}x{}, {} planes", image.header.width, image.header.height, image.header.planes);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use = "this returns the decoded LbmImage"]
pub fn lbm_decode(data: &[u8]) -> Result<LbmImage> {
    let form = Form::parse(data)?;
    let header = BitmapHeader::parse(form.required_chunk(ChunkTag::BMHD)?.data)?;

    let palette = form
        .chunk(ChunkTag::CMAP)
        .map(|c| parse_cmap(c.data))
        .unwrap_or_default();

    let cycles = form
        .chunks(ChunkTag::CRNG)
        .map(|c| CycleRange::parse(c.data))
        .collect::<Result<Vec<_>>>()?;

    let body = form.required_chunk(ChunkTag::BODY)?;
    let mut pixels = match header.compression {
        Compression::ByteRun1 => byterun1_unpack(body.data)?,
        Compression::None => body.data.to_vec(),
    };

    // Without a mask plane the decompressed bytes already are the per-pixel
    // palette indices.
    if header.masking == Masking::HasMask {
        pixels = merge_mask_planes(
            &pixels,
            header.width as usize,
            header.height as usize,
            header.planes,
        );
    }

    Ok(LbmImage {
        header,
        palette,
        cycles,
        pixels,
    })
}

/// CMAP is a flat list of RGB triplets; a trailing partial triplet is ignored.
fn parse_cmap(data: &[u8]) -> Vec<Rgb> {
    data.chunks_exact(3)
        .map(|c| Rgb {
            r: c[0],
            g: c[1],
            b: c[2],
        })
        .collect()
}

/// Decompresses a ByteRun1 (PackBits variant) byte stream.
///
/// Control byte `v` as signed 8-bit:
/// - `0..=127`: copy the next `v + 1` literal bytes
/// - `-127..=-1`: repeat the next byte `-v + 1` times
/// - `-128`: no-op
///
/// # Errors
///
/// Returns [`LbmError::MalformedCompressedData`] if a literal or repeat run
/// would read past the end of `src`; short input is never silently truncated.
pub fn byterun1_unpack(src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(src.len() * 2);
    let mut offset = 0;
    while offset < src.len() {
        let control = src[offset] as i8;
        let control_offset = offset;
        offset += 1;
        match control {
            0..=127 => {
                let count = control as usize + 1;
                let end = offset + count;
                if end > src.len() {
                    return Err(LbmError::MalformedCompressedData {
                        offset: control_offset,
                    });
                }
                out.extend_from_slice(&src[offset..end]);
                offset = end;
            }
            -127..=-1 => {
                if offset >= src.len() {
                    return Err(LbmError::MalformedCompressedData {
                        offset: control_offset,
                    });
                }
                let value = src[offset];
                offset += 1;
                let count = (-(control as i32)) as usize + 1;
                out.resize(out.len() + count, value);
            }
            -128 => {} // official no-op filler byte
        }
    }
    Ok(out)
}

/// Reference ByteRun1 compressor. Greedy: runs of three or more identical
/// bytes become repeat records, everything else literal records. Exists for
/// round-trip testing; the conversion pipeline never compresses.
pub fn byterun1_pack(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < src.len() {
        // Measure the run of identical bytes starting here
        let mut run = 1;
        while run < 128 && i + run < src.len() && src[i + run] == src[i] {
            run += 1;
        }
        if run >= 3 {
            out.push((1 - run as i32) as u8);
            out.push(src[i]);
            i += run;
            continue;
        }
        // Literal record: extend until the next >=3 run or 128 bytes
        let start = i;
        i += run;
        while i < src.len() && i - start < 128 {
            let mut next = 1;
            while next < 3 && i + next < src.len() && src[i + next] == src[i] {
                next += 1;
            }
            if next >= 3 {
                break;
            }
            i += next;
        }
        let len = usize::min(i - start, 128);
        out.push((len - 1) as u8);
        out.extend_from_slice(&src[start..start + len]);
        i = start + len;
    }
    out
}

/// Folds interleaved bitplanes (color planes plus one mask plane) back into
/// one palette index per pixel.
///
/// Rows are stored as whole 16-bit words, so each plane row holds
/// `((width + 15) >> 4) << 1` bytes; bit 7 of each byte is the leftmost
/// pixel. Padding columns beyond `width` are decoded but discarded, and the
/// output is always exactly `width * height` bytes.
fn merge_mask_planes(data: &[u8], width: usize, height: usize, declared_planes: u8) -> Vec<u8> {
    // The mask occupies one extra plane beyond the declared color planes
    let planes = declared_planes as usize + 1;
    let row_bytes = ((width + 15) >> 4) << 1;
    let mut out = vec![0u8; width * height];

    for y in 0..height {
        for p in 0..planes {
            // Planes past bit 7 can't contribute to an 8-bit index
            let Some(plane_mask) = 1u8.checked_shl(p as u32) else {
                continue;
            };
            for i in 0..row_bytes {
                let offset = (y * planes + p) * row_bytes + i;
                let bits = data.get(offset).copied().unwrap_or(0);
                if bits == 0 {
                    continue;
                }
                for b in 0..8 {
                    if bits & (0x80 >> b) != 0 {
                        let x = i * 8 + b;
                        if x < width {
                            out[y * width + x] |= plane_mask;
                        }
                    }
                }
            }
        }
    }

    out
}

/// JSON-serializable description of a decoded image.
///
/// Field names and value shapes follow the original lbmtool JSON output:
/// `colors` is an array of `[r, g, b]` triplets, `cycles` an array of
/// `{reverse, rate, low, high}` objects, and `pixels` either the full
/// palette-index array or (in no-pixels mode) just its length.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub compression: Compression,
    pub masking: Masking,
    pub transparent_color: Option<u8>,
    pub colors: Vec<[u8; 3]>,
    pub cycles: Vec<CycleRange>,
    pub pixels: PixelData,
}

/// Pixel payload of an [`ImageReport`]: the index array, or its bare length.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PixelData {
    Full(Vec<u8>),
    Count(usize),
}

impl ImageReport {
    /// Builds a report for `image`. With `include_pixels` unset, `pixels`
    /// serializes as the pixel count instead of the full array.
    pub fn new(filename: impl Into<String>, image: &LbmImage, include_pixels: bool) -> Self {
        ImageReport {
            filename: filename.into(),
            width: image.header.width,
            height: image.header.height,
            compression: image.header.compression,
            masking: image.header.masking,
            transparent_color: image.header.transparent_color_index(),
            colors: image.palette.iter().map(|c| [c.r, c.g, c.b]).collect(),
            cycles: image.cycles.clone(),
            pixels: if include_pixels {
                PixelData::Full(image.pixels.clone())
            } else {
                PixelData::Count(image.pixels.len())
            },
        }
    }
}
