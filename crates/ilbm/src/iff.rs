//! Minimal IFF (Interchange File Format) container reader.
//!
//! IFF files are a `FORM` envelope around an ordered sequence of tagged
//! chunks: a 4-byte ASCII tag, a big-endian u32 payload length, then the
//! payload, padded to an even offset. This module tokenizes that envelope
//! and offers by-tag lookup; it knows nothing about what any chunk means.

use crate::{LbmError, Result};
use std::fmt;

/// A 4-character IFF chunk tag, e.g. `BMHD` or `BODY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    pub const FORM: ChunkTag = ChunkTag(*b"FORM");
    pub const BMHD: ChunkTag = ChunkTag(*b"BMHD");
    pub const CMAP: ChunkTag = ChunkTag(*b"CMAP");
    pub const CRNG: ChunkTag = ChunkTag(*b"CRNG");
    pub const BODY: ChunkTag = ChunkTag(*b"BODY");
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            // Tags are conventionally printable ASCII; escape anything else
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// One tokenized chunk: tag plus raw payload bytes, borrowed from the input.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub tag: ChunkTag,
    pub data: &'a [u8],
}

/// A parsed `FORM` container: the form type (e.g. `ILBM` or `PBM `) and its
/// sub-chunks in file order.
#[derive(Debug)]
pub struct Form<'a> {
    pub form_type: ChunkTag,
    chunks: Vec<Chunk<'a>>,
}

impl<'a> Form<'a> {
    /// Tokenizes an IFF `FORM` container.
    ///
    /// # Errors
    ///
    /// Returns [`LbmError::InvalidForm`] if the input doesn't start with a
    /// `FORM` header, and [`LbmError::TruncatedChunk`] if any chunk claims
    /// more payload than the input holds.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < 12 || bytes[0..4] != ChunkTag::FORM.0 {
            return Err(LbmError::InvalidForm);
        }
        let form_len = read_u32be(bytes, 4) as usize;
        let form_end = usize::min(8 + form_len, bytes.len());
        if form_len < 4 {
            return Err(LbmError::InvalidForm);
        }
        let form_type = ChunkTag([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let mut chunks = Vec::new();
        let mut offset = 12;
        while offset + 8 <= form_end {
            let tag = ChunkTag([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            let len = read_u32be(bytes, offset + 4) as usize;
            let start = offset + 8;
            let end = start
                .checked_add(len)
                .ok_or(LbmError::TruncatedChunk { tag })?;
            if end > form_end {
                return Err(LbmError::TruncatedChunk { tag });
            }
            chunks.push(Chunk {
                tag,
                data: &bytes[start..end],
            });
            // Chunks are padded to even offsets
            offset = end + (len & 1);
        }

        Ok(Form { form_type, chunks })
    }

    /// Returns the first chunk with the given tag, or `None`.
    pub fn chunk(&self, tag: ChunkTag) -> Option<&Chunk<'a>> {
        self.chunks.iter().find(|c| c.tag == tag)
    }

    /// Returns the first chunk with the given tag, or a `MissingChunk` error.
    pub fn required_chunk(&self, tag: ChunkTag) -> Result<&Chunk<'a>> {
        self.chunk(tag).ok_or(LbmError::MissingChunk { tag })
    }

    /// Returns all chunks with the given tag, in file order.
    pub fn chunks(&self, tag: ChunkTag) -> impl Iterator<Item = &Chunk<'a>> {
        self.chunks.iter().filter(move |c| c.tag == tag)
    }
}

#[inline]
pub(crate) fn read_u32be(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
pub(crate) fn read_u16be(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Reads one byte as an unsigned value.
///
/// CRNG palette positions have historically been misread as signed chars;
/// going through this helper keeps every index read explicitly unsigned.
#[inline]
pub(crate) fn read_u8(bytes: &[u8], offset: usize) -> u8 {
    bytes[offset]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(form_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&((body.len() as u32 + 4).to_be_bytes()));
        out.extend_from_slice(form_type);
        out.extend_from_slice(body);
        out
    }

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    #[test]
    fn test_parse_rejects_non_iff() {
        assert!(matches!(
            Form::parse(b"GIF89a not an iff file"),
            Err(LbmError::InvalidForm)
        ));
        assert!(matches!(Form::parse(b"FO"), Err(LbmError::InvalidForm)));
    }

    #[test]
    fn test_parse_chunk_sequence() {
        let mut body = chunk(b"ABCD", &[1, 2, 3, 4]);
        body.extend(chunk(b"WXYZ", &[9]));
        let data = form(b"ILBM", &body);

        let parsed = Form::parse(&data).unwrap();
        assert_eq!(parsed.form_type, ChunkTag(*b"ILBM"));
        assert_eq!(parsed.chunk(ChunkTag(*b"ABCD")).unwrap().data, &[1, 2, 3, 4]);
        assert_eq!(parsed.chunk(ChunkTag(*b"WXYZ")).unwrap().data, &[9]);
        assert!(parsed.chunk(ChunkTag(*b"NONE")).is_none());
    }

    #[test]
    fn test_odd_length_chunk_is_padded() {
        // The pad byte after the 1-byte payload must not shift the next tag
        let mut body = chunk(b"AAAA", &[7]);
        body.extend(chunk(b"BBBB", &[8, 9]));
        let data = form(b"ILBM", &body);

        let parsed = Form::parse(&data).unwrap();
        assert_eq!(parsed.chunk(ChunkTag(*b"BBBB")).unwrap().data, &[8, 9]);
    }

    #[test]
    fn test_repeated_tags_kept_in_order() {
        let mut body = chunk(b"CRNG", &[0; 8]);
        body.extend(chunk(b"CRNG", &[1; 8]));
        let data = form(b"ILBM", &body);

        let parsed = Form::parse(&data).unwrap();
        let crngs: Vec<_> = parsed.chunks(ChunkTag::CRNG).collect();
        assert_eq!(crngs.len(), 2);
        assert_eq!(crngs[0].data[0], 0);
        assert_eq!(crngs[1].data[0], 1);
    }

    #[test]
    fn test_truncated_chunk_is_fatal() {
        let mut data = form(b"ILBM", &chunk(b"GOOD", &[1, 2]));
        // Claim a 100-byte BODY that isn't there
        data.extend_from_slice(b"BODY");
        data.extend_from_slice(&100u32.to_be_bytes());
        data.push(0);
        let len = data.len() as u32 - 8;
        data[4..8].copy_from_slice(&len.to_be_bytes());

        assert!(matches!(
            Form::parse(&data),
            Err(LbmError::TruncatedChunk { tag }) if tag == ChunkTag::BODY
        ));
    }

    #[test]
    fn test_required_chunk_error_names_the_tag() {
        let data = form(b"ILBM", &[]);
        let parsed = Form::parse(&data).unwrap();
        let err = parsed.required_chunk(ChunkTag::BMHD).unwrap_err();
        assert_eq!(err.to_string(), "missing required BMHD chunk");
    }
}
