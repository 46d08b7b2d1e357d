//! Binary tile container.
//!
//! All integers are little-endian `u32`. A blob is either
//!
//! - single: `MIPS width height payload_size format_id payload[payload_size]`
//! - multi: `MIPM file_count (offset size)*file_count`, where each directory
//!   entry points (relative to the start of this blob) to a nested single or
//!   multi blob.
//!
//! Parsing flattens nested containers into tiles in directory order.

use std::sync::Arc;

use super::error::ContainerError;

pub const SINGLE_MAGIC: [u8; 4] = *b"MIPS";
pub const MULTI_MAGIC: [u8; 4] = *b"MIPM";

const SINGLE_HEADER_LEN: usize = 20;
const MULTI_HEADER_LEN: usize = 8;
const DIRECTORY_ENTRY_LEN: usize = 8;
const MAX_NESTING: usize = 8;

/// Pixel encoding of a tile payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Raw RGBA, 4 bytes per pixel
    Rgba8,
    /// Raw luminance, 1 byte per pixel
    Luma8,
    /// PNG, JPEG or WebP stream
    Encoded,
}

impl PixelFormat {
    pub fn from_id(id: u32) -> Result<Self, ContainerError> {
        match id {
            0 => Ok(PixelFormat::Rgba8),
            1 => Ok(PixelFormat::Luma8),
            2 => Ok(PixelFormat::Encoded),
            other => Err(ContainerError::UnsupportedFormat(other)),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 0,
            PixelFormat::Luma8 => 1,
            PixelFormat::Encoded => 2,
        }
    }
}

/// One decoded-from-container tile of one page at one mip level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub format_id: u32,
    pub payload: Vec<u8>,
}

impl Tile {
    pub fn new(width: u32, height: u32, format: PixelFormat, payload: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format_id: format.id(),
            payload,
        }
    }

    pub fn pixel_format(&self) -> Result<PixelFormat, ContainerError> {
        PixelFormat::from_id(self.format_id)
    }

    /// Convert the payload to tightly packed RGBA8.
    pub fn to_rgba8(&self) -> Result<Vec<u8>, ContainerError> {
        let pixels = self.width as usize * self.height as usize;
        match self.pixel_format()? {
            PixelFormat::Rgba8 => {
                self.check_payload(pixels * 4)?;
                Ok(self.payload.clone())
            }
            PixelFormat::Luma8 => {
                self.check_payload(pixels)?;
                Ok(self
                    .payload
                    .iter()
                    .flat_map(|&l| [l, l, l, 255])
                    .collect())
            }
            PixelFormat::Encoded => {
                let image = image::load_from_memory(&self.payload)?.to_rgba8();
                if image.width() != self.width || image.height() != self.height {
                    return Err(ContainerError::DimensionMismatch {
                        width: self.width,
                        height: self.height,
                        found_width: image.width(),
                        found_height: image.height(),
                    });
                }
                Ok(image.into_raw())
            }
        }
    }

    /// The same tile with an encoded payload expanded to raw RGBA. Raw
    /// tiles are returned as they are.
    pub fn decoded(self: Arc<Self>) -> Result<Arc<Tile>, ContainerError> {
        if self.pixel_format()? != PixelFormat::Encoded {
            return Ok(self);
        }
        let rgba = self.to_rgba8()?;
        Ok(Arc::new(Tile::new(self.width, self.height, PixelFormat::Rgba8, rgba)))
    }

    fn check_payload(&self, expected: usize) -> Result<(), ContainerError> {
        if self.payload.len() != expected {
            return Err(ContainerError::PayloadSize {
                width: self.width,
                height: self.height,
                expected,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }
}

/// Parse a container into its tiles, in directory order.
pub fn parse_container(buf: &[u8]) -> Result<Vec<Arc<Tile>>, ContainerError> {
    let mut tiles = Vec::new();
    parse_blob(buf, 0, 0, &mut tiles)?;
    Ok(tiles)
}

fn parse_blob(
    blob: &[u8],
    base: usize,
    depth: usize,
    out: &mut Vec<Arc<Tile>>,
) -> Result<(), ContainerError> {
    if depth > MAX_NESTING {
        return Err(ContainerError::TooDeep(MAX_NESTING));
    }
    let magic = read_magic(blob, base)?;
    match magic {
        SINGLE_MAGIC => {
            out.push(Arc::new(parse_single(blob, base)?));
            Ok(())
        }
        MULTI_MAGIC => {
            let count = read_u32(blob, 4, base)? as usize;
            let directory_end = MULTI_HEADER_LEN
                .checked_add(count.saturating_mul(DIRECTORY_ENTRY_LEN))
                .unwrap_or(usize::MAX);
            ensure_len(blob, directory_end, base)?;
            for i in 0..count {
                let entry = MULTI_HEADER_LEN + i * DIRECTORY_ENTRY_LEN;
                let offset = read_u32(blob, entry, base)? as usize;
                let size = read_u32(blob, entry + 4, base)? as usize;
                let end = offset.saturating_add(size);
                ensure_len(blob, end, base)?;
                parse_blob(&blob[offset..end], base + offset, depth + 1, out)?;
            }
            Ok(())
        }
        other => Err(ContainerError::BadMagic {
            offset: base,
            magic: other,
        }),
    }
}

fn parse_single(blob: &[u8], base: usize) -> Result<Tile, ContainerError> {
    ensure_len(blob, SINGLE_HEADER_LEN, base)?;
    let width = read_u32(blob, 4, base)?;
    let height = read_u32(blob, 8, base)?;
    let payload_size = read_u32(blob, 12, base)? as usize;
    let format_id = read_u32(blob, 16, base)?;
    let end = SINGLE_HEADER_LEN.saturating_add(payload_size);
    ensure_len(blob, end, base)?;
    Ok(Tile {
        width,
        height,
        format_id,
        payload: blob[SINGLE_HEADER_LEN..end].to_vec(),
    })
}

fn ensure_len(blob: &[u8], needed: usize, base: usize) -> Result<(), ContainerError> {
    if blob.len() < needed {
        return Err(ContainerError::Truncated {
            offset: base,
            needed,
            available: blob.len(),
        });
    }
    Ok(())
}

fn read_magic(blob: &[u8], base: usize) -> Result<[u8; 4], ContainerError> {
    ensure_len(blob, 4, base)?;
    Ok([blob[0], blob[1], blob[2], blob[3]])
}

fn read_u32(blob: &[u8], at: usize, base: usize) -> Result<u32, ContainerError> {
    ensure_len(blob, at + 4, base)?;
    Ok(u32::from_le_bytes([
        blob[at],
        blob[at + 1],
        blob[at + 2],
        blob[at + 3],
    ]))
}

/// Re-encode a container with every encoded payload expanded to RGBA, so
/// whoever parses it next never has to run an image decoder.
pub fn decode_container(buf: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let tiles = parse_container(buf)?;
    if tiles
        .iter()
        .all(|tile| tile.format_id != PixelFormat::Encoded.id())
    {
        return Ok(buf.to_vec());
    }
    let blobs = tiles
        .into_iter()
        .map(|tile| tile.decoded().map(|tile| encode_single(&tile)))
        .collect::<Result<Vec<_>, _>>()?;
    match blobs.as_slice() {
        [single] => Ok(single.clone()),
        _ => Ok(encode_multi(&blobs)),
    }
}

/// Encode one tile as a single blob.
pub fn encode_single(tile: &Tile) -> Vec<u8> {
    let mut out = Vec::with_capacity(SINGLE_HEADER_LEN + tile.payload.len());
    out.extend_from_slice(&SINGLE_MAGIC);
    out.extend_from_slice(&tile.width.to_le_bytes());
    out.extend_from_slice(&tile.height.to_le_bytes());
    out.extend_from_slice(&(tile.payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&tile.format_id.to_le_bytes());
    out.extend_from_slice(&tile.payload);
    out
}

/// Wrap already-encoded blobs (single or multi) in a multi blob.
pub fn encode_multi(blobs: &[Vec<u8>]) -> Vec<u8> {
    let directory_len = MULTI_HEADER_LEN + blobs.len() * DIRECTORY_ENTRY_LEN;
    let mut out = Vec::with_capacity(directory_len + blobs.iter().map(Vec::len).sum::<usize>());
    out.extend_from_slice(&MULTI_MAGIC);
    out.extend_from_slice(&(blobs.len() as u32).to_le_bytes());
    let mut offset = directory_len;
    for blob in blobs {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        out.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        offset += blob.len();
    }
    for blob in blobs {
        out.extend_from_slice(blob);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_tile(width: u32, height: u32, value: u8) -> Tile {
        Tile::new(
            width,
            height,
            PixelFormat::Luma8,
            vec![value; (width * height) as usize],
        )
    }

    #[test]
    fn test_single_roundtrip_preserves_metadata_and_payload() {
        let tile = Tile::new(3, 2, PixelFormat::Rgba8, (0..24).collect());
        let tiles = parse_container(&encode_single(&tile)).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(*tiles[0], tile);
    }

    #[test]
    fn test_multi_yields_tiles_in_directory_order() {
        let blobs: Vec<Vec<u8>> = (0..4).map(|i| encode_single(&gray_tile(2, 2, i))).collect();
        let tiles = parse_container(&encode_multi(&blobs)).unwrap();
        assert_eq!(tiles.len(), 4);
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.payload[0], i as u8);
        }
    }

    #[test]
    fn test_nested_multi_is_flattened() {
        let inner = encode_multi(&[
            encode_single(&gray_tile(1, 1, 1)),
            encode_single(&gray_tile(1, 1, 2)),
        ]);
        let outer = encode_multi(&[encode_single(&gray_tile(1, 1, 0)), inner]);
        let values: Vec<u8> = parse_container(&outer)
            .unwrap()
            .iter()
            .map(|t| t.payload[0])
            .collect();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[test]
    fn test_unknown_magic_is_rejected() {
        let mut blob = encode_single(&gray_tile(1, 1, 0));
        blob[0] = b'X';
        assert!(matches!(
            parse_container(&blob),
            Err(ContainerError::BadMagic { offset: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let blob = encode_single(&gray_tile(4, 4, 0));
        let result = parse_container(&blob[..blob.len() - 1]);
        assert!(matches!(result, Err(ContainerError::Truncated { .. })));
    }

    #[test]
    fn test_truncated_nested_entry_is_rejected() {
        let mut blob = encode_multi(&[encode_single(&gray_tile(2, 2, 0))]);
        // Claim an entry size past the end of the buffer.
        blob[12..16].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            parse_container(&blob),
            Err(ContainerError::Truncated { .. })
        ));
    }

    #[test]
    fn test_empty_buffer_is_truncated() {
        assert!(matches!(
            parse_container(&[]),
            Err(ContainerError::Truncated { .. })
        ));
    }

    fn png_tile(width: u32, height: u32) -> (Tile, Vec<u8>) {
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8 * 40, y as u8 * 40, 7, 255])
        });
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        (
            Tile::new(width, height, PixelFormat::Encoded, png),
            image.into_raw(),
        )
    }

    #[test]
    fn test_encoded_png_decodes_to_rgba() {
        let (tile, expected) = png_tile(3, 2);
        assert_eq!(tile.to_rgba8().unwrap(), expected);

        let decoded = Arc::new(tile).decoded().unwrap();
        assert_eq!(decoded.pixel_format().unwrap(), PixelFormat::Rgba8);
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.payload, expected);
    }

    #[test]
    fn test_encoded_dimension_mismatch_is_rejected() {
        let (mut tile, _) = png_tile(3, 2);
        tile.width = 4;
        assert!(matches!(
            tile.to_rgba8(),
            Err(ContainerError::DimensionMismatch {
                found_width: 3,
                found_height: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_container_expands_encoded_tiles() {
        let (encoded, expected) = png_tile(2, 2);
        let blob = encode_multi(&[
            encode_single(&gray_tile(1, 1, 9)),
            encode_single(&encoded),
        ]);
        let tiles = parse_container(&decode_container(&blob).unwrap()).unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(*tiles[0], gray_tile(1, 1, 9));
        assert_eq!(tiles[1].pixel_format().unwrap(), PixelFormat::Rgba8);
        assert_eq!(tiles[1].payload, expected);

        let single = encode_single(&encoded);
        let tiles = parse_container(&decode_container(&single).unwrap()).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].payload, expected);
    }

    #[test]
    fn test_decode_container_keeps_raw_blob() {
        let blob = encode_single(&gray_tile(2, 2, 3));
        assert_eq!(decode_container(&blob).unwrap(), blob);
    }

    #[test]
    fn test_luma_expands_to_rgba() {
        let rgba = gray_tile(2, 1, 7).to_rgba8().unwrap();
        assert_eq!(rgba, vec![7, 7, 7, 255, 7, 7, 7, 255]);
    }

    #[test]
    fn test_payload_size_mismatch_fails_decode() {
        let tile = Tile::new(2, 2, PixelFormat::Rgba8, vec![0; 3]);
        assert!(matches!(
            tile.to_rgba8(),
            Err(ContainerError::PayloadSize { expected: 16, .. })
        ));
    }

    #[test]
    fn test_unknown_format_fails_decode_not_parse() {
        let tile = Tile {
            width: 1,
            height: 1,
            format_id: 99,
            payload: vec![0],
        };
        let parsed = parse_container(&encode_single(&tile)).unwrap();
        assert!(matches!(
            parsed[0].to_rgba8(),
            Err(ContainerError::UnsupportedFormat(99))
        ));
    }
}
