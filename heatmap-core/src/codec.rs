//! Pyramid persistence: JSON documents and a compact binary format
//!
//! Binary layout (little-endian):
//!
//! ```text
//! magic "HMPY" | version u16 | level_resolution u8 | min_map_zoom u8
//! max_map_zoom u8 | reserved u8 | payload_len u32 | compressed_len u32
//! checksum u64 (xxh64 of the uncompressed payload)
//! zstd( pre-order nodes: count u64, x i32, y i32, zoom u8, child_count u8 )
//! ```

use crate::builder::HeatmapOptions;
use crate::error::{HeatmapError, HeatmapResult};
use crate::pyramid::{PyramidNode, SpatialPyramid};
use crate::tile::TileCoordinate;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

const PYRAMID_MAGIC: &[u8; 4] = b"HMPY";
const PYRAMID_VERSION: u16 = 1;
const COMPRESSION_LEVEL: i32 = 3;
const HEADER_LEN: usize = 4 + 2 + 4 + 4 + 4 + 8;
const NODE_LEN: usize = 8 + 4 + 4 + 1 + 1;

/// On-disk encoding of a pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidFormat {
    Json,
    Binary,
}

impl PyramidFormat {
    /// `.json` files are JSON, everything else is binary
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => PyramidFormat::Json,
            _ => PyramidFormat::Binary,
        }
    }
}

/// Serialized JSON form: the build options plus the node tree
#[derive(Debug, Serialize, Deserialize)]
pub struct PyramidDocument {
    pub options: HeatmapOptions,
    pub root: PyramidNode,
}

pub fn encode_json(pyramid: &SpatialPyramid) -> HeatmapResult<String> {
    let document = PyramidDocument {
        options: *pyramid.options(),
        root: pyramid.root().clone(),
    };
    Ok(serde_json::to_string(&document)?)
}

pub fn decode_json(text: &str) -> HeatmapResult<SpatialPyramid> {
    let document: PyramidDocument = serde_json::from_str(text)?;
    SpatialPyramid::from_root(document.root, document.options)
}

struct Header {
    options: HeatmapOptions,
    payload_len: u32,
    compressed_len: u32,
    checksum: u64,
}

impl Header {
    fn write<W: Write>(&self, writer: &mut W) -> HeatmapResult<()> {
        writer.write_all(PYRAMID_MAGIC)?;
        writer.write_u16::<LittleEndian>(PYRAMID_VERSION)?;
        writer.write_u8(self.options.level_resolution)?;
        writer.write_u8(self.options.min_map_zoom)?;
        writer.write_u8(self.options.max_map_zoom)?;
        writer.write_u8(0)?;
        writer.write_u32::<LittleEndian>(self.payload_len)?;
        writer.write_u32::<LittleEndian>(self.compressed_len)?;
        writer.write_u64::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    fn read<R: Read>(reader: &mut R) -> HeatmapResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != PYRAMID_MAGIC {
            return Err(HeatmapError::InvalidMagic);
        }

        let version = reader.read_u16::<LittleEndian>()?;
        if version != PYRAMID_VERSION {
            return Err(HeatmapError::UnsupportedVersion(version));
        }

        let level_resolution = reader.read_u8()?;
        let min_map_zoom = reader.read_u8()?;
        let max_map_zoom = reader.read_u8()?;
        let _reserved = reader.read_u8()?;
        let options = HeatmapOptions::new(level_resolution, min_map_zoom, max_map_zoom)?;

        Ok(Self {
            options,
            payload_len: reader.read_u32::<LittleEndian>()?,
            compressed_len: reader.read_u32::<LittleEndian>()?,
            checksum: reader.read_u64::<LittleEndian>()?,
        })
    }
}

pub fn encode_binary(pyramid: &SpatialPyramid) -> HeatmapResult<Vec<u8>> {
    let mut payload = Vec::with_capacity(pyramid.node_count() * NODE_LEN);
    write_node(&mut payload, pyramid.root())?;
    let compressed = zstd::encode_all(payload.as_slice(), COMPRESSION_LEVEL)?;

    let header = Header {
        options: *pyramid.options(),
        payload_len: length_u32(payload.len())?,
        compressed_len: length_u32(compressed.len())?,
        checksum: xxhash_rust::xxh64::xxh64(&payload, 0),
    };

    let mut output = Vec::with_capacity(HEADER_LEN + compressed.len());
    header.write(&mut output)?;
    output.extend_from_slice(&compressed);

    debug!(
        "Encoded pyramid: {} nodes, {} bytes payload, {} bytes compressed",
        pyramid.node_count(),
        payload.len(),
        compressed.len()
    );
    Ok(output)
}

pub fn decode_binary(data: &[u8]) -> HeatmapResult<SpatialPyramid> {
    if data.len() < HEADER_LEN {
        return Err(HeatmapError::Corruption(format!(
            "pyramid data too short: {} bytes",
            data.len()
        )));
    }

    let mut cursor = Cursor::new(data);
    let header = Header::read(&mut cursor)?;

    let compressed = &data[HEADER_LEN..];
    if compressed.len() != header.compressed_len as usize {
        return Err(HeatmapError::Corruption(format!(
            "expected {} compressed bytes, found {}",
            header.compressed_len,
            compressed.len()
        )));
    }

    // The declared length caps the decompression buffer
    let payload = zstd::bulk::decompress(compressed, header.payload_len as usize)?;
    if payload.len() != header.payload_len as usize {
        return Err(HeatmapError::Corruption(format!(
            "expected {} payload bytes, found {}",
            header.payload_len,
            payload.len()
        )));
    }
    if xxhash_rust::xxh64::xxh64(&payload, 0) != header.checksum {
        return Err(HeatmapError::Corruption("checksum mismatch".to_string()));
    }

    let mut reader = Cursor::new(payload.as_slice());
    let root = read_node(&mut reader, None)?;
    if reader.position() as usize != payload.len() {
        return Err(HeatmapError::Corruption(format!(
            "{} trailing payload bytes",
            payload.len() - reader.position() as usize
        )));
    }

    SpatialPyramid::from_root(root, header.options)
}

fn length_u32(len: usize) -> HeatmapResult<u32> {
    u32::try_from(len)
        .map_err(|_| HeatmapError::InvalidPyramid(format!("encoded size {} exceeds 4 GiB", len)))
}

fn write_node<W: Write>(writer: &mut W, node: &PyramidNode) -> HeatmapResult<()> {
    writer.write_u64::<LittleEndian>(node.count)?;
    writer.write_i32::<LittleEndian>(node.tile.x as i32)?;
    writer.write_i32::<LittleEndian>(node.tile.y as i32)?;
    writer.write_u8(node.tile.zoom)?;
    writer.write_u8(node.children.len() as u8)?;
    for child in &node.children {
        write_node(writer, child)?;
    }
    Ok(())
}

fn read_node<R: Read>(reader: &mut R, parent: Option<TileCoordinate>) -> HeatmapResult<PyramidNode> {
    let count = reader.read_u64::<LittleEndian>()?;
    let x = reader.read_i32::<LittleEndian>()?;
    let y = reader.read_i32::<LittleEndian>()?;
    let zoom = reader.read_u8()?;
    let child_count = reader.read_u8()?;

    if x < 0 || y < 0 {
        return Err(HeatmapError::Corruption(format!(
            "negative tile index {}/{} at zoom {}",
            x, y, zoom
        )));
    }
    let tile = TileCoordinate::new(x as u32, y as u32, zoom)?;

    // Zoom must grow by one per level, which also bounds the recursion depth
    if let Some(parent) = parent {
        if tile.parent() != Some(parent) {
            return Err(HeatmapError::Corruption(format!(
                "node {} stored under {}",
                tile, parent
            )));
        }
    }
    if child_count > 4 {
        return Err(HeatmapError::Corruption(format!(
            "node {} claims {} children",
            tile, child_count
        )));
    }

    let mut children = Vec::with_capacity(child_count as usize);
    for _ in 0..child_count {
        children.push(read_node(reader, Some(tile))?);
    }

    Ok(PyramidNode {
        count,
        tile,
        children,
    })
}

/// Write a pyramid, choosing the encoding from the file extension
pub fn write_to_file<P: AsRef<Path>>(pyramid: &SpatialPyramid, path: P) -> HeatmapResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    match PyramidFormat::from_path(path) {
        PyramidFormat::Json => {
            let document = PyramidDocument {
                options: *pyramid.options(),
                root: pyramid.root().clone(),
            };
            serde_json::to_writer(&mut writer, &document)?;
        }
        PyramidFormat::Binary => writer.write_all(&encode_binary(pyramid)?)?,
    }
    writer.flush()?;
    Ok(())
}

pub fn read_from_file<P: AsRef<Path>>(path: P) -> HeatmapResult<SpatialPyramid> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    match PyramidFormat::from_path(path) {
        PyramidFormat::Json => {
            let document: PyramidDocument = serde_json::from_reader(reader)?;
            SpatialPyramid::from_root(document.root, document.options)
        }
        PyramidFormat::Binary => {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            decode_binary(&data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PyramidBuilder;
    use crate::tile::LatLong;

    fn sample() -> SpatialPyramid {
        let mut builder = PyramidBuilder::new(HeatmapOptions::new(2, 0, 5).unwrap()).unwrap();
        builder.feed_all((0..40).map(|i| LatLong::new(50.0 - i as f64, -10.0 + i as f64 * 2.5)));
        builder.feed_all(std::iter::repeat(LatLong::new(-33.9, 151.2)).take(7));
        builder.build().unwrap()
    }

    #[test]
    fn test_json_uses_expected_field_names() {
        let json = encode_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let root = &value["root"];
        assert!(root["count"].is_u64());
        assert!(root["tile"]["x"].is_u64());
        assert!(root["tile"]["zoom"].is_u64());
        assert!(root["children"].is_array());
        assert_eq!(value["options"]["level_resolution"], 2);
    }

    #[test]
    fn test_json_round_trip() {
        let pyramid = sample();
        let decoded = decode_json(&encode_json(&pyramid).unwrap()).unwrap();
        assert_eq!(decoded, pyramid);
    }

    #[test]
    fn test_json_leaf_without_children_field() {
        let text = r#"{"options":{"level_resolution":1,"min_map_zoom":0,"max_map_zoom":0},
            "root":{"count":2,"tile":{"x":0,"y":0,"zoom":0},
                    "children":[{"count":2,"tile":{"x":1,"y":1,"zoom":1}}]}}"#;
        let pyramid = decode_json(text).unwrap();
        assert_eq!(pyramid.total_count(), 2);
        assert!(pyramid.root().children[0].is_leaf());
    }

    #[test]
    fn test_binary_round_trip() {
        let pyramid = sample();
        let bytes = encode_binary(&pyramid).unwrap();
        assert_eq!(&bytes[..4], b"HMPY");
        let decoded = decode_binary(&bytes).unwrap();
        assert_eq!(decoded, pyramid);
    }

    #[test]
    fn test_binary_rejects_bad_magic() {
        let mut bytes = encode_binary(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode_binary(&bytes), Err(HeatmapError::InvalidMagic)));
    }

    #[test]
    fn test_binary_rejects_unknown_version() {
        let mut bytes = encode_binary(&sample()).unwrap();
        bytes[4] = 9;
        assert!(matches!(
            decode_binary(&bytes),
            Err(HeatmapError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_binary_rejects_truncation_and_checksum() {
        let bytes = encode_binary(&sample()).unwrap();
        assert!(decode_binary(&bytes[..10]).is_err());
        assert!(decode_binary(&bytes[..bytes.len() - 1]).is_err());

        let mut tampered = bytes.clone();
        let checksum_at = HEADER_LEN - 8;
        tampered[checksum_at] ^= 0xFF;
        assert!(matches!(
            decode_binary(&tampered),
            Err(HeatmapError::Corruption(_))
        ));
    }

    #[test]
    fn test_binary_payload_larger_than_declared_is_rejected() {
        let bytes = encode_binary(&sample()).unwrap();
        let mut shrunk = bytes.clone();
        shrunk[10..14].copy_from_slice(&4u32.to_le_bytes());
        assert!(decode_binary(&shrunk).is_err());

        // A few hundred compressed bytes that would expand to 64 MiB
        let bomb = zstd::encode_all(vec![0u8; 64 << 20].as_slice(), COMPRESSION_LEVEL).unwrap();
        let header = Header {
            options: HeatmapOptions::new(2, 0, 5).unwrap(),
            payload_len: NODE_LEN as u32,
            compressed_len: bomb.len() as u32,
            checksum: 0,
        };
        let mut crafted = Vec::new();
        header.write(&mut crafted).unwrap();
        crafted.extend_from_slice(&bomb);
        assert!(matches!(decode_binary(&crafted), Err(HeatmapError::Io(_))));
    }

    #[test]
    fn test_file_round_trip_both_formats() {
        let pyramid = sample();
        let dir = tempfile::tempdir().unwrap();

        for name in ["pyramid.json", "pyramid.hmpy"] {
            let path = dir.path().join(name);
            write_to_file(&pyramid, &path).unwrap();
            let loaded = read_from_file(&path).unwrap();
            assert_eq!(loaded, pyramid);
        }

        assert_eq!(PyramidFormat::from_path(Path::new("a.JSON")), PyramidFormat::Json);
        assert_eq!(PyramidFormat::from_path(Path::new("a.bin")), PyramidFormat::Binary);
    }
}
