//! IPTC-IIM metadata embedding and readback for JPEG files.
//!
//! The pipeline records each refined caption inside the image itself, in
//! IPTC Record 2 (the Application Record):
//!
//! - ObjectName (2:05) — title
//! - Keywords (2:25) — repeatable; the pipeline writes exactly one, the title
//! - Caption-Abstract (2:120) — description
//!
//! For JPEG the IIM bytes live in an APP13 marker segment, wrapped in a
//! Photoshop "8BIM" image resource (id 0x0404). [`embed`] rebuilds the JPEG
//! byte stream with a fresh APP13 inserted after the leading APP0/APP1
//! segments; any pre-existing APP13 is dropped, so re-embedding replaces
//! rather than accumulates.
//!
//! ## Atomic replace
//!
//! The rewritten stream is written to a `.tmp` sibling first and renamed
//! over the target only once fully written. A failed embed abandons the
//! temporary file and leaves the target byte-identical — the saved image is
//! never corrupted by a metadata failure.
//!
//! [`read`] extracts the same three fields back out (best-effort, empty on
//! any parse failure); it backs the CLI `inspect` command.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a JPEG file: {0}")]
    NotJpeg(PathBuf),
    #[error("Corrupt JPEG segment structure in {0}")]
    CorruptJpeg(PathBuf),
    #[error("Metadata does not fit an APP13 segment ({0} bytes)")]
    FieldTooLong(usize),
}

/// Writing seam for metadata embedding.
///
/// The orchestrator goes through this trait so tests can substitute a
/// failing or recording writer; production uses [`IptcWriter`].
pub trait MetadataWriter {
    fn embed(&self, path: &Path, title: &str, description: &str) -> Result<(), EmbedError>;
}

/// Production writer: IPTC-IIM into the JPEG's APP13 segment.
pub struct IptcWriter;

impl MetadataWriter for IptcWriter {
    fn embed(&self, path: &Path, title: &str, description: &str) -> Result<(), EmbedError> {
        embed(path, title, description)
    }
}

/// IPTC metadata extracted from a JPEG file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcData {
    pub object_name: Option<String>,
    pub caption: Option<String>,
    pub keywords: Vec<String>,
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

const DATASET_RECORD_VERSION: u8 = 0;
const DATASET_OBJECT_NAME: u8 = 5;
const DATASET_KEYWORDS: u8 = 25;
const DATASET_CAPTION: u8 = 120;

const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_APP13: u8 = 0xED;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

/// Embed title, description, and a single keyword (= title) into the JPEG
/// at `path`, replacing any existing IPTC block.
pub fn embed(path: &Path, title: &str, description: &str) -> Result<(), EmbedError> {
    let data = fs::read(path)?;

    let iim = build_iim(title, description)?;
    let app13 = build_app13_segment(&iim)?;
    let rewritten = splice_app13(path, &data, &app13)?;

    // Write-then-rename: the target is replaced atomically or not at all.
    // A failed write abandons the temporary sibling.
    let tmp = tmp_sibling(path);
    fs::write(&tmp, &rewritten)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Temporary sibling path: `Red_Car.jpg` → `Red_Car.jpg.tmp`.
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serialize the three pipeline fields (plus the IIM record version) as
/// raw IPTC-IIM datasets.
fn build_iim(title: &str, description: &str) -> Result<Vec<u8>, EmbedError> {
    let mut iim = Vec::new();
    // Record version 4, required as the first dataset of Record 2
    push_dataset(&mut iim, DATASET_RECORD_VERSION, &[0x00, 0x04])?;
    push_dataset(&mut iim, DATASET_OBJECT_NAME, title.as_bytes())?;
    push_dataset(&mut iim, DATASET_KEYWORDS, title.as_bytes())?;
    push_dataset(&mut iim, DATASET_CAPTION, description.as_bytes())?;
    Ok(iim)
}

/// Append one Record 2 dataset: `0x1C, record, dataset, len (BE u16), data`.
fn push_dataset(iim: &mut Vec<u8>, dataset: u8, payload: &[u8]) -> Result<(), EmbedError> {
    let len = u16::try_from(payload.len()).map_err(|_| EmbedError::FieldTooLong(payload.len()))?;
    iim.push(0x1C);
    iim.push(0x02);
    iim.push(dataset);
    iim.extend_from_slice(&len.to_be_bytes());
    iim.extend_from_slice(payload);
    Ok(())
}

/// Wrap raw IIM bytes into a complete APP13 marker segment:
/// `FF ED, len, "Photoshop 3.0\0", "8BIM", 0x0404, empty name, size, IIM`.
fn build_app13_segment(iim: &[u8]) -> Result<Vec<u8>, EmbedError> {
    let mut payload = Vec::with_capacity(PHOTOSHOP_HEADER.len() + 12 + iim.len());
    payload.extend_from_slice(PHOTOSHOP_HEADER);
    payload.extend_from_slice(BIM_MARKER);
    payload.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00]); // empty Pascal name, padded to even
    payload.extend_from_slice(&(iim.len() as u32).to_be_bytes());
    payload.extend_from_slice(iim);
    if iim.len() % 2 == 1 {
        payload.push(0x00); // resource data padded to even
    }

    let seg_len = payload.len() + 2;
    let len = u16::try_from(seg_len).map_err(|_| EmbedError::FieldTooLong(seg_len))?;

    let mut segment = Vec::with_capacity(payload.len() + 4);
    segment.extend_from_slice(&[0xFF, MARKER_APP13]);
    segment.extend_from_slice(&len.to_be_bytes());
    segment.extend_from_slice(&payload);
    Ok(segment)
}

/// Rebuild the JPEG byte stream with `segment` as its sole APP13.
///
/// The new segment goes after the leading APP0/APP1 run (JFIF/EXIF stay
/// first, where other tooling expects them); every existing APP13 in the
/// header area is dropped. Entropy-coded data from SOS onward is copied
/// verbatim.
fn splice_app13(path: &Path, data: &[u8], segment: &[u8]) -> Result<Vec<u8>, EmbedError> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(EmbedError::NotJpeg(path.to_path_buf()));
    }

    let mut out = Vec::with_capacity(data.len() + segment.len());
    out.extend_from_slice(&data[..2]);

    let mut pos = 2;
    let mut inserted = false;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return Err(EmbedError::CorruptJpeg(path.to_path_buf()));
        }
        let marker = data[pos + 1];
        if marker == MARKER_SOS || marker == MARKER_EOI {
            break;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_end = pos + 2 + seg_len;
        if seg_len < 2 || seg_end > data.len() {
            return Err(EmbedError::CorruptJpeg(path.to_path_buf()));
        }

        let leading_app = marker == MARKER_APP0 || marker == MARKER_APP1;
        if !leading_app && !inserted {
            out.extend_from_slice(segment);
            inserted = true;
        }
        if marker != MARKER_APP13 {
            out.extend_from_slice(&data[pos..seg_end]);
        }
        pos = seg_end;
    }

    if !inserted {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(&data[pos..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Readback
// ---------------------------------------------------------------------------

/// Read IPTC metadata from a JPEG file. Returns empty data on any read or
/// parse failure; an unreadable file reports the same as an untagged one.
pub fn read(path: &Path) -> IptcData {
    let Ok(data) = fs::read(path) else {
        return IptcData::default();
    };
    find_iim(&data).map(parse_iim).unwrap_or_default()
}

/// Locate the raw IIM bytes: walk marker segments to APP13, then scan its
/// 8BIM resource blocks for id 0x0404.
fn find_iim(data: &[u8]) -> Option<&[u8]> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == MARKER_SOS || marker == MARKER_EOI {
            return None;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_end = pos + 2 + seg_len;
        if seg_len < 2 || seg_end > data.len() {
            return None;
        }
        if marker == MARKER_APP13 {
            if let Some(iim) = scan_8bim(&data[pos + 4..seg_end]) {
                return Some(iim);
            }
        }
        pos = seg_end;
    }
    None
}

/// Scan Photoshop 8BIM resource blocks for the IPTC resource (0x0404).
fn scan_8bim(segment: &[u8]) -> Option<&[u8]> {
    let body = segment.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(segment);

    let mut pos = 0;
    while pos + 12 <= body.len() {
        if &body[pos..pos + 4] != BIM_MARKER {
            return None;
        }
        let id = u16::from_be_bytes([body[pos + 4], body[pos + 5]]);
        // Pascal name: length byte + chars, padded to an even total
        let name_len = body[pos + 6] as usize;
        let mut cursor = pos + 6 + 1 + name_len + (1 + name_len) % 2;

        if cursor + 4 > body.len() {
            return None;
        }
        let res_len = u32::from_be_bytes([
            body[cursor],
            body[cursor + 1],
            body[cursor + 2],
            body[cursor + 3],
        ]) as usize;
        cursor += 4;
        if cursor + res_len > body.len() {
            return None;
        }

        if id == IPTC_RESOURCE_ID {
            return Some(&body[cursor..cursor + res_len]);
        }
        pos = cursor + res_len + res_len % 2;
    }
    None
}

/// Parse raw IIM bytes into the three fields the pipeline cares about.
fn parse_iim(iim: &[u8]) -> IptcData {
    let mut result = IptcData::default();
    let mut pos = 0;
    while pos + 5 <= iim.len() {
        if iim[pos] != 0x1C {
            break;
        }
        let record = iim[pos + 1];
        let dataset = iim[pos + 2];
        let len = u16::from_be_bytes([iim[pos + 3], iim[pos + 4]]) as usize;
        pos += 5;
        if pos + len > iim.len() {
            break;
        }
        if record == 2 {
            let value = String::from_utf8_lossy(&iim[pos..pos + len]).into_owned();
            match dataset {
                DATASET_OBJECT_NAME => result.object_name = Some(value),
                DATASET_KEYWORDS => result.keywords.push(value),
                DATASET_CAPTION => result.caption = Some(value),
                _ => {}
            }
        }
        pos += len;
    }
    result
}
