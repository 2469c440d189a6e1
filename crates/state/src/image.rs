//! On-disk images of a live/archive snapshot pair.
//!
//! A node reloads its two stores from the latest image at startup, before
//! the one-time startup scans run.
//!
//! Format: `u32` LE header length, postcard header, then the zstd-compressed
//! postcard body. The header carries a SHA-256 of the uncompressed body.
//! Naming: `{ledger_seq:09}.snap`.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tiermark_types::{ArchiveEntry, Entry, Hash, LedgerHeader, decode, encode, sha256};
use zstd::stream::{Decoder, Encoder};

use crate::{
    error::{CodecSnafu, IoSnafu, Result, SnapshotError},
    snapshot::{ArchiveSnapshot, InMemoryArchiveSnapshot, InMemoryLiveSnapshot, LiveSnapshot},
};

/// Image file magic bytes.
const IMAGE_MAGIC: [u8; 4] = *b"TMIM";

/// Current image format version.
const IMAGE_VERSION: u32 = 1;

/// Largest header length accepted when reading. Real headers are well under
/// a kilobyte.
const MAX_HEADER_LEN: usize = 64 * 1024;

/// zstd level used when writing images.
const COMPRESSION_LEVEL: i32 = 3;

/// Image header, stored uncompressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Magic bytes for validation.
    pub magic: [u8; 4],
    /// Format version.
    pub version: u32,
    /// Ledger both stores were captured at.
    pub ledger: LedgerHeader,
    /// Number of live entries.
    pub live_count: u64,
    /// Number of archive records.
    pub archive_count: u64,
    /// SHA-256 of the uncompressed body.
    pub checksum: Hash,
}

/// Image body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBody {
    /// Live entries in key order.
    pub live: Vec<Entry>,
    /// Archive records in key order.
    pub archive: Vec<ArchiveEntry>,
}

/// A live/archive snapshot pair in serializable form.
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    /// Image header.
    pub header: ImageHeader,
    /// Decompressed body.
    pub body: ImageBody,
}

impl SnapshotImage {
    /// Captures an image of a snapshot pair.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::LedgerMismatch`] if the snapshots were taken
    /// at different ledgers, or a codec error if the body cannot be encoded.
    pub fn capture(live: &InMemoryLiveSnapshot, archive: &InMemoryArchiveSnapshot) -> Result<Self> {
        if live.ledger_seq() != archive.ledger_seq() {
            return Err(SnapshotError::LedgerMismatch {
                live: live.ledger_seq(),
                archive: archive.ledger_seq(),
            });
        }
        let body = ImageBody {
            live: live.iter().cloned().collect(),
            archive: archive.iter().cloned().collect(),
        };
        let body_bytes = encode(&body).context(CodecSnafu)?;
        let header = ImageHeader {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            ledger: *live.header(),
            live_count: body.live.len() as u64,
            archive_count: body.archive.len() as u64,
            checksum: sha256(&body_bytes),
        };
        Ok(Self { header, body })
    }

    /// Ledger sequence of this image.
    pub fn ledger_seq(&self) -> u32 {
        self.header.ledger.ledger_seq
    }

    /// Rebuilds the snapshot pair.
    pub fn into_snapshots(self) -> (InMemoryLiveSnapshot, InMemoryArchiveSnapshot) {
        let ledger = self.header.ledger;
        (
            InMemoryLiveSnapshot::new(ledger, self.body.live),
            InMemoryArchiveSnapshot::new(ledger, self.body.archive),
        )
    }

    /// Write the image to file with zstd compression.
    ///
    /// # Errors
    ///
    /// Returns an IO or codec error if writing fails.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).context(IoSnafu)?;
        let mut writer = BufWriter::new(file);

        let body_bytes = encode(&self.body).context(CodecSnafu)?;
        let mut compressed = Vec::new();
        {
            let mut encoder = Encoder::new(&mut compressed, COMPRESSION_LEVEL).context(IoSnafu)?;
            encoder.write_all(&body_bytes).context(IoSnafu)?;
            encoder.finish().context(IoSnafu)?;
        }

        let header_bytes = encode(&self.header).context(CodecSnafu)?;
        let header_len = u32::try_from(header_bytes.len()).map_err(|_| {
            SnapshotError::Corrupted { message: "image header exceeds 4 GiB".to_string() }
        })?;

        writer.write_all(&header_len.to_le_bytes()).context(IoSnafu)?;
        writer.write_all(&header_bytes).context(IoSnafu)?;
        writer.write_all(&compressed).context(IoSnafu)?;
        writer.flush().context(IoSnafu)?;
        Ok(())
    }

    /// Read an image from file, verifying magic, version and checksum.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Corrupted`] if verification fails, or an IO or
    /// codec error if the file cannot be read.
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).context(IoSnafu)?;
        let mut reader = BufReader::new(file);

        let mut header_len_bytes = [0u8; 4];
        read_exact_or_truncated(&mut reader, &mut header_len_bytes, "header length")?;
        let header_len = u32::from_le_bytes(header_len_bytes) as usize;
        if header_len > MAX_HEADER_LEN {
            return Err(SnapshotError::Corrupted {
                message: format!("image header length {header_len} exceeds {MAX_HEADER_LEN}"),
            });
        }

        let mut header_bytes = vec![0u8; header_len];
        read_exact_or_truncated(&mut reader, &mut header_bytes, "header")?;
        let header: ImageHeader = decode(&header_bytes).context(CodecSnafu)?;

        if header.magic != IMAGE_MAGIC {
            return Err(SnapshotError::Corrupted { message: "invalid image magic".to_string() });
        }
        if header.version != IMAGE_VERSION {
            return Err(SnapshotError::Corrupted {
                message: format!("unsupported image version {}", header.version),
            });
        }

        let mut compressed = Vec::new();
        reader.read_to_end(&mut compressed).context(IoSnafu)?;
        let mut decoder = Decoder::new(&compressed[..]).context(IoSnafu)?;
        let mut body_bytes = Vec::new();
        decoder.read_to_end(&mut body_bytes).context(IoSnafu)?;

        let computed = sha256(&body_bytes);
        if computed != header.checksum {
            return Err(SnapshotError::Corrupted {
                message: format!(
                    "checksum mismatch for ledger {}: expected {:02x?}, got {:02x?}",
                    header.ledger.ledger_seq, header.checksum, computed
                ),
            });
        }

        let body: ImageBody = decode(&body_bytes).context(CodecSnafu)?;
        if body.live.len() as u64 != header.live_count
            || body.archive.len() as u64 != header.archive_count
        {
            return Err(SnapshotError::Corrupted {
                message: format!(
                    "entry counts {}/{} do not match header {}/{}",
                    body.live.len(),
                    body.archive.len(),
                    header.live_count,
                    header.archive_count
                ),
            });
        }

        Ok(Self { header, body })
    }
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    match reader.read_exact(buf) {
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(SnapshotError::Corrupted {
            message: format!("image truncated reading {what} ({} bytes expected)", buf.len()),
        }),
        other => other.context(IoSnafu),
    }
}

/// Image file name for a ledger.
pub fn image_filename(ledger_seq: u32) -> String {
    format!("{ledger_seq:09}.snap")
}

/// Parse the ledger sequence from an image file name.
pub fn parse_image_filename(filename: &str) -> Option<u32> {
    filename.strip_suffix(".snap").and_then(|s| s.parse().ok())
}

/// Directory of snapshot images with bounded retention.
pub struct ImageStore {
    dir: PathBuf,
    max_images: usize,
}

impl ImageStore {
    /// Create a store over `dir`, keeping at most `max_images` files.
    pub fn new(dir: PathBuf, max_images: usize) -> Self {
        Self { dir, max_images: max_images.max(1) }
    }

    /// The image directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save an image, then prune the oldest beyond the retention limit.
    ///
    /// # Errors
    ///
    /// Returns an IO or codec error if writing or pruning fails.
    pub fn save(&self, image: &SnapshotImage) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).context(IoSnafu)?;
        let path = self.dir.join(image_filename(image.ledger_seq()));
        image.write_to_file(&path)?;
        tracing::debug!(
            ledger_seq = image.ledger_seq(),
            path = %path.display(),
            "Saved snapshot image"
        );
        self.prune()?;
        Ok(path)
    }

    /// Load the image for a ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] if no image exists for the ledger.
    pub fn load(&self, ledger_seq: u32) -> Result<SnapshotImage> {
        let path = self.dir.join(image_filename(ledger_seq));
        if !path.exists() {
            return Err(SnapshotError::NotFound { ledger_seq });
        }
        SnapshotImage::read_from_file(&path)
    }

    /// Load the newest image, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the image cannot be read.
    pub fn load_latest(&self) -> Result<Option<SnapshotImage>> {
        match self.list()?.last() {
            Some(&latest) => self.load(latest).map(Some),
            None => Ok(None),
        }
    }

    /// List available image ledgers, ascending.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<u32>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ledgers = Vec::new();
        for entry in fs::read_dir(&self.dir).context(IoSnafu)? {
            let entry = entry.context(IoSnafu)?;
            if let Some(filename) = entry.file_name().to_str()
                && let Some(seq) = parse_image_filename(filename)
            {
                ledgers.push(seq);
            }
        }
        ledgers.sort_unstable();
        Ok(ledgers)
    }

    fn prune(&self) -> Result<()> {
        let ledgers = self.list()?;
        if ledgers.len() <= self.max_images {
            return Ok(());
        }
        let to_remove = ledgers.len() - self.max_images;
        for seq in ledgers.into_iter().take(to_remove) {
            fs::remove_file(self.dir.join(image_filename(seq))).context(IoSnafu)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use tempfile::TempDir;
    use tiermark_types::{ContractCodeEntry, EntryData, ErrorCode, ProtocolVersion};

    use super::*;

    fn code(seed: u8) -> Entry {
        Entry::new(
            EntryData::ContractCode(ContractCodeEntry { hash: [seed; 32], code: vec![seed; 16] }),
            2,
        )
    }

    fn pair(seq: u32) -> (InMemoryLiveSnapshot, InMemoryArchiveSnapshot) {
        let ledger = LedgerHeader::new(seq, ProtocolVersion::new(23));
        (
            InMemoryLiveSnapshot::new(ledger, [code(1), code(2)]),
            InMemoryArchiveSnapshot::new(ledger, [ArchiveEntry::Archived(code(3))]),
        )
    }

    #[test]
    fn test_image_file_restores_both_stores() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("image.snap");
        let (live, archive) = pair(40);

        SnapshotImage::capture(&live, &archive).unwrap().write_to_file(&path).unwrap();
        let (live2, archive2) = SnapshotImage::read_from_file(&path).unwrap().into_snapshots();

        assert_eq!(live2.iter().collect::<Vec<_>>(), live.iter().collect::<Vec<_>>());
        assert_eq!(archive2.get_archived(&code(3).key()), Some(&code(3)));
    }

    #[test]
    fn test_capture_rejects_mismatched_ledgers() {
        let (live, _) = pair(40);
        let (_, archive) = pair(41);
        let err = SnapshotImage::capture(&live, &archive).unwrap_err();
        assert!(matches!(err, SnapshotError::LedgerMismatch { live: 40, archive: 41 }));
    }

    #[test]
    fn test_corrupted_body_is_detected() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("image.snap");
        let (live, archive) = pair(40);
        let mut image = SnapshotImage::capture(&live, &archive).unwrap();
        image.header.checksum = [0u8; 32];
        image.write_to_file(&path).unwrap();

        let err = SnapshotImage::read_from_file(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupted { .. }), "{err}");
        assert_eq!(err.code(), ErrorCode::SnapshotCorrupted);
    }

    #[test]
    fn test_invalid_magic_is_detected() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("image.snap");
        let (live, archive) = pair(40);
        let mut image = SnapshotImage::capture(&live, &archive).unwrap();
        image.header.magic = *b"NOPE";
        image.write_to_file(&path).unwrap();

        assert!(matches!(
            SnapshotImage::read_from_file(&path),
            Err(SnapshotError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_truncated_length_prefix_is_corrupted() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("image.snap");
        fs::write(&path, [0x01, 0x00]).unwrap();

        let err = SnapshotImage::read_from_file(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupted { .. }), "{err}");
        assert!(err.to_string().contains("header length"), "{err}");
    }

    #[test]
    fn test_oversized_header_length_is_rejected_before_allocating() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("image.snap");
        fs::write(&path, 0x0FFF_FFFFu32.to_le_bytes()).unwrap();

        let err = SnapshotImage::read_from_file(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupted { .. }), "{err}");
        assert!(err.to_string().contains("exceeds"), "{err}");
    }

    #[test]
    fn test_truncated_header_is_corrupted() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("image.snap");
        let mut bytes = 100u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 10]);
        fs::write(&path, bytes).unwrap();

        let err = SnapshotImage::read_from_file(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupted { .. }), "{err}");
    }

    #[test]
    fn test_filename_roundtrip() {
        assert_eq!(image_filename(42), "000000042.snap");
        assert_eq!(parse_image_filename("000000042.snap"), Some(42));
        assert_eq!(parse_image_filename("42.tmp"), None);
    }

    #[test]
    fn test_store_prunes_and_loads_latest() {
        let temp = TempDir::new().expect("create temp dir");
        let store = ImageStore::new(temp.path().join("images"), 2);
        assert!(store.load_latest().unwrap().is_none());

        for seq in [10, 11, 12] {
            let (live, archive) = pair(seq);
            store.save(&SnapshotImage::capture(&live, &archive).unwrap()).unwrap();
        }

        assert_eq!(store.list().unwrap(), vec![11, 12]);
        assert_eq!(store.load_latest().unwrap().map(|i| i.ledger_seq()), Some(12));
        assert!(matches!(store.load(10), Err(SnapshotError::NotFound { ledger_seq: 10 })));
    }
}
