//! The on-disk page format: a fixed-size header, the raw key bytes, then the
//! raw value bytes. See `docs/page file` in DESIGN.md for the layout diagram.

use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use sha1::{Digest, Sha1};

use crate::error::Error;

pub(crate) const FILE_MAJOR: u16 = 1;
pub(crate) const FILE_MINOR: u16 = 0;
pub(crate) const FILE_PATCH: u64 = 0;

const HEADER_SIZE: usize = 2 + 2 + 8 + 8 + 8 + 8;

/// Characters a percent-encoded filename prefix may keep unescaped.
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same idea as `FILENAME_SAFE` but for a whole collection directory name,
/// which is taken verbatim from caller input rather than truncated and
/// suffixed with a hash: `.` is deliberately *not* kept safe here, so a
/// collection named `.` or `..` escapes to `%2E`/`%2E%2E` instead of
/// resolving to the store's own base directory or its parent.
const COLLECTION_DIRNAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// Maximum length, in bytes, of the escaped-key prefix kept in a filename
/// for readability; the SHA-1 suffix is what actually guarantees uniqueness.
const FILENAME_PREFIX_MAX: usize = 40;

struct FileHeader {
    major: u16,
    minor: u16,
    patch: u64,
    checksum: u64,
    key_length: u64,
    payload_length: u64,
}

impl FileHeader {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.major.to_be_bytes());
        buf[2..4].copy_from_slice(&self.minor.to_be_bytes());
        buf[4..12].copy_from_slice(&self.patch.to_be_bytes());
        buf[12..20].copy_from_slice(&self.checksum.to_be_bytes());
        buf[20..28].copy_from_slice(&self.key_length.to_be_bytes());
        buf[28..36].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Option<FileHeader> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(FileHeader {
            major: u16::from_be_bytes(buf[0..2].try_into().ok()?),
            minor: u16::from_be_bytes(buf[2..4].try_into().ok()?),
            patch: u64::from_be_bytes(buf[4..12].try_into().ok()?),
            checksum: u64::from_be_bytes(buf[12..20].try_into().ok()?),
            key_length: u64::from_be_bytes(buf[20..28].try_into().ok()?),
            payload_length: u64::from_be_bytes(buf[28..36].try_into().ok()?),
        })
    }
}

/// Decodes the leading bytes of `buf` as an unsigned LEB128 varint, the same
/// encoding Go's `encoding/binary.Uvarint` produces. Used to fold a SHA-1
/// digest down to a 64-bit checksum; always terminates within the digest's
/// 20 bytes so there is no error case to report.
fn decode_uvarint(buf: &[u8]) -> u64 {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &b) in buf.iter().enumerate() {
        if i >= 10 {
            break;
        }
        if b < 0x80 {
            result |= (b as u64) << shift;
            break;
        }
        result |= ((b & 0x7f) as u64) << shift;
        shift += 7;
    }
    result
}

fn checksum_of(value: &[u8]) -> u64 {
    let digest = Sha1::digest(value);
    decode_uvarint(&digest)
}

/// Percent-escapes `key`, truncated to `FILENAME_PREFIX_MAX` bytes, followed
/// by the hex-encoded SHA-1 digest of the full key. Collisions are bounded
/// by SHA-1 collisions on the key, not on the (lossy, truncated) prefix.
pub(crate) fn member_filename(key: &str) -> String {
    let escaped = percent_encoding::utf8_percent_encode(key, FILENAME_SAFE).to_string();
    let prefix_len = escaped.len().min(FILENAME_PREFIX_MAX);
    let prefix = &escaped[..prefix_len];

    let digest = Sha1::digest(key.as_bytes());
    let suffix = hex::encode(digest);

    format!("{prefix}{suffix}")
}

/// Percent-escapes a collection name into the directory name it is actually
/// stored under. Reversed by [`decode_collection_dirname`] during recovery.
pub(crate) fn collection_dirname(collection: &str) -> String {
    percent_encoding::utf8_percent_encode(collection, COLLECTION_DIRNAME_SAFE).to_string()
}

/// Recovers the original collection name from a directory name produced by
/// [`collection_dirname`]. `None` if `dirname` is not valid percent-encoding
/// of UTF-8 bytes, which means it was not a directory this store created
/// (leftover/foreign directory) and should be skipped during recovery.
pub(crate) fn decode_collection_dirname(dirname: &str) -> Option<String> {
    percent_encoding::percent_decode_str(dirname)
        .decode_utf8()
        .ok()
        .map(|cow| cow.into_owned())
}

pub(crate) fn member_path(base_path: &Path, collection: &str, key: &str) -> PathBuf {
    base_path.join(collection_dirname(collection)).join(member_filename(key))
}

pub(crate) fn collection_path(base_path: &Path, collection: &str) -> PathBuf {
    base_path.join(collection_dirname(collection))
}

/// Serializes one member's key and value into the on-disk record format.
pub(crate) fn encode_page(key: &str, value: &[u8]) -> Vec<u8> {
    let key_bytes = key.as_bytes();
    let header = FileHeader {
        major: FILE_MAJOR,
        minor: FILE_MINOR,
        patch: FILE_PATCH,
        checksum: checksum_of(value),
        key_length: key_bytes.len() as u64,
        payload_length: value.len() as u64,
    };

    let mut data = Vec::with_capacity(HEADER_SIZE + key_bytes.len() + value.len());
    data.extend_from_slice(&header.to_bytes());
    data.extend_from_slice(key_bytes);
    data.extend_from_slice(value);
    data
}

/// Decodes a page file's raw bytes into `(key, value)`, validating the
/// header and checksum. `path` is only used to annotate errors.
pub(crate) fn decode_page(path: &Path, data: &[u8]) -> Result<(String, Vec<u8>), Error> {
    let header = FileHeader::from_bytes(data).ok_or_else(|| Error::FileHeaderDecode {
        path: path.to_path_buf(),
    })?;

    if header.major > FILE_MAJOR {
        return Err(Error::FileWrongVersion {
            path: path.to_path_buf(),
            major: header.major,
        });
    }

    let key_start = HEADER_SIZE;
    let payload_start = key_start + header.key_length as usize;
    let remaining = data.len().saturating_sub(key_start) as u64;
    if remaining != header.key_length + header.payload_length {
        return Err(Error::FilePayloadLength {
            path: path.to_path_buf(),
            expected: header.key_length + header.payload_length,
            actual: remaining,
        });
    }

    let key_bytes = &data[key_start..payload_start];
    let payload = &data[payload_start..];

    if checksum_of(payload) != header.checksum {
        return Err(Error::FileChecksum {
            path: path.to_path_buf(),
        });
    }

    let key = String::from_utf8(key_bytes.to_vec()).map_err(|_| Error::FileHeaderDecode {
        path: path.to_path_buf(),
    })?;

    Ok((key, payload.to_vec()))
}
