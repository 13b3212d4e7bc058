use latchkv::{Error, Store};

fn only_page_file(collection_dir: &std::path::Path) -> std::path::PathBuf {
    std::fs::read_dir(collection_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .next()
        .expect("collection directory should contain exactly one page file")
}

/// Scenario 6: incrementing the stored checksum by one makes the page file
/// unreadable; reopening the store skips it (reported internally as a
/// `FileChecksum` and logged) while page files in other collections still
/// load normally.
#[test]
fn a_checksum_mismatch_is_skipped_without_losing_other_pages() {
    let dir = tempfile::tempdir().unwrap();

    let store = Store::open(dir.path()).unwrap();
    store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
    store.put("producer/justice", b"cross".to_vec()).unwrap();
    store.close().unwrap();

    let path = only_page_file(&dir.path().join("artist"));
    let mut bytes = std::fs::read(&path).unwrap();
    // Bytes 12..20 of the header hold the big-endian checksum.
    let checksum_last_byte = 19;
    bytes[checksum_last_byte] = bytes[checksum_last_byte].wrapping_add(1);
    std::fs::write(&path, bytes).unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(
        store.get("artist/daftpunk").unwrap_err(),
        Error::NoSuchKey { .. }
    ));
    assert_eq!(store.get("producer/justice").unwrap(), b"cross".to_vec());

    store.close().unwrap();
}

/// A truncated page file (header present, payload cut short) is corrupt in
/// a different way than a bad checksum, and must be skipped the same way.
#[test]
fn a_truncated_page_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();

    let store = Store::open(dir.path()).unwrap();
    store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
    store.close().unwrap();

    let path = only_page_file(&dir.path().join("artist"));
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(
        store.get("artist/daftpunk").unwrap_err(),
        Error::NoSuchKey { .. }
    ));
    store.close().unwrap();
}
