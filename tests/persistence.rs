use rand::Rng;

use latchkv::{Error, Store};

/// Scenario 1 from the store's concrete test scenarios: put, get, delete,
/// and the NoSuchKey state afterward.
#[test]
fn put_get_delete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
    assert_eq!(store.get("artist/daftpunk").unwrap(), b"discovery".to_vec());

    store.delete("artist/daftpunk").unwrap();
    assert!(matches!(
        store.get("artist/daftpunk").unwrap_err(),
        Error::NoSuchKey { .. }
    ));

    store.close().unwrap();
}

/// Scenario 3: a value written before `close` reads back byte-for-byte after
/// reopening the same base path.
#[test]
fn value_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let store = Store::open(dir.path()).unwrap();
    store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
    store.put("artist/justice", b"cross".to_vec()).unwrap();
    store.delete("artist/justice").unwrap();
    store.close().unwrap();

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.get("artist/daftpunk").unwrap(), b"discovery".to_vec());
    assert!(matches!(
        store.get("artist/justice").unwrap_err(),
        Error::NoSuchKey { .. }
    ));
    store.close().unwrap();
}

/// A value that is never mutated again after `put` still needs to make it
/// through the journal drain before `close` returns: this repeats the
/// round trip across many keys and many reopen cycles to pressure-test that
/// `close` really does block until the drain is complete.
#[test]
fn many_keys_survive_several_reopen_cycles() {
    let dir = tempfile::tempdir().unwrap();

    for cycle in 0..5 {
        let store = Store::open(dir.path()).unwrap();
        for i in 0..50 {
            let key = format!("artist/daftpunk{i}");
            let value = format!("cycle{cycle}-value{i}").into_bytes();
            store.put(&key, value).unwrap();
        }
        store.close().unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    for i in 0..50 {
        let key = format!("artist/daftpunk{i}");
        let expected = format!("cycle4-value{i}").into_bytes();
        assert_eq!(store.get(&key).unwrap(), expected);
    }
    store.close().unwrap();
}

/// Mutating the caller's buffer after `put`, or the buffer returned by
/// `get`, must never affect a later `get` of the same key: both sides copy.
#[test]
fn put_and_get_copy_their_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let mut input = b"discovery".to_vec();
    store.put("artist/daftpunk", input.clone()).unwrap();
    input[0] = b'X';
    assert_eq!(store.get("artist/daftpunk").unwrap(), b"discovery".to_vec());

    let mut output = store.get("artist/daftpunk").unwrap();
    output[0] = b'X';
    assert_eq!(store.get("artist/daftpunk").unwrap(), b"discovery".to_vec());

    store.close().unwrap();
}

/// Values of randomly chosen lengths, including zero, survive a `close` and
/// reopen byte-for-byte: the codec and journal must not special-case any
/// particular payload size.
#[test]
fn random_length_values_survive_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = rand::thread_rng();

    let store = Store::open(dir.path()).unwrap();
    let mut expected = Vec::new();
    for i in 0..30 {
        let len = rng.gen_range(0, 4096);
        let value: Vec<u8> = (0..len).map(|_| rng.gen_range(0, 256) as u8).collect();
        let key = format!("artist/daftpunk{i}");
        store.put(&key, value.clone()).unwrap();
        expected.push((key, value));
    }
    store.close().unwrap();

    let store = Store::open(dir.path()).unwrap();
    for (key, value) in expected {
        assert_eq!(store.get(&key).unwrap(), value);
    }
    store.close().unwrap();
}
