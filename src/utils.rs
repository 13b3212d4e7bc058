use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Error;

/// copy from https://github.com/tikv/tikv/blob/b15ea3b1cd766375cb52019e35c195ed797124df/components/tikv_util/src/lib.rs#L171-L186
///
/// A handy shortcut to replace the `RwLock` write/read().unwrap() pattern
/// with `wl()`/`rl()`.
pub(crate) trait HandyRwLock<T: ?Sized> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T: ?Sized> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

/// The character that separates a collection identifier from a member
/// identifier in a full key. Canonically the platform path separator, so
/// that collection names read naturally as directory names.
pub(crate) const COLL_KEY_SEP: char = std::path::MAIN_SEPARATOR;

/// A key is valid iff it is non-empty and does not begin with the separator.
pub(crate) fn check_key_valid(key: &str) -> Result<(), Error> {
    if key.is_empty() || key.starts_with(COLL_KEY_SEP) {
        return Err(Error::KeyInvalid {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// A key is a collection key iff it has no separator, or the only separator
/// is its last character.
pub(crate) fn is_collection_key(key: &str) -> bool {
    match key.find(COLL_KEY_SEP) {
        None => true,
        Some(idx) => idx == key.len() - COLL_KEY_SEP.len_utf8(),
    }
}

/// Splits a validated, non-collection full key into `(collection, member)`
/// at the first separator. The member half may itself contain further
/// separators; they are preserved verbatim.
pub(crate) fn split_key(key: &str) -> (&str, &str) {
    let idx = key.find(COLL_KEY_SEP).expect("caller checked key is a member key");
    let (coll, rest) = key.split_at(idx);
    (coll, &rest[COLL_KEY_SEP.len_utf8()..])
}

/// Strips the trailing separator a collection-only key may carry, e.g.
/// `"artist/"` and `"artist"` both name the `artist` collection.
pub(crate) fn collection_name(key: &str) -> &str {
    key.strip_suffix(COLL_KEY_SEP).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_invalid() {
        assert!(check_key_valid("").is_err());
    }

    #[test]
    fn leading_separator_is_invalid() {
        let key = format!("{}artist", COLL_KEY_SEP);
        assert!(check_key_valid(&key).is_err());
    }

    #[test]
    fn bare_name_is_a_collection_key() {
        assert!(is_collection_key("artist"));
    }

    #[test]
    fn trailing_separator_is_a_collection_key() {
        let key = format!("artist{}", COLL_KEY_SEP);
        assert!(is_collection_key(&key));
    }

    #[test]
    fn member_key_splits_at_first_separator_only() {
        let key = format!("artist{}daft{}punk", COLL_KEY_SEP, COLL_KEY_SEP);
        assert!(!is_collection_key(&key));
        let (coll, member) = split_key(&key);
        assert_eq!(coll, "artist");
        assert_eq!(member, format!("daft{}punk", COLL_KEY_SEP));
    }

    #[test]
    fn collection_name_strips_trailing_separator() {
        let key = format!("artist{}", COLL_KEY_SEP);
        assert_eq!(collection_name(&key), "artist");
        assert_eq!(collection_name("artist"), "artist");
    }
}
