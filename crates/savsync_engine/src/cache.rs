//! Process-lifetime caches.
//!
//! Both caches grow for the lifetime of the process and are never evicted.
//! The real-world cardinality (a handful of accounts, tens of records) makes
//! that an accepted tradeoff; a long-running host would want to size-bound
//! them.

use savsync_codec::AccountKey;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Last-observed modification timestamps, keyed by absolute file path.
///
/// `None` stands for the minimum representable timestamp: it is both the
/// state of a path that has never been observed and the recorded state of a
/// deleted file.
#[derive(Debug, Default)]
pub struct ObservationCache {
    times: HashMap<PathBuf, Option<SystemTime>>,
}

impl ObservationCache {
    /// Returns the last observed timestamp for a path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<SystemTime> {
        self.times.get(path).copied().flatten()
    }

    /// Records the current timestamp for a path (`None` when deleted).
    pub fn record(&mut self, path: &Path, time: Option<SystemTime>) {
        self.times.insert(path.to_path_buf(), time);
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether any path has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Resolution state of one account root, cached permanently.
#[derive(Debug, Clone)]
pub enum AccountState {
    /// Key derived and records folder computed.
    Resolved {
        /// The account's records folder.
        records_dir: PathBuf,
        /// The account's derived key.
        key: AccountKey,
    },
    /// Key derivation failed; never re-attempted.
    Unresolvable,
}

/// Per-account resolution cache, keyed by the root directory name.
#[derive(Debug, Default)]
pub struct AccountCache {
    accounts: HashMap<OsString, AccountState>,
}

impl AccountCache {
    /// Returns the cached state for an account root, if any.
    #[must_use]
    pub fn get(&self, name: &OsString) -> Option<&AccountState> {
        self.accounts.get(name)
    }

    /// Stores the resolution state for an account root.
    pub fn insert(&mut self, name: OsString, state: AccountState) {
        self.accounts.insert(name, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn unseen_path_reads_as_minimum() {
        let cache = ObservationCache::default();
        assert_eq!(cache.get(Path::new("/nowhere.sav")), None);
    }

    #[test]
    fn records_and_overwrites() {
        let mut cache = ObservationCache::default();
        let path = Path::new("/saves/a.sav");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_secs(5);

        cache.record(path, Some(t0));
        assert_eq!(cache.get(path), Some(t0));

        cache.record(path, Some(t1));
        assert_eq!(cache.get(path), Some(t1));

        // Deletion resets to the minimum.
        cache.record(path, None);
        assert_eq!(cache.get(path), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn account_states_are_remembered() {
        let mut cache = AccountCache::default();
        let name = OsString::from("bogus");
        assert!(cache.get(&name).is_none());

        cache.insert(name.clone(), AccountState::Unresolvable);
        assert!(matches!(cache.get(&name), Some(AccountState::Unresolvable)));
    }
}
