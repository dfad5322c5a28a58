//! Per-record synchronization engine.
//!
//! For every record the engine compares the modification times of the two
//! forms, converts from the newer one into the other, and remembers what it
//! saw so an idle sweep touches nothing. All conversion output goes through
//! a sibling temporary file and a rename, and a source file that changes
//! mid-conversion makes the engine throw the output away and defer to the
//! next sweep instead of guessing.

use crate::cache::{AccountCache, AccountState, ObservationCache};
use crate::error::SyncResult;
use crate::pair::{self, RecordPaths};
use parking_lot::Mutex;
use savsync_codec::{content_hash, decode_save, derive_account_key, encode_save, AccountKey};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Platform save root holding one subdirectory per account.
    pub save_root: PathBuf,
    /// Fixed relative path from an account root to its records folder.
    ///
    /// Empty by default, meaning the account root itself holds the records.
    pub records_subdir: PathBuf,
}

impl SyncConfig {
    /// Creates a configuration for a save root.
    pub fn new(save_root: impl Into<PathBuf>) -> Self {
        Self {
            save_root: save_root.into(),
            records_subdir: PathBuf::new(),
        }
    }

    /// Sets the relative records subdirectory within each account root.
    #[must_use]
    pub fn with_records_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.records_subdir = subdir.into();
        self
    }

    /// Computes the records folder for an account root.
    #[must_use]
    pub fn records_dir_for(&self, account_root: &Path) -> PathBuf {
        if self.records_subdir.as_os_str().is_empty() {
            account_root.to_path_buf()
        } else {
            account_root.join(&self.records_subdir)
        }
    }
}

/// Direction of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Binary form to plaintext form.
    Decode,
    /// Plaintext form to binary form.
    Encode,
}

/// What happened to one record during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Neither file changed since last observed.
    UpToDate,
    /// A conversion ran and the target was replaced.
    Converted(Direction),
    /// The source file was empty; the codec was never invoked.
    SkippedEmpty,
    /// The codec rejected the source; it was archived and will not be
    /// retried until the source changes again.
    CodecFailed,
    /// A source file changed mid-conversion; the output was discarded and
    /// another sweep is owed.
    Conflicted,
}

/// Counters for one sweep, merged across folders and accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records examined.
    pub records: usize,
    /// Conversions performed.
    pub converted: usize,
    /// Records already up to date.
    pub up_to_date: usize,
    /// Records skipped because the source was empty.
    pub skipped_empty: usize,
    /// Records whose conversion was discarded due to a concurrent write.
    pub conflicts: usize,
    /// Records whose source the codec rejected.
    pub codec_failures: usize,
    /// Records aborted by filesystem errors.
    pub io_failures: usize,
}

impl SweepReport {
    /// True when a concurrent modification was detected and another sweep
    /// should be scheduled.
    #[must_use]
    pub fn needs_resweep(&self) -> bool {
        self.conflicts > 0
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: SweepReport) {
        self.records += other.records;
        self.converted += other.converted;
        self.up_to_date += other.up_to_date;
        self.skipped_empty += other.skipped_empty;
        self.conflicts += other.conflicts;
        self.codec_failures += other.codec_failures;
        self.io_failures += other.io_failures;
    }

    fn tally(&mut self, outcome: RecordOutcome) {
        self.records += 1;
        match outcome {
            RecordOutcome::UpToDate => self.up_to_date += 1,
            RecordOutcome::Converted(_) => self.converted += 1,
            RecordOutcome::SkippedEmpty => self.skipped_empty += 1,
            RecordOutcome::CodecFailed => self.codec_failures += 1,
            RecordOutcome::Conflicted => self.conflicts += 1,
        }
    }
}

/// Picks the conversion direction from the two current timestamps.
///
/// An absent file reads as the minimum timestamp; ties favor decoding from
/// the binary form, which the host wrote last.
pub(crate) fn choose_direction(
    sav: Option<SystemTime>,
    yaml: Option<SystemTime>,
) -> Direction {
    if sav >= yaml {
        Direction::Decode
    } else {
        Direction::Encode
    }
}

/// Reads a file's modification time, mapping absence to `None`.
fn modified_time(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// The synchronization engine.
///
/// All sweeping is strictly sequential; the caches are behind mutexes only
/// because the engine is shared with the notifier side through an `Arc`,
/// never contended in practice.
pub struct SyncEngine {
    config: SyncConfig,
    observations: Mutex<ObservationCache>,
    accounts: Mutex<AccountCache>,
    /// Runs between writing the temporary file and the commit re-check, so a
    /// test can interleave a writer at the exact racy point.
    #[cfg(test)]
    after_temp_write: Mutex<Option<Box<dyn FnMut(&RecordPaths) + Send>>>,
}

impl SyncEngine {
    /// Creates an engine for the configured save root.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            observations: Mutex::new(ObservationCache::default()),
            accounts: Mutex::new(AccountCache::default()),
            #[cfg(test)]
            after_temp_write: Mutex::new(None),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Updates the cached observation for both files of a record.
    fn record_observations(
        &self,
        paths: &RecordPaths,
        sav: Option<SystemTime>,
        yaml: Option<SystemTime>,
    ) {
        let mut observations = self.observations.lock();
        observations.record(&paths.sav, sav);
        observations.record(&paths.yaml, yaml);
    }

    /// Synchronizes one record.
    ///
    /// # Errors
    ///
    /// Returns filesystem errors only; codec rejections and concurrent
    /// modifications are reported through [`RecordOutcome`].
    pub fn sync_record(
        &self,
        folder: &Path,
        key: &AccountKey,
        stem: &OsStr,
    ) -> SyncResult<RecordOutcome> {
        let paths = RecordPaths::for_stem(folder, stem);
        let sav_seen = modified_time(&paths.sav)?;
        let yaml_seen = modified_time(&paths.yaml)?;

        {
            let observations = self.observations.lock();
            if observations.get(&paths.sav) == sav_seen
                && observations.get(&paths.yaml) == yaml_seen
            {
                return Ok(RecordOutcome::UpToDate);
            }
        }

        let direction = choose_direction(sav_seen, yaml_seen);
        let (source, target) = match direction {
            Direction::Decode => (&paths.sav, &paths.yaml),
            Direction::Encode => (&paths.yaml, &paths.sav),
        };

        let data = fs::read(source)?;
        if data.is_empty() {
            debug!(source = %source.display(), "empty source file, skipping conversion");
            self.record_observations(&paths, sav_seen, yaml_seen);
            return Ok(RecordOutcome::SkippedEmpty);
        }

        let output = match direction {
            Direction::Decode => decode_save(&data, key),
            Direction::Encode => encode_save(&data, key),
        };
        let output = match output {
            Ok(output) => output,
            Err(codec_err) => {
                error!(
                    source = %source.display(),
                    error = %codec_err,
                    "codec rejected record, archiving source"
                );
                if let Err(e) = archive_failed_source(folder, source, &data) {
                    warn!(source = %source.display(), error = %e, "failed to archive source");
                }
                // Cache the times so idle sweeps do not retry; a new write
                // to the source makes it eligible again.
                self.record_observations(&paths, sav_seen, yaml_seen);
                return Ok(RecordOutcome::CodecFailed);
            }
        };

        let temp = pair::temp_path(target);
        fs::write(&temp, &output)?;

        #[cfg(test)]
        if let Some(hook) = self.after_temp_write.lock().as_mut() {
            hook(&paths);
        }

        // A writer may have touched either file while the conversion ran.
        let unchanged = match files_unchanged(&paths, sav_seen, yaml_seen) {
            Ok(unchanged) => unchanged,
            Err(e) => {
                discard_temp(&temp);
                return Err(e.into());
            }
        };
        if !unchanged {
            debug!(record = ?stem, "source changed mid-conversion, deferring to next sweep");
            discard_temp(&temp);
            return Ok(RecordOutcome::Conflicted);
        }

        if let Err(e) = fs::rename(&temp, target) {
            discard_temp(&temp);
            return Err(e.into());
        }

        let sav_now = modified_time(&paths.sav)?;
        let yaml_now = modified_time(&paths.yaml)?;
        self.record_observations(&paths, sav_now, yaml_now);

        match direction {
            Direction::Decode => info!(record = ?stem, "decoded sav into yaml"),
            Direction::Encode => info!(record = ?stem, "encoded yaml into sav"),
        }
        Ok(RecordOutcome::Converted(direction))
    }

    /// Sweeps every record in one folder.
    ///
    /// Failures on one record never abort the rest of the folder.
    pub fn sweep_folder(&self, folder: &Path, key: &AccountKey) -> SweepReport {
        let mut report = SweepReport::default();
        let stems = match pair::list_record_stems(folder) {
            Ok(stems) => stems,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(folder = %folder.display(), "records folder does not exist yet");
                return report;
            }
            Err(e) => {
                error!(folder = %folder.display(), error = %e, "cannot list records folder");
                report.io_failures += 1;
                return report;
            }
        };

        for stem in stems {
            match self.sync_record(folder, key, &stem) {
                Ok(outcome) => report.tally(outcome),
                Err(e) => {
                    error!(record = ?stem, error = %e, "record sync failed");
                    report.records += 1;
                    report.io_failures += 1;
                }
            }
        }
        report
    }

    /// Sweeps every account under the save root.
    ///
    /// Account roots whose identifier cannot be turned into a key are marked
    /// unresolvable once and skipped forever after.
    pub fn sweep_all(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let roots = match pair::list_account_roots(&self.config.save_root) {
            Ok(roots) => roots,
            Err(e) => {
                error!(
                    save_root = %self.config.save_root.display(),
                    error = %e,
                    "cannot list save root"
                );
                report.io_failures += 1;
                return report;
            }
        };

        for (name, root) in roots {
            let resolved = {
                let mut accounts = self.accounts.lock();
                match accounts.get(&name) {
                    Some(AccountState::Unresolvable) => None,
                    Some(AccountState::Resolved { records_dir, key }) => {
                        Some((records_dir.clone(), key.clone()))
                    }
                    None => {
                        let derived = name.to_str().and_then(derive_account_key);
                        let state = match derived {
                            Some(key) => AccountState::Resolved {
                                records_dir: self.config.records_dir_for(&root),
                                key,
                            },
                            None => {
                                warn!(account = ?name, "cannot derive key, marking unresolvable");
                                AccountState::Unresolvable
                            }
                        };
                        accounts.insert(name.clone(), state.clone());
                        match state {
                            AccountState::Resolved { records_dir, key } => {
                                Some((records_dir, key))
                            }
                            AccountState::Unresolvable => None,
                        }
                    }
                }
            };

            if let Some((records_dir, key)) = resolved {
                report.merge(self.sweep_folder(&records_dir, &key));
            }
        }

        debug!(?report, "sweep finished");
        report
    }
}

/// Re-reads both timestamps and compares them to what the sweep saw.
fn files_unchanged(
    paths: &RecordPaths,
    sav_seen: Option<SystemTime>,
    yaml_seen: Option<SystemTime>,
) -> io::Result<bool> {
    Ok(modified_time(&paths.sav)? == sav_seen && modified_time(&paths.yaml)? == yaml_seen)
}

/// Removes a temporary output file, downgrading failure to a warning.
fn discard_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp) {
        warn!(temp = %temp.display(), error = %e, "failed to remove temporary file");
    }
}

/// Copies a rejected source file into the error-archive subfolder.
///
/// The copy is named by its content hash with the original extension kept
/// and the archive marker appended.
fn archive_failed_source(folder: &Path, source: &Path, data: &[u8]) -> io::Result<PathBuf> {
    let errors_dir = folder.join(pair::ERRORS_DIR);
    fs::create_dir_all(&errors_dir)?;

    let extension = source
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or(pair::SAV_EXTENSION);
    let name = format!(
        "{}.{}{}",
        content_hash(data),
        extension,
        pair::ARCHIVE_SUFFIX
    );
    let dest = errors_dir.join(name);
    fs::write(&dest, data)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    const ACCOUNT_ID: &str = "72057594037927937";

    fn t(secs: u64) -> Option<SystemTime> {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    #[test]
    fn ties_favor_decoding() {
        assert_eq!(choose_direction(t(10), t(10)), Direction::Decode);
    }

    #[test]
    fn newer_file_wins() {
        assert_eq!(choose_direction(t(20), t(10)), Direction::Decode);
        assert_eq!(choose_direction(t(10), t(20)), Direction::Encode);
    }

    #[test]
    fn absent_file_reads_as_oldest() {
        assert_eq!(choose_direction(t(10), None), Direction::Decode);
        assert_eq!(choose_direction(None, t(10)), Direction::Encode);
        // Both absent still decodes, though such records never reach here.
        assert_eq!(choose_direction(None, None), Direction::Decode);
    }

    #[test]
    fn report_merging() {
        let mut a = SweepReport {
            records: 2,
            converted: 1,
            up_to_date: 1,
            ..SweepReport::default()
        };
        let b = SweepReport {
            records: 1,
            conflicts: 1,
            ..SweepReport::default()
        };
        a.merge(b);
        assert_eq!(a.records, 3);
        assert_eq!(a.conflicts, 1);
        assert!(a.needs_resweep());
    }

    #[test]
    fn concurrent_write_discards_output_and_requests_resweep() {
        let dir = tempdir().unwrap();
        let key = derive_account_key(ACCOUNT_ID).unwrap();

        // A stale plaintext target and a binary source; equal-or-newer sav
        // means the sweep decodes into a.yaml.
        std::fs::write(dir.path().join("a.yaml"), b"state: old\n").unwrap();
        let first = encode_save(b"state: 1\n", &key).unwrap();
        let sav = dir.path().join("a.sav");
        std::fs::write(&sav, &first).unwrap();

        let engine = SyncEngine::new(SyncConfig::new(dir.path()));
        let newer = encode_save(b"state: 2\n", &key).unwrap();
        {
            let sav = sav.clone();
            *engine.after_temp_write.lock() = Some(Box::new(move |_| {
                // Long enough for the rewrite to land on a later timestamp.
                thread::sleep(Duration::from_millis(50));
                std::fs::write(&sav, &newer).unwrap();
            }));
        }

        let report = engine.sweep_folder(dir.path(), &key);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.converted, 0);
        assert!(report.needs_resweep());

        // The discarded conversion left no trace on the target.
        let yaml = dir.path().join("a.yaml");
        assert_eq!(std::fs::read(&yaml).unwrap(), b"state: old\n");
        assert!(!pair::temp_path(&yaml).exists());

        // Nothing was cached, so the next sweep converts the newer source.
        *engine.after_temp_write.lock() = None;
        let report = engine.sweep_folder(dir.path(), &key);
        assert_eq!(report.converted, 1);
        assert_eq!(report.conflicts, 0);
        assert_eq!(std::fs::read(&yaml).unwrap(), b"state: 2\n");
    }

    #[cfg(unix)]
    #[test]
    fn failed_recheck_removes_the_temporary_file() {
        let dir = tempdir().unwrap();
        let key = derive_account_key(ACCOUNT_ID).unwrap();
        let sav = dir.path().join("a.sav");
        std::fs::write(&sav, encode_save(b"state: 1\n", &key).unwrap()).unwrap();

        let engine = SyncEngine::new(SyncConfig::new(dir.path()));
        {
            let sav = sav.clone();
            // Replacing the source with a self-referential symlink makes the
            // timestamp re-read fail with an error other than not-found.
            *engine.after_temp_write.lock() = Some(Box::new(move |_| {
                std::fs::remove_file(&sav).unwrap();
                std::os::unix::fs::symlink(&sav, &sav).unwrap();
            }));
        }

        let result = engine.sync_record(dir.path(), &key, OsStr::new("a"));
        assert!(matches!(result, Err(SyncError::Io(_))));
        assert!(!dir.path().join("a.yaml.tmp").exists());
        assert!(!dir.path().join("a.yaml").exists());
    }

    #[test]
    fn records_dir_defaults_to_account_root() {
        let config = SyncConfig::new("/saves");
        assert_eq!(
            config.records_dir_for(Path::new("/saves/1234")),
            Path::new("/saves/1234")
        );

        let config = SyncConfig::new("/saves").with_records_subdir("Profiles/client");
        assert_eq!(
            config.records_dir_for(Path::new("/saves/1234")),
            Path::new("/saves/1234/Profiles/client")
        );
    }
}
