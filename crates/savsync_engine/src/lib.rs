//! # savsync engine
//!
//! Keeps the two on-disk representations of every save record in step: the
//! binary `sav` blob and the editable `yaml` document. Whichever form
//! changed most recently is converted into the other, across every record
//! in every per-account folder under a save root.
//!
//! This crate provides:
//! - Pair resolution (record stems, account roots, path conventions)
//! - The per-record sync state machine with race-tolerant replacement
//! - Process-lifetime observation and account caches
//! - The debounced background worker and its notification signal
//!
//! ## Architecture
//!
//! ```text
//! notify() ──▶ SweepSignal ──▶ worker ──▶ SyncEngine::sweep_all()
//!                                            │ per account root
//!                                            ▼
//!                                      sweep_folder() ──▶ sync_record()
//! ```
//!
//! ## Key invariants
//!
//! - A record's two files, once synchronized, encode the same content
//! - Conversion output never lands on the target path directly; a
//!   temporary file and a rename make partial writes invisible
//! - A source file modified mid-conversion wins: the output is discarded
//!   and the next sweep starts over
//! - Failures on one record never abort the sweep of other records
//! - An account identifier that fails key derivation is never retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod debounce;
mod engine;
mod error;
mod pair;

pub use cache::{AccountCache, AccountState, ObservationCache};
pub use debounce::{Debouncer, SweepSignal};
pub use engine::{Direction, RecordOutcome, SweepReport, SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use pair::{
    list_account_roots, list_record_stems, temp_path, RecordPaths, ARCHIVE_SUFFIX, ERRORS_DIR,
    SAV_EXTENSION, TEMP_SUFFIX, YAML_EXTENSION,
};
