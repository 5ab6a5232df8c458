//! The copy loop: scan the source, read each key, write it to the destination.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info, warn};

use crate::{
    config::{ErrorPolicy, ExistingKeyPolicy, SyncConfig, SyncOptions, TtlPolicy},
    errors::{StoreRole, SyncError},
    record::display_key,
    report::{CopyOutcome, KeyFailure, SyncReport},
    store::{RedisStore, SourceStore, TargetStore},
};

/// Copies every matching key from `source` into `destination`.
///
/// The runner borrows both stores for the duration of the run; the caller
/// owns the connections and releases them when they go out of scope.
pub struct SyncRunner<'a, S, D>
where
    S: SourceStore,
    D: TargetStore,
{
    source: &'a mut S,
    destination: &'a mut D,
    options: &'a SyncOptions,
}

impl<'a, S, D> SyncRunner<'a, S, D>
where
    S: SourceStore,
    D: TargetStore,
{
    pub fn new(source: &'a mut S, destination: &'a mut D, options: &'a SyncOptions) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Run the copy to completion.
    ///
    /// Scan failures, fatal store errors, a missing marker key and, under
    /// `ErrorPolicy::Abort`, the first per-key failure end the run with an
    /// error. Other per-key failures are collected in the report.
    ///
    /// `SCAN` may return a key more than once, so every key name seen is
    /// kept until the run ends: memory grows with the number of matching
    /// keys, not with their values. Narrow `pattern` to bound it on very
    /// large keyspaces.
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        self.options.validate()?;

        let started = Instant::now();
        let mut report = SyncReport::new(self.options.dry_run);

        if let Some(marker) = &self.options.require_marker {
            if !self.source.exists(marker.as_bytes()).await? {
                return Err(SyncError::MissingMarker { key: marker.clone() });
            }
            debug!("marker key '{marker}' present in source");
        }

        info!(
            "syncing keys matching '{}' (ttl: {:?}, existing: {:?}, on error: {:?}{})",
            self.options.pattern,
            self.options.ttl,
            self.options.existing,
            self.options.on_error,
            if self.options.dry_run { ", dry run" } else { "" }
        );

        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys) = self
                .source
                .scan(cursor, &self.options.pattern, self.options.scan_count)
                .await?;

            for key in keys {
                if !seen.insert(key.clone()) {
                    continue;
                }
                report.scanned += 1;

                match self.copy_key(&key).await {
                    Ok(outcome) => {
                        debug!("{}: {:?}", display_key(&key), outcome);
                        report.record(outcome);
                    }
                    Err(err) if err.is_fatal() || self.options.on_error == ErrorPolicy::Abort => {
                        warn!("aborting at key '{}': {err}", display_key(&key));
                        return Err(err);
                    }
                    Err(err) => {
                        warn!("failed to copy '{}': {err}", display_key(&key));
                        report.record_failure(KeyFailure::new(&key, &err));
                    }
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "sync finished in {}ms: {} scanned, {} copied, {} skipped, {} vanished, {} failed",
            report.elapsed_ms,
            report.scanned,
            report.copied,
            report.skipped,
            report.vanished,
            report.failed_count()
        );

        Ok(report)
    }

    async fn copy_key(&mut self, key: &[u8]) -> Result<CopyOutcome, SyncError> {
        if self.options.existing == ExistingKeyPolicy::Skip && self.destination.exists(key).await? {
            return Ok(CopyOutcome::Skipped);
        }

        // PTTL is sampled after this instant, so the aged TTL never outlives the source.
        let read_started = Instant::now();
        let Some(mut record) = self.source.read(key).await? else {
            return Ok(CopyOutcome::Vanished);
        };

        if !record.age_ttl(read_started.elapsed()) {
            debug!("{} expired while it was being copied", display_key(key));
            return Ok(CopyOutcome::Vanished);
        }

        if self.options.ttl == TtlPolicy::Drop {
            record.ttl = None;
        }

        if !self.options.dry_run {
            self.destination.write(&record).await?;
        }

        Ok(CopyOutcome::Copied)
    }
}

/// Open the source and destination stores described by `config`.
///
/// Both connections are established before anything is read or written, so
/// an unreachable destination leaves it untouched.
pub async fn connect(config: &SyncConfig) -> Result<(RedisStore, RedisStore), SyncError> {
    config.validate()?;

    let source = RedisStore::connect(StoreRole::Source, &config.source, config.connect_timeout).await?;
    let destination = RedisStore::connect(StoreRole::Destination, &config.destination, config.connect_timeout)
        .await?
        .with_write_chunk(config.options.write_chunk);

    Ok((source, destination))
}

/// Connect to both instances in `config` and copy.
pub async fn sync(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let (mut source, mut destination) = connect(config).await?;

    SyncRunner::new(&mut source, &mut destination, &config.options)
        .run()
        .await
}
