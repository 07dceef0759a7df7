//! Incremental indexing of a directory tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::chunker::Chunker;
use super::decision::{Assessment, Horizons};
use super::extract::extract_text;
use super::filter::FileFilter;
use super::fingerprint::{digest_file, HashPolicy};
use super::progress::{IndexProgress, IndexStats, IndexSummary};
use crate::config::DEFAULT_EXCLUDES;
use crate::error::IndexError;
use crate::storage::{
    delete_files, get_file, list_paths_under, mark_indexed, now_unix, record_digest, record_error,
    replace_chunks, touch_file, upsert_file, with_savepoint, ChunkRecord, Database, FileStat,
    PathScope,
};
use crate::Result;

/// Knobs for one index run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Directories whose path contains any of these are skipped.
    pub excludes: Vec<String>,
    /// Bytes read from the start of each text file.
    pub max_read_bytes: u64,
    /// Files committed per transaction.
    pub batch_size: usize,
    /// Chunk length in characters.
    pub chunk_size: usize,
    /// Delete stored files under the root that the walk did not find.
    pub prune_missing: bool,
    /// Days before an index pass is considered stale (0 = never).
    pub reindex_horizon_days: u32,
    /// Days before a digest is recomputed (0 = every slow-path visit).
    pub verify_hash_horizon_days: u32,
    /// Hash large files in full instead of sampling them.
    pub force_full_hash_on_large: bool,
    pub hashing: HashPolicy,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            excludes: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            max_read_bytes: 200_000,
            batch_size: 200,
            chunk_size: super::chunker::DEFAULT_CHUNK_SIZE,
            prune_missing: false,
            reindex_horizon_days: 30,
            verify_hash_horizon_days: 7,
            force_full_hash_on_large: false,
            hashing: HashPolicy::default(),
        }
    }
}

/// Walks a root and keeps the store in step with it.
pub struct Indexer {
    db: Database,
    options: IndexOptions,
    filter: FileFilter,
    chunker: Chunker,
    horizons: Horizons,
}

impl Indexer {
    /// Create a new indexer writing through `db`.
    #[must_use]
    pub fn new(db: Database, options: IndexOptions) -> Self {
        Self {
            filter: FileFilter::new(&options.excludes),
            chunker: Chunker::new(options.chunk_size),
            horizons: Horizons::from_days(
                options.reindex_horizon_days,
                options.verify_hash_horizon_days,
            ),
            db,
            options,
        }
    }

    /// Options this indexer runs with.
    #[must_use]
    pub const fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Index every regular file under `root`.
    ///
    /// Work is committed every `batch_size` files, after which `on_progress`
    /// receives cumulative counters. `cancel` is checked before each walk
    /// entry; on cancellation the current batch is still committed and the
    /// summary is flagged `cancelled`. A final notification with `done` set is
    /// always sent on success.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::InvalidRoot` if `root` is not a readable directory,
    /// or a storage error if a commit fails. Per-file I/O failures are recorded
    /// against the file and do not fail the run.
    pub fn index_root<F>(
        &self,
        root: &Path,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<IndexSummary>
    where
        F: FnMut(&IndexProgress),
    {
        let root = validate_root(root)?;
        let span = tracing::info_span!("index_root", root = %root.display());
        let _guard = span.enter();

        let stats = IndexStats::new();
        let batch_size = self.options.batch_size.max(1);

        let mut missing = if self.options.prune_missing {
            let scope = PathScope::new(&root);
            Some(self.db.with_conn(|conn| list_paths_under(conn, &scope))?)
        } else {
            None
        };

        tracing::info!(
            batch_size,
            prune = self.options.prune_missing,
            "Starting index run"
        );

        let mut walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.depth() > 0
                    && e.file_type().is_dir()
                    && self.filter.is_excluded_dir(&root, e.path()))
            });
        let mut exhausted = false;

        while !exhausted {
            if cancel.is_cancelled() {
                stats.mark_cancelled();
                break;
            }

            self.db.with_transaction(|conn| {
                let mut in_batch = 0;
                while in_batch < batch_size {
                    if cancel.is_cancelled() {
                        stats.mark_cancelled();
                        break;
                    }

                    let Some(entry) = walker.next() else {
                        exhausted = true;
                        break;
                    };

                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unreadable walk entry");
                            if let Some(missing) = missing.as_mut() {
                                match e.path() {
                                    Some(path) => spare_subtree(missing, path),
                                    None => {
                                        tracing::info!("Walk error without a path, skipping prune");
                                        missing.clear();
                                    }
                                }
                            }
                            continue;
                        }
                    };

                    if !entry.file_type().is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Some(missing) = missing.as_mut() {
                        missing.remove(path.to_string_lossy().as_ref());
                    }

                    self.visit_guarded(conn, path, &stats)?;
                    in_batch += 1;
                }
                Ok(())
            })?;

            on_progress(&stats.snapshot(false));
        }

        if let Some(missing) = missing {
            if stats.is_cancelled() {
                tracing::info!(candidates = missing.len(), "Run cancelled, skipping prune");
            } else {
                self.prune(&missing, &stats)?;
            }
        }

        let summary = stats.summary();
        on_progress(&stats.snapshot(true));

        tracing::info!(
            files_seen = summary.files_seen,
            files_indexed = summary.files_indexed,
            chunks_written = summary.chunks_written,
            files_hashed = summary.files_hashed,
            files_failed = summary.files_failed,
            files_pruned = summary.files_pruned,
            cancelled = summary.cancelled,
            "Index run complete"
        );

        Ok(summary)
    }

    /// Visit one file inside a savepoint, recording transient failures.
    fn visit_guarded(&self, conn: &Connection, path: &Path, stats: &IndexStats) -> Result<()> {
        IndexStats::bump(&stats.files_seen);

        match with_savepoint(conn, "visit", |conn| self.visit(conn, path, stats)) {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to index file");
                IndexStats::bump(&stats.files_failed);
                record_error(conn, &path.to_string_lossy(), now_unix())?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn visit(&self, conn: &Connection, path: &Path, stats: &IndexStats) -> Result<()> {
        let now = now_unix();
        let key = path.to_string_lossy();
        let stat = FileStat::from_metadata(&std::fs::symlink_metadata(path)?);
        let prev = get_file(conn, &key)?;

        let assessment = Assessment::new(prev.as_ref(), &stat, self.horizons, now);
        if assessment.is_fast_path() {
            return touch_file(conn, &key, now);
        }

        let file_id = upsert_file(conn, &key, &stat, now)?;

        let same_content = if assessment.needs_verify(prev.as_ref(), self.horizons, now) {
            let size = u64::try_from(stat.size).unwrap_or(0);
            let digest = digest_file(
                path,
                size,
                !self.options.force_full_hash_on_large,
                &self.options.hashing,
            )?;
            IndexStats::bump(&stats.files_hashed);

            let same = assessment.same_content(prev.as_ref(), Some(&digest));
            record_digest(conn, file_id, &digest, now)?;
            same
        } else {
            assessment.same_content(prev.as_ref(), None)
        };

        if same_content {
            tracing::trace!(path = %key, "Content unchanged, skipping extraction");
            return Ok(());
        }

        let records = self.chunk_records(path, file_id);
        let written = replace_chunks(conn, file_id, &records)?;
        mark_indexed(conn, file_id, now)?;

        IndexStats::bump(&stats.files_indexed);
        stats
            .chunks_written
            .fetch_add(written as u64, std::sync::atomic::Ordering::Relaxed);

        tracing::debug!(path = %key, chunks = written, "Indexed file");
        Ok(())
    }

    /// Extract and chunk a file; non-text and unreadable files yield no chunks.
    #[allow(clippy::cast_possible_wrap)]
    fn chunk_records(&self, path: &Path, file_id: i64) -> Vec<ChunkRecord> {
        if !FileFilter::is_text_eligible(path) {
            return Vec::new();
        }

        let Some(text) = extract_text(path, self.options.max_read_bytes) else {
            return Vec::new();
        };

        self.chunker
            .chunk(&text)
            .into_iter()
            .map(|s| {
                ChunkRecord::new(
                    file_id,
                    s.ordinal as i64,
                    s.text,
                    s.byte_from as i64,
                    s.byte_to as i64,
                )
            })
            .collect()
    }

    fn prune(&self, missing: &HashSet<String>, stats: &IndexStats) -> Result<()> {
        if missing.is_empty() {
            return Ok(());
        }

        let deleted = self
            .db
            .with_transaction(|conn| delete_files(conn, missing.iter().map(String::as_str)))?;
        stats
            .files_pruned
            .store(deleted as u64, std::sync::atomic::Ordering::Relaxed);

        tracing::info!(count = deleted, "Pruned missing files");
        Ok(())
    }
}

/// Index `root` with a one-off [`Indexer`].
///
/// # Errors
///
/// See [`Indexer::index_root`].
pub fn index_root<F>(
    db: &Database,
    root: &Path,
    options: IndexOptions,
    cancel: &CancellationToken,
    on_progress: F,
) -> Result<IndexSummary>
where
    F: FnMut(&IndexProgress),
{
    Indexer::new(db.clone(), options).index_root(root, cancel, on_progress)
}

/// Keep stored paths at or below an unreadable walk entry out of the prune
/// set; they were not seen, but that does not mean they are gone.
fn spare_subtree(missing: &mut HashSet<String>, path: &Path) {
    let key = path.to_string_lossy();
    let scope = PathScope::new(path);
    missing.retain(|stored| stored.as_str() != key.as_ref() && !scope.contains(stored));
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    let canonical = root
        .canonicalize()
        .map_err(|e| IndexError::invalid_root(root, e.to_string()))?;

    if !canonical.is_dir() {
        return Err(IndexError::invalid_root(root, "not a directory").into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::{count_chunks, get_chunks_for_file, migrate, FileStatus};
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| migrate(conn)).unwrap();
        db
    }

    fn run(indexer: &Indexer, root: &Path) -> IndexSummary {
        indexer
            .index_root(root, &CancellationToken::new(), |_| {})
            .unwrap()
    }

    fn stored(db: &Database, path: &Path) -> Option<crate::storage::FileEntry> {
        let key = path.to_string_lossy().to_string();
        db.with_conn(|conn| get_file(conn, &key)).unwrap()
    }

    #[test]
    fn test_index_text_file() {
        let db = setup_test_db();
        let indexer = Indexer::new(db.clone(), IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::write(root.join("notes.txt"), "Hello hello\nworld").unwrap();

        let summary = run(&indexer, &root);
        assert_eq!(summary.files_seen, 1);
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.chunks_written, 1);
        assert_eq!(summary.files_hashed, 1);
        assert!(!summary.cancelled);

        let entry = stored(&db, &root.join("notes.txt")).unwrap();
        assert!(entry.digest.is_some());
        assert!(entry.last_indexed_at.is_some());
        let chunks = db
            .with_conn(|conn| get_chunks_for_file(conn, entry.id))
            .unwrap();
        assert_eq!(chunks[0].text, "hello hello world");
    }

    #[test]
    fn test_rerun_takes_fast_path() {
        let db = setup_test_db();
        let indexer = Indexer::new(db, IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        fs::write(tmp.path().join("b.md"), "beta").unwrap();

        run(&indexer, tmp.path());
        let second = run(&indexer, tmp.path());

        assert_eq!(second.files_seen, 2);
        assert_eq!(second.files_hashed, 0);
        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.chunks_written, 0);
    }

    #[test]
    fn test_changed_file_is_rehashed_and_rechunked() {
        let db = setup_test_db();
        let indexer = Indexer::new(db.clone(), IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let file = root.join("a.txt");
        fs::write(&file, "first version").unwrap();
        run(&indexer, &root);
        let before = stored(&db, &file).unwrap();

        fs::write(&file, "the second, longer version").unwrap();
        let summary = run(&indexer, &root);
        let after = stored(&db, &file).unwrap();

        assert_eq!(summary.files_hashed, 1);
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(before.id, after.id);
        assert_ne!(before.digest, after.digest);
        let chunks = db
            .with_conn(|conn| get_chunks_for_file(conn, after.id))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "the second, longer version");
    }

    #[test]
    fn test_non_text_file_indexed_without_chunks() {
        let db = setup_test_db();
        let indexer = Indexer::new(db.clone(), IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::write(root.join("image.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let summary = run(&indexer, &root);
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.chunks_written, 0);

        let entry = stored(&db, &root.join("image.png")).unwrap();
        assert!(entry.last_indexed_at.is_some());
        assert_eq!(entry.status, FileStatus::Ok);
    }

    #[test]
    fn test_excluded_directories_are_skipped() {
        let db = setup_test_db();
        let indexer = Indexer::new(db.clone(), IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
        fs::write(tmp.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(tmp.path().join("keep.js"), "y").unwrap();

        let summary = run(&indexer, tmp.path());
        assert_eq!(summary.files_seen, 1);
        assert_eq!(db.with_conn(|conn| count_chunks(conn)).unwrap(), 1);
    }

    #[test]
    fn test_root_inside_excluded_name_is_walked_in_full() {
        let db = setup_test_db();
        let indexer = Indexer::new(db, IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap().join("build").join("proj");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("top.txt"), "top").unwrap();
        fs::write(root.join("src/inner.txt"), "inner").unwrap();
        fs::write(root.join("build/out.txt"), "artifact").unwrap();

        let summary = run(&indexer, &root);
        assert_eq!(summary.files_seen, 2);
    }

    #[test]
    fn test_multiple_chunks_and_small_batches() {
        let db = setup_test_db();
        let options = IndexOptions {
            batch_size: 1,
            chunk_size: 4,
            ..IndexOptions::default()
        };
        let indexer = Indexer::new(db, options);
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "abcdefghij").unwrap();
        fs::write(tmp.path().join("b.txt"), "abc").unwrap();

        let mut notifications = Vec::new();
        let summary = indexer
            .index_root(tmp.path(), &CancellationToken::new(), |p| {
                notifications.push(*p);
            })
            .unwrap();

        assert_eq!(summary.chunks_written, 4);
        let last = notifications.last().unwrap();
        assert!(last.done);
        assert_eq!(last.files_seen, 2);
        assert!(notifications[..notifications.len() - 1].iter().all(|p| !p.done));
        assert!(notifications.len() >= 3);
    }

    #[test]
    fn test_precancelled_run_does_nothing() {
        let db = setup_test_db();
        let indexer = Indexer::new(
            db.clone(),
            IndexOptions {
                prune_missing: true,
                ..IndexOptions::default()
            },
        );
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let summary = indexer.index_root(tmp.path(), &token, |_| {}).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.files_seen, 0);
        assert_eq!(summary.files_pruned, 0);
    }

    #[test]
    fn test_invalid_root() {
        let db = setup_test_db();
        let indexer = Indexer::new(db, IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        for root in [tmp.path().join("missing"), file] {
            let err = indexer
                .index_root(&root, &CancellationToken::new(), |_| {})
                .unwrap_err();
            assert!(matches!(err, Error::Index(IndexError::InvalidRoot { .. })));
        }
    }

    #[test]
    fn test_spare_subtree_keeps_descendants() {
        let mut missing: HashSet<String> = [
            "/no-such-root/locked/a.txt",
            "/no-such-root/locked/deep/b.txt",
            "/no-such-root/locked-not/c.txt",
            "/no-such-root/gone.txt",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        spare_subtree(&mut missing, Path::new("/no-such-root/locked"));

        let mut left: Vec<_> = missing.into_iter().collect();
        left.sort();
        assert_eq!(
            left,
            vec!["/no-such-root/gone.txt", "/no-such-root/locked-not/c.txt"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_dir_is_not_pruned() {
        use std::os::unix::fs::PermissionsExt;

        let db = setup_test_db();
        let options = IndexOptions {
            prune_missing: true,
            ..IndexOptions::default()
        };
        let indexer = Indexer::new(db.clone(), options);
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("kept.txt"), "still here").unwrap();
        fs::write(root.join("gone.txt"), "deleted later").unwrap();
        run(&indexer, &root);

        fs::remove_file(root.join("gone.txt")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user (e.g. root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let summary = run(&indexer, &root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(summary.files_pruned, 1);
        assert!(stored(&db, &locked.join("kept.txt")).is_some());
        assert!(stored(&db, &root.join("gone.txt")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_indexed() {
        let db = setup_test_db();
        let indexer = Indexer::new(db, IndexOptions::default());
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "outside").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            tmp.path().join("file-link.txt"),
        )
        .unwrap();

        let summary = run(&indexer, tmp.path());
        assert_eq!(summary.files_seen, 0);
    }
}
