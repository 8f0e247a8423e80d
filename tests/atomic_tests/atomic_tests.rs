//! Tests for operation units, replay and the log manager
//!
//! These tests verify:
//! - Capturing stamps every record with the unit id
//! - Commit frames a unit with start and end markers at consecutive LSNs
//! - Rollback reverses records across pages, newest first
//! - A failed commit keeps the unit's records for rollback or a resumed commit
//! - Aborted units are logged with a rolled-back end marker
//! - Forward replay applies only committed units
//! - Reverse replay of one unit from the log
//! - Log manager open / commit / reopen / checkpoint
//! - Config validation

use std::path::Path;

use pagewal::config::WalSyncStrategy;
use pagewal::replay::{replay_committed, rollback_unit, ReplayStats};
use pagewal::serializer::StringSerializer;
use pagewal::wal::{LogRecord, LogSink, WalEntry, WalReader, WalWriter};
use pagewal::{
    AtomicOperation, BinarySerializer, Bucket, BucketRead, BufferPool, Config, LogManager,
    PageHandleProvider, PageId, PageTable, PageWalError, RecordId, SerializerId,
};
use tempfile::TempDir;

const PAGE_SIZE: usize = 4096;

// =============================================================================
// Helper Functions
// =============================================================================

fn rid(n: i64) -> [u8; RecordId::SIZE] {
    RecordId::new(n as i16, n).to_bytes()
}

fn string_key(s: &str) -> Vec<u8> {
    StringSerializer.serialize(&s.to_string())
}

/// Table with empty leaf buckets on pages (0, 0) and (0, 1)
fn two_page_table(pool: &BufferPool) -> PageTable {
    let mut table = PageTable::new(pool.clone());
    for index in 0..2 {
        let handle = table.load_page(PageId::new(0, index)).unwrap();
        Bucket::new(handle).init(true);
    }
    table
}

fn keys(table: &mut PageTable, page_id: PageId) -> Vec<String> {
    let handle = table.load_page(page_id).unwrap();
    let bucket = Bucket::new(handle);
    (0..bucket.size())
        .map(|i| bucket.get_key(i, &StringSerializer).unwrap())
        .collect()
}

/// Insert `words` on page `page_id` and capture the records into `unit`
fn insert_words(
    table: &mut PageTable,
    unit: &mut AtomicOperation,
    page_id: PageId,
    words: &[&str],
) {
    let handle = table.load_page(page_id).unwrap();
    {
        let mut bucket = Bucket::new(handle);
        for word in words {
            let index = bucket.size();
            bucket
                .add_leaf_entry(index, &string_key(word), &rid(index as i64))
                .unwrap();
        }
    }
    unit.capture(handle);
}

/// In-memory log that accepts `budget` appends and fails every later one
struct LimitedLog {
    budget: usize,
    records: Vec<LogRecord>,
}

impl LimitedLog {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            records: Vec::new(),
        }
    }
}

impl LogSink for LimitedLog {
    fn append(&mut self, record: LogRecord) -> pagewal::Result<u64> {
        if self.budget == 0 {
            return Err(PageWalError::WalWrite("no space left on device".to_string()));
        }
        self.budget -= 1;
        self.records.push(record);
        Ok(self.records.len() as u64)
    }

    fn sync(&mut self) -> pagewal::Result<()> {
        Ok(())
    }
}

fn read_log(path: &Path) -> Vec<WalEntry> {
    WalReader::open(path)
        .unwrap()
        .entries()
        .collect::<pagewal::Result<Vec<_>>>()
        .unwrap()
}

// =============================================================================
// Capture / Commit Tests
// =============================================================================

#[test]
fn test_capture_stamps_unit_id() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);
    let mut unit = AtomicOperation::begin();

    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["a", "b"]);
    insert_words(&mut table, &mut unit, PageId::new(0, 1), &["c"]);

    assert_eq!(unit.records().len(), 3);
    assert!(!unit.unit_id().is_nil());
    assert!(unit
        .records()
        .iter()
        .all(|record| record.unit_id() == unit.unit_id()));
    assert!(table
        .get(PageId::new(0, 0))
        .unwrap()
        .page_operations()
        .is_empty());
}

#[test]
fn test_units_get_distinct_ids() {
    assert_ne!(
        AtomicOperation::begin().unit_id(),
        AtomicOperation::begin().unit_id()
    );
}

#[test]
fn test_commit_writes_framed_unit() {
    let temp = TempDir::new().unwrap();
    let wal_path = temp.path().join("unit.wal");
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    let unit_id = unit.unit_id();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["x", "y"]);

    let info = {
        let mut wal = WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 50 })
            .unwrap();
        let info = unit.commit(&mut wal).unwrap();
        assert_eq!(wal.uncommitted_count(), 0);
        info
    };

    assert_eq!(info.unit_id, unit_id);
    assert_eq!(info.first_lsn, 1);
    assert_eq!(info.last_lsn, 4);
    assert_eq!(info.records, 2);

    let entries = read_log(&wal_path);
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].record, LogRecord::UnitStart { unit_id });
    assert!(matches!(&entries[1].record, LogRecord::PageOperation(op) if op.unit_id() == unit_id));
    assert!(matches!(&entries[2].record, LogRecord::PageOperation(op) if op.unit_id() == unit_id));
    assert_eq!(
        entries[3].record,
        LogRecord::UnitEnd {
            unit_id,
            rolled_back: false
        }
    );
}

#[test]
fn test_failed_commit_keeps_records_for_rollback() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["a", "b"]);
    insert_words(&mut table, &mut unit, PageId::new(0, 1), &["c"]);

    // Start marker and first record make it, the second record does not
    let mut log = LimitedLog::new(2);
    let err = unit.commit(&mut log).unwrap_err();

    assert!(matches!(err, PageWalError::WalWrite(_)));
    assert!(!unit.is_committed());
    assert_eq!(unit.records().len(), 3);
    assert_eq!(log.records.len(), 2);

    assert_eq!(unit.rollback(&mut table).unwrap(), 3);
    assert!(keys(&mut table, PageId::new(0, 0)).is_empty());
    assert!(keys(&mut table, PageId::new(0, 1)).is_empty());
}

#[test]
fn test_commit_resumes_after_failure() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    let unit_id = unit.unit_id();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["a", "b"]);

    let mut log = LimitedLog::new(2);
    assert!(unit.commit(&mut log).is_err());

    log.budget = 10;
    let info = unit.commit(&mut log).unwrap();

    assert_eq!(info.first_lsn, 1);
    assert_eq!(info.last_lsn, 4);
    assert_eq!(info.records, 2);
    assert_eq!(log.records.len(), 4);
    assert_eq!(log.records[0], LogRecord::UnitStart { unit_id });
    assert_eq!(
        log.records[1],
        LogRecord::PageOperation(unit.records()[0].clone())
    );
    assert_eq!(
        log.records[2],
        LogRecord::PageOperation(unit.records()[1].clone())
    );
    assert_eq!(
        log.records[3],
        LogRecord::UnitEnd {
            unit_id,
            rolled_back: false
        }
    );
}

#[test]
fn test_committed_unit_rejects_second_commit_and_rollback() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["k"]);

    let mut log = LimitedLog::new(10);
    unit.commit(&mut log).unwrap();
    assert!(unit.is_committed());

    assert!(matches!(
        unit.commit(&mut log),
        Err(PageWalError::UnitCommitted { .. })
    ));
    assert_eq!(log.records.len(), 3);

    assert!(matches!(
        unit.rollback(&mut table),
        Err(PageWalError::UnitCommitted { .. })
    ));
    assert_eq!(keys(&mut table, PageId::new(0, 0)), vec!["k"]);
}

// =============================================================================
// Rollback Tests
// =============================================================================

#[test]
fn test_rollback_across_pages() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    // Committed state the rollback must return to
    let mut setup = AtomicOperation::begin();
    insert_words(&mut table, &mut setup, PageId::new(0, 0), &["keep"]);

    let mut unit = AtomicOperation::begin();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["drop1"]);
    insert_words(&mut table, &mut unit, PageId::new(0, 1), &["drop2", "drop3"]);
    {
        let handle = table.load_page(PageId::new(0, 0)).unwrap();
        Bucket::new(handle)
            .remove_leaf_entry(0, false, SerializerId::String)
            .unwrap();
        unit.capture(handle);
    }
    assert_eq!(keys(&mut table, PageId::new(0, 0)), vec!["drop1"]);

    let undone = unit.rollback(&mut table).unwrap();

    assert_eq!(undone, 4);
    assert_eq!(keys(&mut table, PageId::new(0, 0)), vec!["keep"]);
    assert!(keys(&mut table, PageId::new(0, 1)).is_empty());
}

#[test]
fn test_rollback_of_empty_unit() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    assert_eq!(AtomicOperation::begin().rollback(&mut table).unwrap(), 0);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_committed_skips_incomplete_and_rolled_back() {
    let temp = TempDir::new().unwrap();
    let wal_path = temp.path().join("replay.wal");
    let pool = BufferPool::new(PAGE_SIZE).unwrap();

    // Live run: build pages and log three units
    let mut live = two_page_table(&pool);
    let mut committed = AtomicOperation::begin();
    insert_words(&mut live, &mut committed, PageId::new(0, 0), &["alpha", "beta"]);
    insert_words(&mut live, &mut committed, PageId::new(0, 1), &["gamma"]);

    let mut aborted = AtomicOperation::begin();
    insert_words(&mut live, &mut aborted, PageId::new(0, 1), &["aborted"]);

    let mut unfinished = AtomicOperation::begin();
    insert_words(&mut live, &mut unfinished, PageId::new(0, 0), &["lost"]);
    {
        let mut wal = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        committed.commit(&mut wal).unwrap();

        let aborted_id = aborted.unit_id();
        wal.append(LogRecord::UnitStart {
            unit_id: aborted_id,
        })
        .unwrap();
        for record in aborted.records() {
            wal.append(LogRecord::PageOperation(record.clone())).unwrap();
        }
        wal.append(LogRecord::UnitEnd {
            unit_id: aborted_id,
            rolled_back: true,
        })
        .unwrap();

        // Crash before the end marker
        wal.append(LogRecord::UnitStart {
            unit_id: unfinished.unit_id(),
        })
        .unwrap();
        for record in unfinished.records() {
            wal.append(LogRecord::PageOperation(record.clone())).unwrap();
        }
    }
    live.close_all();

    // Recovery run: replay onto fresh empty buckets
    let mut recovered = two_page_table(&pool);
    let stats = replay_committed(&read_log(&wal_path), &mut recovered).unwrap();

    assert_eq!(
        stats,
        ReplayStats {
            operations_applied: 3,
            units_committed: 1,
            units_rolled_back: 1,
            units_incomplete: 1,
        }
    );
    assert_eq!(keys(&mut recovered, PageId::new(0, 0)), vec!["alpha", "beta"]);
    assert_eq!(keys(&mut recovered, PageId::new(0, 1)), vec!["gamma"]);
    assert!(recovered
        .get(PageId::new(0, 0))
        .unwrap()
        .page_operations()
        .is_empty());

    recovered.close_all();
    assert!(pool.clear().is_ok());
}

#[test]
fn test_rollback_unit_from_log() {
    let temp = TempDir::new().unwrap();
    let wal_path = temp.path().join("rollback.wal");
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    let mut first = AtomicOperation::begin();
    insert_words(&mut table, &mut first, PageId::new(0, 0), &["one"]);
    let mut second = AtomicOperation::begin();
    let second_id = second.unit_id();
    insert_words(&mut table, &mut second, PageId::new(0, 0), &["two"]);
    insert_words(&mut table, &mut second, PageId::new(0, 1), &["three"]);

    {
        let mut wal = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        first.commit(&mut wal).unwrap();
        second.commit(&mut wal).unwrap();
    }

    let undone = rollback_unit(&read_log(&wal_path), second_id, &mut table).unwrap();

    assert_eq!(undone, 2);
    assert_eq!(keys(&mut table, PageId::new(0, 0)), vec!["one"]);
    assert!(keys(&mut table, PageId::new(0, 1)).is_empty());
}

#[test]
fn test_replay_propagates_apply_errors() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut source = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    let unit_id = unit.unit_id();
    insert_words(&mut source, &mut unit, PageId::new(0, 0), &["a", "b"]);

    // Skip the first record so the second one lands out of bounds
    let entries = vec![
        WalEntry::new(1, LogRecord::UnitStart { unit_id }),
        WalEntry::new(2, LogRecord::PageOperation(unit.records()[1].clone())),
        WalEntry::new(
            3,
            LogRecord::UnitEnd {
                unit_id,
                rolled_back: false,
            },
        ),
    ];

    let mut target = two_page_table(&pool);
    let err = replay_committed(&entries, &mut target).unwrap_err();
    assert!(matches!(err, PageWalError::OutOfBounds { index: 1, size: 0 }));
}

// =============================================================================
// Log Manager Tests
// =============================================================================

fn manager_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .page_size(PAGE_SIZE)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

#[test]
fn test_log_manager_commit_and_recover() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");

    {
        let manager = LogManager::open(manager_config(&data_dir)).unwrap();
        assert!(manager.wal_path().exists());
        assert_eq!(manager.current_lsn(), 1);
        assert_eq!(manager.recovery_result().entries_recovered, 0);

        let pool = manager.new_buffer_pool().unwrap();
        assert_eq!(pool.page_size(), PAGE_SIZE);
        let mut table = two_page_table(&pool);

        let mut unit = AtomicOperation::begin();
        insert_words(&mut table, &mut unit, PageId::new(0, 1), &["persisted"]);
        let info = manager.commit(&mut unit).unwrap();
        assert_eq!(info.last_lsn, 3);
        manager.close().unwrap();
    }

    let manager = LogManager::open(manager_config(&data_dir)).unwrap();
    assert_eq!(manager.recovery_result().entries_recovered, 3);
    assert_eq!(manager.current_lsn(), 4);

    let entries = manager.take_recovered();
    assert_eq!(entries.len(), 3);
    assert!(manager.take_recovered().is_empty());

    let pool = manager.new_buffer_pool().unwrap();
    let mut table = two_page_table(&pool);
    let stats = replay_committed(&entries, &mut table).unwrap();
    assert_eq!(stats.operations_applied, 1);
    assert_eq!(keys(&mut table, PageId::new(0, 1)), vec!["persisted"]);
}

#[test]
fn test_log_manager_abort_logs_rolled_back_unit() {
    let temp = TempDir::new().unwrap();

    {
        let manager = LogManager::open(manager_config(temp.path())).unwrap();
        let pool = manager.new_buffer_pool().unwrap();
        let mut table = two_page_table(&pool);

        let mut kept = AtomicOperation::begin();
        insert_words(&mut table, &mut kept, PageId::new(0, 0), &["kept"]);
        manager.commit(&mut kept).unwrap();

        let mut dropped = AtomicOperation::begin();
        insert_words(&mut table, &mut dropped, PageId::new(0, 0), &["dropped"]);
        insert_words(&mut table, &mut dropped, PageId::new(0, 1), &["dropped"]);

        assert_eq!(manager.abort(dropped, &mut table).unwrap(), 2);
        assert_eq!(keys(&mut table, PageId::new(0, 0)), vec!["kept"]);
        assert!(keys(&mut table, PageId::new(0, 1)).is_empty());
    }

    let manager = LogManager::open(manager_config(temp.path())).unwrap();
    let entries = manager.take_recovered();
    assert!(matches!(
        entries.last().map(|entry| &entry.record),
        Some(LogRecord::UnitEnd {
            rolled_back: true,
            ..
        })
    ));

    let pool = manager.new_buffer_pool().unwrap();
    let mut table = two_page_table(&pool);
    let stats = replay_committed(&entries, &mut table).unwrap();

    assert_eq!(stats.units_committed, 1);
    assert_eq!(stats.units_rolled_back, 1);
    assert_eq!(stats.operations_applied, 1);
    assert_eq!(keys(&mut table, PageId::new(0, 0)), vec!["kept"]);
}

#[test]
fn test_aborting_after_failed_commit_marks_logged_records() {
    let pool = BufferPool::new(PAGE_SIZE).unwrap();
    let mut table = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    let unit_id = unit.unit_id();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["a", "b"]);

    let mut log = LimitedLog::new(2);
    assert!(unit.commit(&mut log).is_err());

    log.budget = 10;
    assert_eq!(unit.abort(&mut table, &mut log).unwrap(), 2);

    // No second start marker: the end marker closes the partial unit
    assert_eq!(log.records.len(), 3);
    assert_eq!(log.records[0], LogRecord::UnitStart { unit_id });
    assert_eq!(
        log.records[2],
        LogRecord::UnitEnd {
            unit_id,
            rolled_back: true
        }
    );
    assert!(keys(&mut table, PageId::new(0, 0)).is_empty());
}

#[test]
fn test_log_manager_checkpoint() {
    let temp = TempDir::new().unwrap();
    let manager = LogManager::open(manager_config(temp.path())).unwrap();
    let pool = manager.new_buffer_pool().unwrap();
    let mut table = two_page_table(&pool);

    let mut unit = AtomicOperation::begin();
    insert_words(&mut table, &mut unit, PageId::new(0, 0), &["k"]);
    manager.commit(&mut unit).unwrap();
    assert_eq!(manager.current_lsn(), 4);

    manager.checkpoint().unwrap();

    assert_eq!(manager.current_lsn(), 1);
    assert!(read_log(manager.wal_path()).is_empty());
}

#[test]
fn test_log_manager_cuts_torn_tail_on_open() {
    let temp = TempDir::new().unwrap();
    let config = manager_config(temp.path());

    {
        let manager = LogManager::open(config.clone()).unwrap();
        let pool = manager.new_buffer_pool().unwrap();
        let mut table = two_page_table(&pool);
        let mut unit = AtomicOperation::begin();
        insert_words(&mut table, &mut unit, PageId::new(0, 0), &["k"]);
        manager.commit(&mut unit).unwrap();
    }

    let wal_path = temp.path().join("wal.log");
    let mut bytes = std::fs::read(&wal_path).unwrap();
    bytes.extend_from_slice(&[0xFF; 3]);
    std::fs::write(&wal_path, &bytes).unwrap();

    let manager = LogManager::open(config).unwrap();
    assert!(manager.recovery_result().was_truncated);
    assert_eq!(manager.recovery_result().entries_recovered, 3);
    assert_eq!(
        std::fs::metadata(&wal_path).unwrap().len(),
        bytes.len() as u64 - 3
    );
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_defaults_are_valid() {
    let config = Config::default();

    assert_eq!(config.page_size, pagewal::config::DEFAULT_PAGE_SIZE);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_invalid_values() {
    let tiny = Config::builder().page_size(16).build();
    assert!(matches!(tiny.validate(), Err(PageWalError::Config(_))));

    let no_sync = Config::builder()
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 0 })
        .build();
    assert!(matches!(no_sync.validate(), Err(PageWalError::Config(_))));

    let temp = TempDir::new().unwrap();
    let bad = Config::builder()
        .data_dir(temp.path())
        .page_size(16)
        .build();
    assert!(LogManager::open(bad).is_err());
}
