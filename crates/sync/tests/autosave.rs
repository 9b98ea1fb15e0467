use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scratchpad_core::ScratchScope;
use scratchpad_project::{SessionRecord, StoreOptions, WorkspaceStore};
use scratchpad_sync::{
    signals, BufferSessionTracker, EditorHost, ScratchSignal, SignalReceiver, StoreBackedHost,
    SyncOptions,
};
use tempfile::{tempdir, TempDir};
use tokio::runtime::Handle;

struct Fixture {
    _tmp: TempDir,
    store: Arc<WorkspaceStore>,
    host: Arc<StoreBackedHost>,
    tracker: BufferSessionTracker,
    signals: SignalReceiver,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempdir().unwrap();
        let store = Arc::new(WorkspaceStore::new(
            tmp.path().join("global"),
            StoreOptions::default(),
        ));
        let host = Arc::new(StoreBackedHost::new(Arc::clone(&store)));
        let (tx, rx) = signals::channel();
        let tracker = BufferSessionTracker::new(
            Arc::clone(&store),
            host.clone(),
            tx,
            &SyncOptions::default(),
            Handle::current(),
        );
        Self {
            _tmp: tmp,
            store,
            host,
            tracker,
            signals: rx,
        }
    }

    fn scratch(&self, content: &str) -> PathBuf {
        self.store
            .create_file(ScratchScope::Global, Some(content))
            .unwrap()
            .unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_save_once_with_last_content() {
    let mut fx = Fixture::new();
    let file = fx.scratch("v0");
    let buffer = fx.host.open_document(&file).unwrap();
    assert!(fx.tracker.track(&file, buffer));

    for n in 1..=5 {
        fx.host.set_text(buffer, format!("v{n}")).unwrap();
        assert!(fx.tracker.buffer_changed(buffer));
        tokio::time::advance(Duration::from_millis(200)).await;
    }
    assert_eq!(fx.host.save_count(), 0);
    assert!(fx.tracker.is_save_pending(&file));

    match fx.signals.recv().await {
        Some(ScratchSignal::AutoSaved(saved)) => assert_eq!(saved, file),
        other => panic!("unexpected signal: {other:?}"),
    }
    assert_eq!(fx.host.save_count(), 1);
    assert_eq!(fs::read_to_string(&file).unwrap(), "v5");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.host.save_count(), 1);
    assert!(fx.signals.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn untrack_cancels_in_flight_save() {
    let mut fx = Fixture::new();
    let file = fx.scratch("original");
    let buffer = fx.host.open_document(&file).unwrap();
    fx.tracker.track(&file, buffer);

    fx.host.set_text(buffer, "edited").unwrap();
    fx.tracker.buffer_changed(buffer);
    tokio::time::advance(Duration::from_millis(500)).await;
    assert!(fx.tracker.untrack(&file));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.host.save_count(), 0);
    assert!(fx.signals.try_recv().is_err());
    assert_eq!(fs::read_to_string(&file).unwrap(), "original");
}

#[tokio::test(start_paused = true)]
async fn edits_to_separate_files_save_independently() {
    let mut fx = Fixture::new();
    let first = fx.scratch("a");
    let second = fx.scratch("b");
    let first_buffer = fx.host.open_document(&first).unwrap();
    let second_buffer = fx.host.open_document(&second).unwrap();
    fx.tracker.track(&first, first_buffer);
    fx.tracker.track(&second, second_buffer);

    fx.host.set_text(first_buffer, "a1").unwrap();
    fx.tracker.buffer_changed(first_buffer);
    fx.host.set_text(second_buffer, "b1").unwrap();
    fx.tracker.buffer_changed(second_buffer);

    let mut saved = Vec::new();
    for _ in 0..2 {
        match fx.signals.recv().await {
            Some(ScratchSignal::AutoSaved(path)) => saved.push(path),
            other => panic!("unexpected signal: {other:?}"),
        }
    }
    saved.sort();
    assert_eq!(saved, vec![first.clone(), second.clone()]);
    assert_eq!(fs::read_to_string(&first).unwrap(), "a1");
    assert_eq!(fs::read_to_string(&second).unwrap(), "b1");
}

#[tokio::test]
async fn restore_drops_vanished_paths() {
    let fx = Fixture::new();
    let kept = fx.scratch("kept");
    let gone = fx.store.roots().global().join("scratch99.txt");

    let mut record = SessionRecord::default();
    record.insert(&kept);
    record.insert(&gone);
    fx.store.write_session_record(&record).unwrap();

    let restored = fx.tracker.restore_session().unwrap();
    assert_eq!(restored, vec![kept.clone()]);
    assert!(fx.tracker.is_tracked(&kept));
    assert!(!fx.tracker.is_tracked(&gone));
    assert_eq!(fx.host.open_buffers(), 1);
    assert_eq!(fx.store.read_session_record().open_files, vec![kept]);
}

#[tokio::test]
async fn restore_with_malformed_record_is_empty() {
    let fx = Fixture::new();
    fx.store.ensure_root(ScratchScope::Global).unwrap();
    fs::write(fx.store.session().path(), "not json").unwrap();

    assert!(fx.tracker.restore_session().unwrap().is_empty());
    assert!(fx.tracker.tracked_paths().is_empty());
}
