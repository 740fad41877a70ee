use threedai_backend::BackendChoice;
use threedai_server::{ArtifactLayout, ProcessStatus, ResultStore, StoreError};

#[test]
fn record_lifecycle_is_persisted() {
    let root = tempfile::tempdir().unwrap();
    let store = ResultStore::open(root.path().join("results")).unwrap();
    let id = ResultStore::new_process_id();

    let input = store.save_input(&id, b"jpeg bytes").unwrap();
    assert_eq!(root.path().join("results").join(&id).join("input.jpg"), input);
    assert_eq!(b"jpeg bytes".to_vec(), std::fs::read(&input).unwrap());

    let layout = ArtifactLayout::new("sample_gs.mp4", "sample.ply");
    let record = store.create_record(&id, BackendChoice::Trellis, &layout).unwrap();
    assert_eq!(ProcessStatus::Pending, record.status);
    assert_eq!(id, record.process_id);

    let done = store.mark_done(&id).unwrap();
    assert_eq!(ProcessStatus::Done, done.status);
    assert_eq!(record.created_at, done.created_at);

    let reloaded = store.record(&id).unwrap();
    assert_eq!(done, reloaded);
    assert_eq!(BackendChoice::Trellis, reloaded.backend);
    assert_eq!(root.path().join("results").join(&id).join("sample_gs.mp4"), store.video_path(&id).unwrap());
    assert_eq!(root.path().join("results").join(&id).join("sample.ply"), store.model_path(&id).unwrap());
    assert_eq!(root.path().join("results").join(&id).join("native"), store.work_dir(&id).unwrap());
}

#[test]
fn failure_message_is_recorded() {
    let root = tempfile::tempdir().unwrap();
    let store = ResultStore::open(root.path()).unwrap();
    let id = ResultStore::new_process_id();
    store
        .create_record(&id, BackendChoice::Hunyuan, &ArtifactLayout::new("output.mp4", "output.glb"))
        .unwrap();

    let failed = store.mark_failed(&id, "pipeline exited with 1").unwrap();
    assert_eq!(ProcessStatus::Failed, failed.status);
    assert_eq!(Some("pipeline exited with 1"), store.record(&id).unwrap().error.as_deref());
}

#[test]
fn rejects_ids_that_are_not_uuids() {
    let root = tempfile::tempdir().unwrap();
    let store = ResultStore::open(root.path()).unwrap();

    for id in ["", "../etc", "abc", "..%2F..%2Fetc%2Fpasswd"] {
        let err = store.process_dir(id).unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)), "{id:?}: {err:?}");
        assert!(err.is_not_found());
    }
}

#[test]
fn unknown_process_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let store = ResultStore::open(root.path()).unwrap();
    let id = ResultStore::new_process_id();

    let err = store.video_path(&id).unwrap_err();
    assert!(matches!(err, StoreError::UnknownProcess(_)), "{err:?}");
    assert!(err.is_not_found());
}

#[test]
fn process_ids_are_distinct() {
    let a = ResultStore::new_process_id();
    let b = ResultStore::new_process_id();
    assert_ne!(a, b);
    assert_eq!(36, a.len());
}

#[test]
fn allocate_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let store = ResultStore::open(root.path()).unwrap();
    let id = ResultStore::new_process_id();

    let first = store.allocate(&id).unwrap();
    let second = store.allocate(&id).unwrap();
    assert_eq!(first, second);
    assert!(first.is_dir());
}
