use pdf_binder::settings::SearchSettings;
use pdf_binder::test_utils::test_helpers::{MockBackend, MockPdf};
use pdf_binder::{Binder, TextCache};

#[test]
fn binder_survives_a_restart_and_searches_again() {
    let dir = tempfile::tempdir().unwrap();
    let binder_file = dir.path().join("binder.json");
    let pdf_file = dir.path().join("1-pump-manual.pdf");
    std::fs::write(
        &pdf_file,
        MockPdf::from_pages(&["Pump overview", "Replace the impeller seal yearly"]).to_bytes(),
    )
    .unwrap();

    let backend = MockBackend::new();
    let id = {
        let cache = TextCache::new();
        let mut binder = Binder::load_or_new(&binder_file);
        let id = binder.import_path(&pdf_file, backend.as_ref(), &cache).unwrap();
        binder.save().unwrap();
        id
    };

    // Fresh process: empty text cache, blobs read back from disk
    let cache = TextCache::new();
    let mut binder = Binder::load_from_file(&binder_file).unwrap();
    assert_eq!(binder.find(&id).unwrap().0.id, "tab-1");
    let handles = binder.handles();
    assert_eq!(handles.len(), 1);
    cache.warm_all(backend.as_ref(), &handles);

    let results = binder.search_all("impeller", &cache, &SearchSettings::default());
    assert!(results.filename_matches.is_empty());
    assert_eq!(results.content_matches.len(), 1);
    assert_eq!(
        results.content_matches[0].snippet,
        "Pump overview\nReplace the <mark>impeller</mark> seal yearly"
    );

    let by_name = binder.search_all("PUMP-man", &cache, &SearchSettings::default());
    assert_eq!(
        by_name.filename_matches[0].highlighted_name,
        "1-<mark>pump-man</mark>ual.pdf"
    );
}

#[test]
fn missing_binder_file_starts_with_default_tabs() {
    let dir = tempfile::tempdir().unwrap();
    let binder = Binder::load_from_file(&dir.path().join("none.json")).unwrap();
    assert_eq!(binder.tabs().len(), 3);
    assert_eq!(binder.documents().count(), 0);
}

#[test]
fn corrupt_binder_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binder.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(Binder::load_from_file(&path).is_err());
    // The lenient loader falls back to a fresh binder at the same path
    let binder = Binder::load_or_new(&path);
    assert_eq!(binder.tabs().len(), 3);
}
