//! Tests for the cache-first read path and clause note management.

mod common;

use clauselens::error::CoreError;
use clauselens::models::DocumentStatus;

use common::{Harness, OWNER};

async fn analyzed_harness() -> (Harness, String) {
    let harness = Harness::new(false);
    let doc = harness.ingest(b"agreement used for read-path tests");
    harness
        .analysis
        .request_analysis(OWNER, &doc.id, false)
        .await
        .unwrap();
    harness.wait_for(&doc.id, DocumentStatus::Analyzed).await;
    (harness, doc.id)
}

#[tokio::test]
async fn repeated_reads_are_identical_and_cache_served() {
    let (harness, doc_id) = analyzed_harness().await;

    // The pipeline wrote through to the cache, so reads hit immediately.
    let first = harness.analysis.get_analysis(OWNER, &doc_id).unwrap();
    assert!(first.cache_hit);

    let second = harness.analysis.get_analysis(OWNER, &doc_id).unwrap();
    assert!(second.cache_hit);
    assert_eq!(first.analysis, second.analysis);
}

#[tokio::test]
async fn cache_miss_falls_back_to_store_and_repopulates() {
    let (harness, doc_id) = analyzed_harness().await;

    harness.cache.invalidate(&doc_id);

    let miss = harness.analysis.get_analysis(OWNER, &doc_id).unwrap();
    assert!(!miss.cache_hit);

    let hit = harness.analysis.get_analysis(OWNER, &doc_id).unwrap();
    assert!(hit.cache_hit);
    assert_eq!(miss.analysis, hit.analysis);
}

#[tokio::test]
async fn cached_copy_survives_reserialization_structurally_equal() {
    let (harness, doc_id) = analyzed_harness().await;

    let persisted = harness.analyses.get_by_document(&doc_id).unwrap().unwrap();
    let cached = harness.analysis.get_analysis(OWNER, &doc_id).unwrap().analysis;
    assert_eq!(persisted, cached);

    // Round-trip the cached copy through JSON, as the wire would.
    let json = serde_json::to_string(&cached).unwrap();
    let reparsed: clauselens::models::Analysis = serde_json::from_str(&json).unwrap();
    assert_eq!(reparsed, persisted);
}

#[tokio::test]
async fn added_note_is_visible_on_the_next_read() {
    let (harness, doc_id) = analyzed_harness().await;

    // Prime the cache.
    assert!(harness.analysis.get_analysis(OWNER, &doc_id).unwrap().cache_hit);

    let note = harness
        .notes
        .add_note(OWNER, &doc_id, 0, "push back on this clause".to_string())
        .unwrap();
    assert!(note.updated_at.is_none());

    // The very next read must include the note; the mutation invalidated
    // the cached copy, so this read comes from the store.
    let fetched = harness.analysis.get_analysis(OWNER, &doc_id).unwrap();
    assert!(!fetched.cache_hit);
    assert_eq!(fetched.analysis.clauses[0].notes.len(), 1);
    assert_eq!(
        fetched.analysis.clauses[0].notes[0].text,
        "push back on this clause"
    );

    // And the repopulated cache serves the same thing.
    let again = harness.analysis.get_analysis(OWNER, &doc_id).unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.analysis, fetched.analysis);
}

#[tokio::test]
async fn note_update_stamps_time_and_keeps_siblings() {
    let (harness, doc_id) = analyzed_harness().await;

    harness
        .notes
        .add_note(OWNER, &doc_id, 0, "first".to_string())
        .unwrap();
    harness
        .notes
        .add_note(OWNER, &doc_id, 0, "second".to_string())
        .unwrap();

    let updated = harness
        .notes
        .update_note(OWNER, &doc_id, 0, 0, "first, revised".to_string())
        .unwrap();
    assert_eq!(updated.text, "first, revised");
    assert!(updated.updated_at.is_some());

    let analysis = harness.analysis.get_analysis(OWNER, &doc_id).unwrap().analysis;
    let notes = &analysis.clauses[0].notes;
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].text, "first, revised");
    assert_eq!(notes[1].text, "second");
    assert!(notes[1].updated_at.is_none());
}

#[tokio::test]
async fn note_delete_shifts_later_siblings_down() {
    let (harness, doc_id) = analyzed_harness().await;

    for text in ["a", "b", "c"] {
        harness
            .notes
            .add_note(OWNER, &doc_id, 0, text.to_string())
            .unwrap();
    }

    harness.notes.delete_note(OWNER, &doc_id, 0, 0).unwrap();

    let analysis = harness.analysis.get_analysis(OWNER, &doc_id).unwrap().analysis;
    let notes = &analysis.clauses[0].notes;
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].text, "b");
    assert_eq!(notes[1].text, "c");
}

#[tokio::test]
async fn out_of_range_indices_are_rejected() {
    let (harness, doc_id) = analyzed_harness().await;

    let err = harness
        .notes
        .add_note(OWNER, &doc_id, 99, "nope".to_string())
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidIndex(_)));

    let err = harness
        .notes
        .update_note(OWNER, &doc_id, 0, 5, "nope".to_string())
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidIndex(_)));

    let err = harness.notes.delete_note(OWNER, &doc_id, 0, 0).unwrap_err();
    assert!(matches!(err, CoreError::InvalidIndex(_)));
}

#[tokio::test]
async fn other_owners_cannot_reach_the_document() {
    let (harness, doc_id) = analyzed_harness().await;

    let err = harness.analysis.get_analysis("mallory", &doc_id).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = harness.analysis.status("mallory", &doc_id).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = harness
        .notes
        .add_note("mallory", &doc_id, 0, "sneaky".to_string())
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}
