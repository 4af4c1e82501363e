//! Batch-level behaviour with deterministic collaborators.
//!
//! Run with:
//!   cargo test --test batch

mod common;

use common::{default_harness, harness, item, zip_entries};
use edgequake_doc2md::{
    BatchProgressCallback, ConversionMode, ConversionResult, OutputMode, PageSeparator,
    PipelineConfig,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn statuses(results: &[ConversionResult]) -> Vec<bool> {
    results.iter().map(ConversionResult::is_success).collect()
}

// ── Output mode ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_item_batch_returns_raw_markdown() {
    let h = default_harness();
    let outcome = h.coordinator.run(vec![item("receipt.png", "receipt")]).await;

    assert_eq!(outcome.output_mode, OutputMode::Single);
    assert_eq!(outcome.content_type(), "text/markdown");
    assert_eq!(outcome.artifact_filename, "receipt.md");
    assert_eq!(outcome.artifact_bytes, b"# receipt");
    assert_eq!((outcome.success_count, outcome.failure_count), (1, 0));
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn single_failed_item_has_empty_artifact_and_one_error() {
    let h = default_harness();
    let outcome = h.coordinator.run(vec![item("blurry.png", "FAIL")]).await;

    assert_eq!(outcome.output_mode, OutputMode::Single);
    assert!(outcome.artifact_bytes.is_empty());
    assert!(outcome.all_failed());
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(
        outcome.errors[0].to_string(),
        "blurry.png: vision call timed out after 120s"
    );
}

#[tokio::test]
async fn multi_item_batch_archives_each_success() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![
            item("a.png", "alpha"),
            item("b.png", "FAIL"),
            item("c.pdf", "text:Gamma"),
        ])
        .await;

    assert_eq!(outcome.output_mode, OutputMode::Archive);
    assert_eq!(outcome.content_type(), "application/zip");
    assert!(outcome.artifact_filename.starts_with("converted_"));
    assert!(outcome.artifact_filename.ends_with(".zip"));
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.success_count + outcome.failure_count, 3);

    let entries = zip_entries(&outcome.artifact_bytes);
    assert_eq!(
        entries,
        vec![
            ("a.md".to_string(), "# alpha".to_string()),
            ("c.md".to_string(), "Gamma".to_string()),
        ]
    );
}

#[tokio::test]
async fn empty_batch_is_an_empty_archive() {
    let h = default_harness();
    let outcome = h.coordinator.run(Vec::new()).await;

    assert_eq!(outcome.output_mode, OutputMode::Archive);
    assert_eq!((outcome.success_count, outcome.failure_count), (0, 0));
    assert!(outcome.results.is_empty());
    assert!(outcome.errors.is_empty());
    assert!(!outcome.all_failed());
    assert!(zip_entries(&outcome.artifact_bytes).is_empty());
}

#[tokio::test]
async fn all_failed_batch_still_packages() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("x.pdf", "%CORRUPT"), item("y.pdf", "%CORRUPT")])
        .await;

    assert_eq!(outcome.output_mode, OutputMode::Archive);
    assert!(outcome.all_failed());
    assert_eq!(outcome.errors.len(), 2);
    assert!(zip_entries(&outcome.artifact_bytes).is_empty());
}

// ── Isolation and ordering ───────────────────────────────────────────────────

#[tokio::test]
async fn one_bad_file_does_not_affect_its_neighbours() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![
            item("good.png", "first"),
            item("corrupt.pdf", "%CORRUPT"),
            item("good2.jpg", "second"),
        ])
        .await;

    let names: Vec<&str> = outcome.results.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, ["good.png", "corrupt.pdf", "good2.jpg"]);
    assert_eq!(statuses(&outcome.results), [true, false, true]);
    assert_eq!(outcome.results[0].markdown(), Some("# first"));
    assert_eq!(outcome.results[2].markdown(), Some("# second"));

    assert_eq!(outcome.errors.len(), 1);
    assert!(
        outcome.errors[0].to_string().starts_with("corrupt.pdf: "),
        "got: {}",
        outcome.errors[0]
    );
}

#[tokio::test]
async fn a_panicking_item_becomes_a_failure() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("a.png", "ok"), item("b.png", "PANIC"), item("c.png", "ok too")])
        .await;

    assert_eq!(statuses(&outcome.results), [true, false, true]);
    let detail = outcome.results[1].error_detail().unwrap();
    assert!(detail.contains("panicked"), "got: {detail}");
}

#[tokio::test]
async fn concurrent_items_keep_submission_order() {
    let config = PipelineConfig::builder().concurrency(3).build().unwrap();
    let h = harness(config);
    let outcome = h
        .coordinator
        .run(vec![
            item("1.png", "SLOW one"),
            item("2.png", "two"),
            item("3.png", "three"),
        ])
        .await;

    let md: Vec<&str> = outcome.results.iter().filter_map(|r| r.markdown()).collect();
    assert_eq!(md, ["# SLOW one", "# two", "# three"]);
}

#[tokio::test]
async fn same_batch_gives_same_results() {
    let batch = || {
        vec![
            item("a.png", "alpha"),
            item("b.pdf", "text:Beta\nscan:Scanned\ntable:x  y  z"),
            item("c.pdf", "%CORRUPT"),
            item("d.docx", "Delta"),
        ]
    };

    let first = default_harness().coordinator.run(batch()).await;
    let second = default_harness().coordinator.run(batch()).await;

    let strip = |rs: &[ConversionResult]| {
        rs.iter()
            .map(|r| (r.filename.clone(), r.status.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first.results), strip(&second.results));
    assert_eq!(first.errors, second.errors);
    assert_eq!(
        zip_entries(&first.artifact_bytes),
        zip_entries(&second.artifact_bytes)
    );
}

#[tokio::test]
async fn stream_yields_results_in_submission_order() {
    let config = PipelineConfig::builder().concurrency(2).build().unwrap();
    let h = harness(config);
    let results: Vec<ConversionResult> = h
        .coordinator
        .stream(vec![
            item("a.png", "SLOW a"),
            item("b.pdf", "%CORRUPT"),
            item("c.png", "c"),
        ])
        .collect()
        .await;

    let names: Vec<&str> = results.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, ["a.png", "b.pdf", "c.png"]);
    assert_eq!(statuses(&results), [true, false, true]);
}

// ── Paginated documents ──────────────────────────────────────────────────────

#[tokio::test]
async fn pages_are_assembled_in_order() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:Alpha\nscan:Beta\ntext:Gamma")])
        .await;

    assert_eq!(
        outcome.results[0].markdown(),
        Some("Alpha\n\n---\n\n# Beta\n\n---\n\nGamma")
    );
}

#[tokio::test]
async fn concurrent_pages_keep_page_order() {
    let config = PipelineConfig::builder()
        .page_concurrency(3)
        .page_separator(PageSeparator::Comment)
        .build()
        .unwrap();
    let h = harness(config);
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "scan:SLOW one\nscan:two\nscan:three")])
        .await;

    assert_eq!(
        outcome.results[0].markdown(),
        Some("# SLOW one\n\n<!-- page 2 -->\n\n# two\n\n<!-- page 3 -->\n\n# three")
    );
}

#[tokio::test]
async fn native_pages_are_never_rendered() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:One\ntext:Two")])
        .await;

    assert_eq!(outcome.results[0].markdown(), Some("One\n\n---\n\nTwo"));
    assert_eq!(h.pages.renders.load(Ordering::SeqCst), 0);
    assert_eq!(h.vision.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn table_pages_go_to_vision() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:Intro\ntable:Qty  Price  Total")])
        .await;

    assert_eq!(
        outcome.results[0].markdown(),
        Some("Intro\n\n---\n\n# Qty  Price  Total")
    );
    assert_eq!(h.pages.renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vision_mode_overrides_every_page() {
    let config = PipelineConfig::builder()
        .mode(ConversionMode::Vision)
        .build()
        .unwrap();
    let h = harness(config);
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:One\ntext:Two")])
        .await;

    assert_eq!(outcome.results[0].markdown(), Some("# One\n\n---\n\n# Two"));
    assert_eq!(h.pages.renders.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn native_mode_never_calls_vision() {
    let config = PipelineConfig::builder()
        .mode(ConversionMode::Native)
        .build()
        .unwrap();
    let h = harness(config);
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:One\nscan:Picture")])
        .await;

    assert_eq!(outcome.results[0].markdown(), Some("One\n\n---\n\n"));
    assert_eq!(h.vision.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreadable_text_layer_falls_back_to_vision() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "brokentext:Recovered")])
        .await;

    assert_eq!(outcome.results[0].markdown(), Some("# Recovered"));
}

#[tokio::test]
async fn failed_page_becomes_inline_marker() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:Before\nscan:FAIL\nnorender:x\ntext:After")])
        .await;

    let md = outcome.results[0].markdown().expect("partial success");
    let parts: Vec<&str> = md.split("\n\n---\n\n").collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0], "Before");
    assert_eq!(
        parts[1],
        "> ⚠ Conversion failed for page 2: vision call timed out after 120s"
    );
    assert!(parts[2].contains("page 3: rasterisation failed"), "got: {}", parts[2]);
    assert_eq!(parts[3], "After");
}

#[tokio::test]
async fn document_fails_when_every_page_fails() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "scan:FAIL 1\nscan:FAIL 2")])
        .await;

    let detail = outcome.results[0].error_detail().expect("failure");
    assert!(detail.starts_with("all 2 pages failed"), "got: {detail}");
}

#[tokio::test]
async fn failed_page_ratio_is_enforced_when_configured() {
    let config = PipelineConfig::builder()
        .max_failed_page_ratio(0.25)
        .build()
        .unwrap();
    let h = harness(config);
    let outcome = h
        .coordinator
        .run(vec![item("doc.pdf", "text:ok\nscan:FAIL\ntext:ok")])
        .await;

    let detail = outcome.results[0].error_detail().expect("failure");
    assert_eq!(detail, "1/3 pages failed (limit 25%)");
}

#[tokio::test]
async fn zero_page_document_fails() {
    let h = default_harness();
    let outcome = h.coordinator.run(vec![item("empty.pdf", "")]).await;
    assert_eq!(outcome.results[0].error_detail(), Some("document has no pages"));
}

// ── Word-processor documents ─────────────────────────────────────────────────

#[tokio::test]
async fn word_documents_use_the_converter() {
    let h = default_harness();
    let outcome = h
        .coordinator
        .run(vec![item("memo.docx", "# Memo"), item("broken.odt", "BAD")])
        .await;

    assert_eq!(outcome.results[0].markdown(), Some("# Memo"));
    assert_eq!(
        outcome.results[1].error_detail(),
        Some("word-processor conversion failed: pandoc exited with status 64")
    );
    assert_eq!(h.vision.calls.load(Ordering::SeqCst), 0);
}

// ── Configuration reaches the collaborators ──────────────────────────────────

#[tokio::test]
async fn custom_prompt_is_sent_to_vision() {
    let config = PipelineConfig::builder()
        .extraction_prompt("Only transcribe the headline.")
        .build()
        .unwrap();
    let h = harness(config);
    h.coordinator.run(vec![item("a.png", "news")]).await;

    let prompts = h.vision.prompts.lock().unwrap();
    assert_eq!(prompts.as_slice(), ["Only transcribe the headline."]);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    pages: AtomicUsize,
}

impl BatchProgressCallback for Recorder {
    fn on_batch_start(&self, total_items: usize) {
        self.events.lock().unwrap().push(format!("start {total_items}"));
    }

    fn on_item_complete(&self, index: usize, filename: &str, _markdown_len: usize) {
        self.events.lock().unwrap().push(format!("ok {index} {filename}"));
    }

    fn on_item_error(&self, index: usize, filename: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err {index} {filename}"));
    }

    fn on_page_complete(&self, _f: &str, _p: usize, _t: usize, _e: Option<&str>) {
        self.pages.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, success_count: usize, failure_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{failure_count}"));
    }
}

#[tokio::test]
async fn progress_events_follow_the_batch() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let h = harness(config);
    h.coordinator
        .run(vec![item("a.png", "a"), item("b.pdf", "text:1\ntext:2\ntext:3"), item("c.pdf", "%CORRUPT")])
        .await;

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        ["start 3", "ok 0 a.png", "ok 1 b.pdf", "err 2 c.pdf", "done 2/1"]
    );
    assert_eq!(recorder.pages.load(Ordering::SeqCst), 3);
}
