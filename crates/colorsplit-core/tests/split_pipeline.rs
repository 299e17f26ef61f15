//! End-to-end split runs over in-memory PDFs
//!
//! Run with: cargo test -p colorsplit-core --test split_pipeline

mod common;

use std::cell::RefCell;
use std::path::PathBuf;

use colorsplit_core::{
    run_split, Diagnostic, ErrorKind, MemoryFile, PageClass, ProgressEvent, RunOutcome,
    SplitOptions, SplitPipeline, Threshold,
};
use common::{create_labelled_pdf, page_labels, LabelRasterizer};
use pretty_assertions::assert_eq;

fn file(name: &str, labels: &[&str]) -> MemoryFile {
    MemoryFile::new(name, create_labelled_pdf(labels))
}

fn threshold(value: u32) -> Threshold {
    Threshold::new(value).unwrap()
}

#[test]
fn test_two_files_with_separators() {
    let files = vec![
        file("a.pdf", &["A.p1 color", "A.p2 gray", "A.p3 color"]),
        file("b.pdf", &["B.p1 gray"]),
    ];

    let output = run_split(&files, threshold(50), true, &LabelRasterizer);

    assert_eq!(output.outcome, RunOutcome::Completed);
    assert_eq!(output.report.color_pages, 2);
    assert_eq!(output.report.bw_pages, 2);
    assert!(output.report.diagnostics.is_empty());
    assert_eq!(
        page_labels(&output.color.unwrap()),
        vec!["A.p1 color", "A.p3 color"]
    );
    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["A.p2 gray", "<blank>", "B.p1 gray"]
    );
}

#[test]
fn test_single_unreadable_file() {
    let files = vec![PathBuf::from("/nonexistent/colorsplit/missing.pdf")];

    let output = run_split(&files, threshold(50), true, &LabelRasterizer);

    assert_eq!(output.outcome, RunOutcome::NoPagesProduced);
    assert_eq!(output.report.total_pages(), 0);
    assert!(output.color.is_none());
    assert!(output.black_and_white.is_none());
    assert_eq!(output.report.diagnostics.len(), 1);
    match &output.report.diagnostics[0] {
        Diagnostic::File {
            file_index,
            file_name,
            kind,
            ..
        } => {
            assert_eq!(*file_index, 0);
            assert_eq!(file_name, "missing.pdf");
            assert_eq!(*kind, ErrorKind::Io);
        }
        other => panic!("expected a file diagnostic, got {:?}", other),
    }
}

#[test]
fn test_reads_files_from_disk() {
    let dir = std::env::temp_dir().join(format!("colorsplit-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("disk.pdf");
    std::fs::write(&path, create_labelled_pdf(&["D.p1 color", "D.p2 gray"])).unwrap();

    let output = run_split(&[path], threshold(50), false, &LabelRasterizer);
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(output.outcome, RunOutcome::Completed);
    assert_eq!(page_labels(&output.color.unwrap()), vec!["D.p1 color"]);
    assert_eq!(page_labels(&output.black_and_white.unwrap()), vec!["D.p2 gray"]);
    assert_eq!(output.report.pages[0].file_name, "disk.pdf");
}

#[test]
fn test_page_order_follows_file_then_page_order() {
    let files = vec![
        file("a.pdf", &["A.p1 gray", "A.p2 color", "A.p3 gray"]),
        file("b.pdf", &["B.p1 color", "B.p2 color"]),
        file("c.pdf", &["C.p1 gray", "C.p2 color"]),
    ];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(
        page_labels(&output.color.unwrap()),
        vec!["A.p2 color", "B.p1 color", "B.p2 color", "C.p2 color"]
    );
    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["A.p1 gray", "A.p3 gray", "C.p1 gray"]
    );

    let routed: Vec<(usize, usize)> = output
        .report
        .pages
        .iter()
        .map(|p| (p.file_index, p.page_index))
        .collect();
    assert_eq!(
        routed,
        vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (2, 0), (2, 1)]
    );
}

#[test]
fn test_separators_only_between_opened_files() {
    let files = vec![
        MemoryFile::new("garbage.pdf", b"%PDF-1.7 truncated".to_vec()),
        file("a.pdf", &["A.p1 gray", "A.p2 color"]),
        file("b.pdf", &["B.p1 gray", "B.p2 color"]),
        file("c.pdf", &["C.p1 gray"]),
    ];

    let output = run_split(&files, threshold(50), true, &LabelRasterizer);

    assert_eq!(
        page_labels(&output.color.unwrap()),
        vec!["A.p2 color", "<blank>", "B.p2 color"]
    );
    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["A.p1 gray", "<blank>", "B.p1 gray", "<blank>", "C.p1 gray"]
    );
}

#[test]
fn test_no_separators_when_disabled() {
    let files = vec![file("a.pdf", &["A.p1 gray"]), file("b.pdf", &["B.p1 gray"])];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["A.p1 gray", "B.p1 gray"]
    );
    assert!(output.color.is_none());
}

#[test]
fn test_corrupt_file_is_skipped() {
    let files = vec![
        file("a.pdf", &["A.p1 color"]),
        MemoryFile::new("notes.txt", b"just some text".to_vec()),
        file("b.pdf", &["B.p1 color"]),
    ];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(output.outcome, RunOutcome::Completed);
    assert_eq!(output.report.color_pages, 2);
    assert_eq!(output.report.diagnostics.len(), 1);
    assert_eq!(output.report.diagnostics[0].kind(), ErrorKind::Decode);
    assert!(matches!(
        &output.report.diagnostics[0],
        Diagnostic::File { file_index: 1, .. }
    ));
    assert_eq!(
        page_labels(&output.color.unwrap()),
        vec!["A.p1 color", "B.p1 color"]
    );
}

#[test]
fn test_raster_open_failure_skips_whole_file() {
    let files = vec![
        file("a.pdf", &["A.p1 color", "A.p2 no-raster"]),
        file("b.pdf", &["B.p1 gray"]),
    ];

    let output = run_split(&files, threshold(50), true, &LabelRasterizer);

    assert_eq!(output.report.total_pages(), 1);
    assert!(output.color.is_none());
    assert_eq!(output.report.diagnostics.len(), 1);
    assert!(matches!(
        &output.report.diagnostics[0],
        Diagnostic::File { file_index: 0, kind: ErrorKind::Decode, .. }
    ));
    // b.pdf is the first opened file, so no separator precedes it
    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["B.p1 gray"]
    );
}

#[test]
fn test_render_failure_routes_page_as_black_and_white() {
    let files = vec![file("a.pdf", &["A.p1 color render-fail", "A.p2 color"])];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert!(output.report.diagnostics.is_empty());
    assert_eq!(output.report.color_pages, 1);
    assert_eq!(output.report.bw_pages, 1);
    assert_eq!(output.report.render_fallbacks(), 1);
    assert!(output.report.pages[0].render_fallback);
    assert_eq!(output.report.pages[0].class, PageClass::BlackAndWhite);
    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["A.p1 color render-fail"]
    );
}

#[test]
fn test_copy_failure_drops_only_that_page() {
    let files = vec![file(
        "a.pdf",
        &["A.p1 color", "A.p2 color broken", "A.p3 gray", "A.p4 gray broken"],
    )];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(output.outcome, RunOutcome::Completed);
    assert_eq!(output.report.color_pages, 1);
    assert_eq!(output.report.bw_pages, 1);

    let failed: Vec<usize> = output
        .report
        .diagnostics
        .iter()
        .map(|d| match d {
            Diagnostic::Page {
                page_index, kind, ..
            } => {
                assert_eq!(*kind, ErrorKind::Transcribe);
                *page_index
            }
            other => panic!("expected a page diagnostic, got {:?}", other),
        })
        .collect();
    assert_eq!(failed, vec![1, 3]);

    assert_eq!(page_labels(&output.color.unwrap()), vec!["A.p1 color"]);
    assert_eq!(
        page_labels(&output.black_and_white.unwrap()),
        vec!["A.p3 gray"]
    );
}

#[test]
fn test_every_page_routed_or_diagnosed_exactly_once() {
    let files = vec![
        file("a.pdf", &["A.p1 color", "A.p2 broken", "A.p3 render-fail"]),
        file("b.pdf", &["B.p1 gray broken", "B.p2 muted", "B.p3 color"]),
    ];

    let output = run_split(&files, threshold(50), true, &LabelRasterizer);
    let report = &output.report;

    let mut seen: Vec<(usize, usize)> = report
        .pages
        .iter()
        .map(|p| (p.file_index, p.page_index))
        .collect();
    for diagnostic in &report.diagnostics {
        if let Diagnostic::Page {
            file_index,
            page_index,
            ..
        } = diagnostic
        {
            seen.push((*file_index, *page_index));
        }
    }
    seen.sort();

    assert_eq!(seen, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    assert_eq!(report.total_pages(), report.pages.len());
}

#[test]
fn test_threshold_reaches_classifier() {
    let files = vec![file("a.pdf", &["A.p1 muted"])];

    let lenient = run_split(&files, threshold(15), false, &LabelRasterizer);
    let strict = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(lenient.report.color_pages, 1);
    assert_eq!(strict.report.bw_pages, 1);
}

#[test]
fn test_all_pages_broken_reports_no_pages_produced() {
    let files = vec![file("a.pdf", &["A.p1 color broken", "A.p2 gray broken"])];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(output.outcome, RunOutcome::NoPagesProduced);
    assert_eq!(output.report.diagnostics.len(), 2);
    assert!(output.color.is_none());
    assert!(output.black_and_white.is_none());
}

#[test]
fn test_empty_input_list() {
    let files: Vec<MemoryFile> = Vec::new();
    let output = run_split(&files, threshold(50), false, &LabelRasterizer);

    assert_eq!(output.outcome, RunOutcome::NoPagesProduced);
    assert!(output.report.diagnostics.is_empty());
}

#[test]
fn test_progress_events_in_order() {
    let files = vec![
        file("a.pdf", &["A.p1 color", "A.p2 gray"]),
        MemoryFile::new("bad.pdf", b"nope".to_vec()),
    ];
    let events = RefCell::new(Vec::new());

    let options = SplitOptions {
        threshold: threshold(50),
        insert_separators: false,
    };
    SplitPipeline::new(&LabelRasterizer, options)
        .on_progress(|event| events.borrow_mut().push(event.clone()))
        .run(&files);

    assert_eq!(
        events.into_inner(),
        vec![
            ProgressEvent::FileStarted {
                file_index: 0,
                file_count: 2,
                name: "a.pdf".into(),
            },
            ProgressEvent::PageProcessed {
                file_index: 0,
                page_index: 0,
                page_count: 2,
            },
            ProgressEvent::PageProcessed {
                file_index: 0,
                page_index: 1,
                page_count: 2,
            },
            ProgressEvent::FileStarted {
                file_index: 1,
                file_count: 2,
                name: "bad.pdf".into(),
            },
            ProgressEvent::Finalizing,
        ]
    );
}

#[test]
fn test_report_serializes_to_json() {
    let files = vec![
        file("a.pdf", &["A.p1 color", "A.p2 broken"]),
        MemoryFile::new("bad.pdf", Vec::new()),
    ];

    let output = run_split(&files, threshold(50), false, &LabelRasterizer);
    let json = serde_json::to_value(&output.report).unwrap();

    assert_eq!(json["color_pages"], 1);
    assert_eq!(json["bw_pages"], 0);
    assert_eq!(json["pages"][0]["class"], "color");
    assert_eq!(json["diagnostics"][0]["scope"], "page");
    assert_eq!(json["diagnostics"][0]["kind"], "transcribe");
    assert_eq!(json["diagnostics"][1]["scope"], "file");
}
