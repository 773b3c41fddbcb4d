//! Scheduling, coalescing and failure handling of analysis workers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use weft::analysis::{AnalysisScheduler, NoCallbacks, ReadError};
use weft::base::Span;
use weft::config::Options;
use weft::document::{DocumentStore, EditError, TextEdit};
use weft::sync::Deadline;
use weft::syntax::codes;

use crate::helpers::analyzers::{GatedAnalyzer, PanickingAnalyzer, RecordingCallbacks};
use crate::helpers::fixtures::FOUR_LINES;

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

fn scheduler_with(
    options: &Options,
    analyzer: Arc<GatedAnalyzer>,
    callbacks: Arc<RecordingCallbacks>,
) -> AnalysisScheduler {
    AnalysisScheduler::new(options, Arc::new(DocumentStore::new()), analyzer, callbacks)
}

fn set_b(value: &str) -> TextEdit {
    TextEdit::replace(Span::from_coords(2, 8, 2, 9), value)
}

#[test]
fn test_open_analyzes_and_publishes_diagnostics() {
    let analyzer = Arc::new(GatedAnalyzer::new());
    let callbacks = Arc::new(RecordingCallbacks::default());
    let scheduler = scheduler_with(&Options::default(), analyzer.clone(), callbacks.clone());
    let file = Path::new("/ws/demo.wf");

    assert_eq!(scheduler.open(file, 7, FOUR_LINES).unwrap(), 0);
    let result = scheduler.latest_analysis(file, deadline()).unwrap();

    assert_eq!(result.version, 0);
    assert_eq!(&*result.text, FOUR_LINES);
    assert!(!result.degraded);
    assert!(scheduler.block_until_idle(deadline()));
    assert_eq!(callbacks.published(), vec![(file.to_path_buf(), 0, 0)]);
    assert_eq!(scheduler.open_files(), vec![file.to_path_buf()]);
}

#[test]
fn test_queued_updates_coalesce_into_newest() {
    let analyzer = Arc::new(GatedAnalyzer::gated());
    let scheduler = scheduler_with(
        &Options::default(),
        analyzer.clone(),
        Arc::new(RecordingCallbacks::default()),
    );
    let file = Path::new("/ws/demo.wf");

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(analyzer.started.wait_for(1));
    assert_eq!(scheduler.change(file, 1, &[set_b("20")], false).unwrap(), 1);
    assert_eq!(scheduler.change(file, 2, &[set_b("200")], false).unwrap(), 2);

    analyzer.gate.open();
    assert!(scheduler.block_until_idle(deadline()));

    assert_eq!(analyzer.versions(file), vec![0, 2]);
    let result = scheduler.latest_analysis(file, deadline()).unwrap();
    assert_eq!(result.version, 2);
    assert!(result.text.contains("let b = 200"));
}

#[test]
fn test_coalesced_update_keeps_diagnostics_request() {
    let analyzer = Arc::new(GatedAnalyzer::gated());
    let callbacks = Arc::new(RecordingCallbacks::default());
    let scheduler = scheduler_with(&Options::default(), analyzer.clone(), callbacks.clone());
    let file = Path::new("/ws/demo.wf");

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(analyzer.started.wait_for(1));
    scheduler.change(file, 1, &[set_b("5")], true).unwrap();
    scheduler.change(file, 2, &[set_b("6")], false).unwrap();
    analyzer.gate.open();
    assert!(scheduler.block_until_idle(deadline()));

    let versions: Vec<i64> = callbacks.published().iter().map(|(_, v, _)| *v).collect();
    assert_eq!(versions, vec![0, 2]);
}

#[test]
fn test_change_without_diagnostics_is_silent() {
    let analyzer = Arc::new(GatedAnalyzer::new());
    let callbacks = Arc::new(RecordingCallbacks::default());
    let scheduler = scheduler_with(&Options::default(), analyzer.clone(), callbacks.clone());
    let file = Path::new("/ws/demo.wf");

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(scheduler.block_until_idle(deadline()));
    scheduler.change(file, 1, &[set_b("9")], false).unwrap();
    assert!(scheduler.block_until_idle(deadline()));

    assert_eq!(analyzer.versions(file), vec![0, 1]);
    assert_eq!(callbacks.published().len(), 1);
}

#[test]
fn test_change_rejects_bad_edits_and_unknown_files() {
    let scheduler = scheduler_with(
        &Options::default(),
        Arc::new(GatedAnalyzer::new()),
        Arc::new(RecordingCallbacks::default()),
    );
    let file = Path::new("/ws/demo.wf");

    assert!(matches!(
        scheduler.change(file, 1, &[set_b("1")], false),
        Err(EditError::UnknownDocument(_))
    ));
    scheduler.open(file, 0, FOUR_LINES).unwrap();
    let past_end = TextEdit::insert(weft::Position::new(1, 40), "x");
    assert!(matches!(
        scheduler.change(file, 1, &[past_end], false),
        Err(EditError::InvalidPosition(_))
    ));
    assert_eq!(scheduler.documents().get(file).version, 0);
}

#[test]
fn test_schedule_update_reanalyzes_stored_text() {
    let analyzer = Arc::new(GatedAnalyzer::new());
    let scheduler = scheduler_with(
        &Options::default(),
        analyzer.clone(),
        Arc::new(RecordingCallbacks::default()),
    );
    let file = Path::new("/ws/demo.wf");

    assert!(!scheduler.schedule_update(file, false));
    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(scheduler.block_until_idle(deadline()));
    assert_eq!(analyzer.total(), 1);
    assert!(scheduler.schedule_update(file, false));
    assert!(scheduler.block_until_idle(deadline()));
    assert_eq!(analyzer.total(), 2);
}

#[test]
fn test_zero_concurrency_limit_still_analyzes() {
    let analyzer = Arc::new(GatedAnalyzer::new());
    let options = Options::default().with_max_concurrent_analyses(0);
    let scheduler = scheduler_with(&options, analyzer.clone(), Arc::new(RecordingCallbacks::default()));
    let file = Path::new("/ws/demo.wf");

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    let result = scheduler.latest_analysis(file, deadline()).unwrap();
    assert_eq!(result.version, 0);
    assert_eq!(analyzer.total(), 1);
}

#[test]
fn test_concurrent_analyses_are_capped() {
    let analyzer = Arc::new(GatedAnalyzer::gated());
    let options = Options::default().with_max_concurrent_analyses(1);
    let scheduler = scheduler_with(&options, analyzer.clone(), Arc::new(RecordingCallbacks::default()));

    for name in ["a", "b", "c"] {
        let file = format!("/ws/{name}.wf");
        scheduler.open(Path::new(&file), 0, FOUR_LINES).unwrap();
    }
    assert!(analyzer.started.wait_for(1));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(analyzer.started.get(), 1);

    analyzer.gate.open();
    assert!(scheduler.block_until_idle(deadline()));
    assert_eq!(analyzer.total(), 3);
    assert_eq!(analyzer.max_active(), 1);
}

#[test]
fn test_panicking_analysis_yields_degraded_result() {
    let callbacks = Arc::new(RecordingCallbacks::default());
    let scheduler = AnalysisScheduler::new(
        &Options::default(),
        Arc::new(DocumentStore::new()),
        Arc::new(PanickingAnalyzer),
        callbacks.clone(),
    );
    let file = Path::new("/ws/demo.wf");

    scheduler.open(file, 0, "package demo\nlet boom = 1\n").unwrap();
    let result = scheduler.latest_analysis(file, deadline()).unwrap();
    assert!(result.degraded);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, Some(codes::COMPILE_FAILED));
    assert!(result.diagnostics[0].message.contains("exploded on version 0"));

    scheduler
        .change(file, 1, &[TextEdit::full("package demo\nlet calm = 1\n")], true)
        .unwrap();
    let result = scheduler.latest_analysis(file, deadline()).unwrap();
    assert!(!result.degraded);
    assert_eq!(result.version, 1);
    assert!(scheduler.block_until_idle(deadline()));
    assert_eq!(callbacks.published().len(), 2);
}

#[test]
fn test_close_forgets_file() {
    let scheduler = AnalysisScheduler::new(
        &Options::default(),
        Arc::new(DocumentStore::new()),
        Arc::new(GatedAnalyzer::new()),
        Arc::new(NoCallbacks),
    );
    let file = Path::new("/ws/demo.wf");
    scheduler.open(file, 0, FOUR_LINES).unwrap();
    scheduler.close(file);

    assert!(scheduler.open_files().is_empty());
    assert!(!scheduler.documents().contains(file));
    assert!(scheduler.latest_analysis(file, deadline()).is_none());

    let (tx, rx) = std::sync::mpsc::channel();
    scheduler.run_with_latest_analysis(file, move |result| tx.send(result.err()).unwrap());
    assert_eq!(
        rx.recv().unwrap(),
        Some(ReadError::UnknownFile(file.to_path_buf()))
    );
}
