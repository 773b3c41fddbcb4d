//! Freshness guarantees of reads.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

use weft::analysis::{AnalysisScheduler, NoCallbacks, ReadError};
use weft::base::{Position, Span};
use weft::config::Options;
use weft::document::{DocumentStore, TextEdit};
use weft::sync::Deadline;

use crate::helpers::analyzers::GatedAnalyzer;
use crate::helpers::fixtures::FOUR_LINES;

const FILE: &str = "/ws/demo.wf";

fn scheduler(analyzer: Arc<GatedAnalyzer>) -> AnalysisScheduler {
    AnalysisScheduler::new(
        &Options::default(),
        Arc::new(DocumentStore::new()),
        analyzer,
        Arc::new(NoCallbacks),
    )
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

/// Read the latest analysis, reporting the version it saw.
fn latest(scheduler: &AnalysisScheduler) -> Receiver<Result<i64, ReadError>> {
    let (tx, rx) = channel();
    scheduler.run_with_latest_analysis(Path::new(FILE), move |result| {
        let _ = tx.send(result.map(|r| r.version));
    });
    rx
}

fn near(scheduler: &AnalysisScheduler, line: usize) -> Receiver<Result<i64, ReadError>> {
    let (tx, rx) = channel();
    scheduler.run_with_analysis_near_position(Path::new(FILE), Position::new(line, 0), move |result| {
        let _ = tx.send(result.map(|r| r.version));
    });
    rx
}

fn recv(rx: &Receiver<Result<i64, ReadError>>) -> Result<i64, ReadError> {
    rx.recv_timeout(Duration::from_secs(5)).unwrap()
}

#[test]
fn test_latest_read_waits_for_newest_update() {
    let analyzer = Arc::new(GatedAnalyzer::gated());
    let scheduler = scheduler(analyzer.clone());
    let file = Path::new(FILE);

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(analyzer.started.wait_for(1));
    scheduler
        .change(file, 1, &[TextEdit::replace(Span::from_coords(1, 8, 1, 9), "7")], false)
        .unwrap();
    let read = latest(&scheduler);

    analyzer.gate.open();
    assert_eq!(recv(&read), Ok(1));
    assert_eq!(analyzer.versions(file), vec![0, 1]);
}

#[test]
fn test_near_read_skips_update_elsewhere() {
    let analyzer = Arc::new(GatedAnalyzer::new());
    let scheduler = scheduler(analyzer.clone());
    let file = Path::new(FILE);

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(scheduler.block_until_idle(deadline()));

    // Hold the worker inside a recompile of version 0, then queue an edit
    // to line 3 behind it.
    analyzer.gate.close();
    scheduler.schedule_update(file, false);
    assert!(analyzer.started.wait_for(2));
    scheduler
        .change(file, 1, &[TextEdit::replace(Span::from_coords(3, 8, 3, 9), "4")], false)
        .unwrap();

    let elsewhere = near(&scheduler, 0);
    let touched = near(&scheduler, 3);
    let newest = latest(&scheduler);
    analyzer.gate.open();

    assert_eq!(recv(&elsewhere), Ok(0));
    assert_eq!(recv(&touched), Ok(1));
    assert_eq!(recv(&newest), Ok(1));
}

#[test]
fn test_near_read_waits_when_lines_shift() {
    let analyzer = Arc::new(GatedAnalyzer::new());
    let scheduler = scheduler(analyzer.clone());
    let file = Path::new(FILE);

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(scheduler.block_until_idle(deadline()));

    analyzer.gate.close();
    scheduler.schedule_update(file, false);
    assert!(analyzer.started.wait_for(2));
    // A new line above line 3 moves it.
    scheduler
        .change(file, 1, &[TextEdit::insert(Position::new(1, 0), "let z = 0\n")], false)
        .unwrap();

    let below = near(&scheduler, 3);
    analyzer.gate.open();
    assert_eq!(recv(&below), Ok(1));
}

#[test]
fn test_read_before_any_analysis_waits() {
    let analyzer = Arc::new(GatedAnalyzer::gated());
    let scheduler = scheduler(analyzer.clone());

    scheduler.open(Path::new(FILE), 0, FOUR_LINES).unwrap();
    let read = latest(&scheduler);
    assert!(read.recv_timeout(Duration::from_millis(50)).is_err());

    analyzer.gate.open();
    assert_eq!(recv(&read), Ok(0));
}

#[test]
fn test_shutdown_cancels_waiting_reads() {
    let analyzer = Arc::new(GatedAnalyzer::gated());
    let scheduler = scheduler(analyzer.clone());
    let file = Path::new(FILE);

    scheduler.open(file, 0, FOUR_LINES).unwrap();
    assert!(analyzer.started.wait_for(1));
    scheduler
        .change(file, 1, &[TextEdit::full("package demo\n")], false)
        .unwrap();
    let read = latest(&scheduler);

    std::thread::scope(|s| {
        s.spawn(|| scheduler.shutdown());
        while !scheduler.open_files().is_empty() {
            std::thread::yield_now();
        }
        std::thread::sleep(Duration::from_millis(50));
        analyzer.gate.open();
    });

    assert_eq!(recv(&read), Err(ReadError::Cancelled));
    assert_eq!(analyzer.versions(file), vec![0]);
}
