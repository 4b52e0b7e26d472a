mod common;

use common::{FakeModel, MemorySheet};
use journal::entry::{COL_SUMMARY, COL_THEMES, NO_THEMES};
use journal::{CycleReport, Processor};
use std::sync::Arc;
use std::time::Duration;

fn processor(sheet: &Arc<MemorySheet>, model: &Arc<FakeModel>) -> Processor {
    Processor::new(sheet.clone(), model.clone())
}

#[tokio::test]
async fn fills_summary_then_themes_for_pending_rows() {
    let sheet = Arc::new(MemorySheet::new(&[
        &["Fecha", "Nombre", "Registro", "", "Temas", "Resumen"],
        &["2024-05-01 10:00:00", "Ana", "Soñé con mi padre"],
        &["2024-05-02 10:00:00", "Ana", "Ya analizado", "", "t", "hecho"],
        &["2024-05-03 10:00:00", "Luis", "Discutí otra vez"],
    ]));
    let model = Arc::new(FakeModel::new("Repetición del conflicto.\nTEMAS: padre, sueño", ""));

    let report = processor(&sheet, &model).run_cycle().await.unwrap();

    assert_eq!(
        report,
        CycleReport {
            scanned: 3,
            analyzed: 2,
            failed: 0
        }
    );
    assert_eq!(
        sheet.updates(),
        vec![
            (2, COL_SUMMARY, "Repetición del conflicto.".to_string()),
            (2, COL_THEMES, "padre, sueño".to_string()),
            (4, COL_SUMMARY, "Repetición del conflicto.".to_string()),
            (4, COL_THEMES, "padre, sueño".to_string()),
        ]
    );
    let rows = sheet.rows();
    assert_eq!(rows[2][COL_SUMMARY - 1], "hecho");
    assert_eq!(model.analysis_calls(), 2);

    let prompts = model.prompts.lock().unwrap().clone();
    assert!(prompts[0].ends_with("REGISTRO:\nSoñé con mi padre"));
    assert!(prompts[1].ends_with("REGISTRO:\nDiscutí otra vez"));
}

#[tokio::test]
async fn rows_without_text_are_skipped() {
    let sheet = Arc::new(MemorySheet::new(&[
        &["Fecha", "Nombre", "Registro"],
        &["2024-05-01 10:00:00", "Ana"],
        &[],
    ]));
    let model = Arc::new(FakeModel::new("x", ""));

    let report = processor(&sheet, &model).run_cycle().await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.analyzed, 0);
    assert_eq!(model.analysis_calls(), 0);
    assert!(sheet.updates().is_empty());
}

#[tokio::test]
async fn header_only_sheet_does_nothing() {
    let sheet = Arc::new(MemorySheet::with_header());
    let model = Arc::new(FakeModel::new("x", ""));
    let report = processor(&sheet, &model).run_cycle().await.unwrap();
    assert_eq!(report, CycleReport::default());

    let empty = Arc::new(MemorySheet::new(&[]));
    let report = processor(&empty, &model).run_cycle().await.unwrap();
    assert_eq!(report, CycleReport::default());
    assert_eq!(model.analysis_calls(), 0);
}

#[tokio::test]
async fn response_without_marker_gets_default_themes() {
    let sheet = Arc::new(MemorySheet::new(&[
        &["Fecha", "Nombre", "Registro"],
        &["2024-05-01 10:00:00", "Ana", "Hoy nada"],
    ]));
    let model = Arc::new(FakeModel::new("Sin mecanismos evidentes.", ""));

    processor(&sheet, &model).run_cycle().await.unwrap();

    let rows = sheet.rows();
    assert_eq!(rows[1][COL_SUMMARY - 1], "Sin mecanismos evidentes.");
    assert_eq!(rows[1][COL_THEMES - 1], NO_THEMES);
}

#[tokio::test]
async fn failing_rows_are_counted_and_left_pending() {
    let sheet = Arc::new(MemorySheet::new(&[
        &["Fecha", "Nombre", "Registro"],
        &["2024-05-01 10:00:00", "Ana", "uno"],
        &["2024-05-02 10:00:00", "Ana", "dos"],
    ]));
    let model = Arc::new(FakeModel::new("", "").failing_analysis());

    let report = processor(&sheet, &model).run_cycle().await.unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(report.analyzed, 0);
    assert_eq!(model.analysis_calls(), 2);
    assert!(sheet.updates().is_empty());
}

#[tokio::test]
async fn unreadable_sheet_fails_the_cycle() {
    let mut sheet = MemorySheet::with_header();
    sheet.fail_reads = true;
    let sheet = Arc::new(sheet);
    let model = Arc::new(FakeModel::new("x", ""));

    assert!(processor(&sheet, &model).run_cycle().await.is_err());
}

#[tokio::test]
async fn second_cycle_finds_nothing_left() {
    let sheet = Arc::new(MemorySheet::new(&[
        &["Fecha", "Nombre", "Registro"],
        &["2024-05-01 10:00:00", "Ana", "uno"],
    ]));
    let model = Arc::new(FakeModel::new("Resumen TEMAS: uno", ""));
    let processor = processor(&sheet, &model);

    assert_eq!(processor.run_cycle().await.unwrap().analyzed, 1);
    assert_eq!(processor.run_cycle().await.unwrap().analyzed, 0);
    assert_eq!(model.analysis_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loop_polls_until_shutdown() {
    let sheet = Arc::new(MemorySheet::new(&[
        &["Fecha", "Nombre", "Registro"],
        &["2024-05-01 10:00:00", "Ana", "uno"],
    ]));
    let model = Arc::new(FakeModel::new("Resumen TEMAS: uno", ""));
    let processor = processor(&sheet, &model)
        .with_delays(Duration::from_secs(1), Duration::from_secs(2));

    processor
        .run(
            Duration::from_secs(600),
            tokio::time::sleep(Duration::from_secs(1500)),
        )
        .await;

    // Cycles at 0s, 600s and 1200s; only the first has work.
    assert_eq!(model.analysis_calls(), 1);
    assert_eq!(sheet.updates().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_a_long_cycle() {
    let sheet = Arc::new(MemorySheet::with_header());
    sheet.rows.lock().unwrap().extend((0..100).map(|i| {
        vec![
            "2024-05-01 10:00:00".to_string(),
            "Ana".to_string(),
            format!("registro {i}"),
        ]
    }));
    let model = Arc::new(FakeModel::new("Resumen TEMAS: uno", ""));
    let processor = processor(&sheet, &model)
        .with_delays(Duration::from_secs(1), Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    processor
        .run(
            Duration::from_secs(600),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;

    // Each row takes 3s of pauses, so only the first two finish.
    assert!(started.elapsed() < Duration::from_secs(6));
    assert!(model.analysis_calls() < 100);
    assert!(sheet.updates().len() <= 4);
}
