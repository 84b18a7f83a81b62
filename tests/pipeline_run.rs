mod common;

use common::{invoice_text, stored_rows, FakeModel, FakeRenderer, HEADER};
use facturia::{
    config::Config,
    error::ModelCallError,
    extract::ContentKind,
    pipeline::{discover_documents, empty_run_guidance, save_batch, DocumentOutcome, Pipeline},
    report::OutcomeKind,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Lays out `<tmp>/facturas/<folder>/<file>` with placeholder bytes.
fn workspace(files: &[(&str, &str)]) -> (TempDir, Config) {
    let tmp = tempfile::tempdir().unwrap();
    for (folder, file) in files {
        let dir = tmp.path().join("facturas").join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), b"%PDF-1.4").unwrap();
    }
    let mut cfg = Config::default();
    cfg.paths.input_dir = tmp.path().join("facturas").display().to_string();
    cfg.paths.database = tmp.path().join("facturas.db").display().to_string();
    (tmp, cfg)
}

#[test]
fn one_valid_one_declined_persists_one_row() {
    let (_tmp, cfg) = workspace(&[("2024-01", "buena.pdf"), ("2024-01", "mala.pdf")]);
    let renderer = FakeRenderer::default()
        .with("buena.pdf", &[&invoice_text("BUENA")])
        .with("mala.pdf", &[&invoice_text("MALA")]);
    let model = FakeModel::default()
        .answer("BUENA", &format!("{HEADER}\n03/02/2024;Suministros Levante;Papel;50;euros"))
        .answer("MALA", "error");

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    assert_eq!(output.batch.len(), 1);
    assert_eq!(output.report.totals.documents, 2);
    assert_eq!(output.report.count(OutcomeKind::Declined), 1);

    let saved = save_batch(&cfg, output.batch).unwrap();
    assert_eq!(saved.persisted, 1);
    assert_eq!(saved.converted, 0);

    let rows = stored_rows(Path::new(&cfg.paths.database), "facturas");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].importe, Some(50.0));
    assert_eq!(rows[0].proveedor, "Suministros Levante");
}

#[test]
fn dollars_from_every_folder_are_converted_once() {
    let (_tmp, cfg) = workspace(&[("a", "uno.pdf"), ("b", "dos.pdf")]);
    let renderer = FakeRenderer::default()
        .with("uno.pdf", &[&invoice_text("UNO")])
        .with("dos.pdf", &[&invoice_text("DOS")]);
    let model = FakeModel::default()
        .answer("UNO", &format!("{HEADER}\n01/01/2024;US Corp;Licencia;100;dolares"))
        .answer("DOS", &format!("{HEADER}\n02/01/2024;US Corp;Soporte;100;dolares"));

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    let saved = save_batch(&cfg, output.batch).unwrap();
    assert_eq!(saved.converted, 2);

    let rows = stored_rows(Path::new(&cfg.paths.database), "facturas");
    let amounts: Vec<Option<f64>> = rows.iter().map(|r| r.importe).collect();
    assert_eq!(amounts, vec![Some(92.43), Some(92.43)]);
}

#[test]
fn folders_are_processed_in_sorted_order() {
    let (_tmp, cfg) = workspace(&[("b-febrero", "f.pdf"), ("a-enero", "e.pdf"), ("c-marzo", "m.pdf")]);
    let renderer = FakeRenderer::default()
        .with("f.pdf", &[&invoice_text("FEB")])
        .with("e.pdf", &[&invoice_text("ENE")])
        .with("m.pdf", &[&invoice_text("MAR")]);
    let model = FakeModel::default()
        .answer("FEB", &format!("{HEADER}\n01/02/2024;P;febrero;2;euros"))
        .answer("ENE", &format!("{HEADER}\n01/01/2024;P;enero;1;euros"))
        .answer("MAR", &format!("{HEADER}\n01/03/2024;P;marzo;3;euros"));

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    let conceptos: Vec<String> = output
        .batch
        .finalize("dolares", 1.0)
        .rows
        .into_iter()
        .map(|r| r.concepto)
        .collect();
    assert_eq!(conceptos, vec!["enero", "febrero", "marzo"]);
    assert_eq!(output.report.totals.folders, 3);
}

#[test]
fn unreadable_document_does_not_stop_the_batch() {
    let (_tmp, cfg) = workspace(&[("q1", "roto.pdf"), ("q2", "bien.pdf")]);
    // roto.pdf is unknown to the renderer and fails to open.
    let renderer = FakeRenderer::default().with("bien.pdf", &[&invoice_text("BIEN")]);
    let model = FakeModel::default()
        .answer("BIEN", &format!("{HEADER}\n01/01/2024;P;bien;10;euros"));

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    assert_eq!(output.batch.len(), 1);
    assert_eq!(output.report.count(OutcomeKind::Unreadable), 1);
    let broken = &output.report.documents[0];
    assert_eq!(broken.outcome, OutcomeKind::Unreadable);
    assert_eq!(broken.content, None);
}

#[test]
fn scanned_document_goes_through_the_image_call() {
    let (_tmp, cfg) = workspace(&[("q1", "escaneo.pdf")]);
    let renderer = FakeRenderer::default().with("escaneo.pdf", &[""]);
    // The fake renderer encodes the file name as the image payload.
    let model = FakeModel::default()
        .answer("escaneo.pdf", &format!("{HEADER}\n01/01/2024;P;escaneada;4,5;euros"));

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    assert_eq!(output.report.documents[0].content, Some(ContentKind::Image));
    let rows = output.batch.finalize("dolares", 0.9243).rows;
    assert_eq!(rows[0].importe, Some(4.5));
}

#[test]
fn transport_failures_skip_the_document() {
    let (_tmp, cfg) = workspace(&[("q1", "red.pdf"), ("q1", "cuota.pdf")]);
    let renderer = FakeRenderer::default()
        .with("red.pdf", &[&invoice_text("RED")])
        .with("cuota.pdf", &[&invoice_text("CUOTA")]);
    let model = FakeModel::default()
        .fail("RED", ModelCallError::Network("connection reset".into()))
        .fail(
            "CUOTA",
            ModelCallError::RateLimited {
                message: "quota".into(),
            },
        );

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    assert!(output.batch.is_empty());
    assert_eq!(output.report.count(OutcomeKind::ModelError), 2);
    assert_eq!(output.report.totals.skipped, 2);
}

#[test]
fn rejected_credentials_abort_the_run() {
    let (_tmp, cfg) = workspace(&[("q1", "a.pdf"), ("q2", "b.pdf")]);
    let renderer = FakeRenderer::default()
        .with("a.pdf", &[&invoice_text("AAA")])
        .with("b.pdf", &[&invoice_text("BBB")]);
    let model = FakeModel::default().fail(
        "AAA",
        ModelCallError::Unauthorized {
            status: 403,
            message: "API key not valid".into(),
        },
    );

    let pipeline = Pipeline::new(&cfg, renderer, model);
    let err = pipeline.run().err().expect("run should abort");
    assert!(err.to_string().contains("credentials rejected"));
}

#[test]
fn rejected_credentials_can_be_skipped() {
    let (_tmp, mut cfg) = workspace(&[("q1", "a.pdf")]);
    cfg.model.abort_on_auth_error = false;
    let renderer = FakeRenderer::default().with("a.pdf", &[&invoice_text("AAA")]);
    let model = FakeModel::default().fail("AAA", ModelCallError::MissingApiKey);

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    assert!(output.batch.is_empty());
    assert_eq!(output.report.count(OutcomeKind::ModelError), 1);
}

#[test]
fn incomplete_columns_are_rejected() {
    let (_tmp, cfg) = workspace(&[("q1", "a.pdf")]);
    let renderer = FakeRenderer::default().with("a.pdf", &[&invoice_text("AAA")]);
    let model = FakeModel::default()
        .answer("AAA", "fecha_factura;proveedor;concepto;importe\n01/01/2024;P;c;1");

    let pipeline = Pipeline::new(&cfg, renderer, model);
    match pipeline.process_document(&Path::new(&cfg.paths.input_dir).join("q1/a.pdf")) {
        DocumentOutcome::Rejected { content, .. } => assert_eq!(content, ContentKind::Text),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn discovery_ignores_top_level_files() {
    let (tmp, cfg) = workspace(&[("q1", "a.pdf"), ("q1", "b.pdf")]);
    fs::write(tmp.path().join("facturas").join("notas.txt"), b"x").unwrap();

    let folders = discover_documents(Path::new(&cfg.paths.input_dir)).unwrap();
    assert_eq!(folders.len(), 1);
    let mut names: Vec<String> = folders[0]
        .documents
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);
}

#[test]
fn missing_input_dir_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(discover_documents(&tmp.path().join("nope")).is_err());
}

#[test]
fn aborted_run_reports_rows_it_could_not_save() {
    let (_tmp, cfg) = workspace(&[("a", "bien.pdf"), ("b", "vetada.pdf")]);
    let renderer = FakeRenderer::default()
        .with("bien.pdf", &[&invoice_text("BIEN")])
        .with("vetada.pdf", &[&invoice_text("VETADA")]);
    let model = FakeModel::default()
        .answer("BIEN", &format!("{HEADER}\n01/01/2024;P;bien;10;euros"))
        .fail(
            "VETADA",
            ModelCallError::Unauthorized {
                status: 403,
                message: "forbidden".into(),
            },
        );

    let err = Pipeline::new(&cfg, renderer, model)
        .run()
        .err()
        .expect("run should abort");
    let msg = err.to_string();
    assert!(msg.contains("vetada.pdf"), "{msg}");
    assert!(msg.contains("1 rows gathered before the failure were not saved"), "{msg}");
    assert!(!Path::new(&cfg.paths.database).exists());
}

#[test]
fn saving_reports_the_table_total_across_runs() {
    let (_tmp, cfg) = workspace(&[("q1", "a.pdf")]);
    let reply = format!("{HEADER}\n01/01/2024;P;a;1;euros\n02/01/2024;P;b;2;euros");

    for expected in [2, 4] {
        let renderer = FakeRenderer::default().with("a.pdf", &[&invoice_text("AAA")]);
        let model = FakeModel::default().answer("AAA", &reply);
        let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
        let saved = save_batch(&cfg, output.batch).unwrap();
        assert_eq!(saved.persisted, 2);
        assert_eq!(saved.table_rows, expected);
    }
}

#[test]
fn empty_run_guidance_points_at_the_response_dump() {
    let (_tmp, cfg) = workspace(&[("q1", "a.pdf"), ("q1", "b.pdf")]);
    let renderer = FakeRenderer::default()
        .with("a.pdf", &[&invoice_text("AAA")])
        .with("b.pdf", &[&invoice_text("BBB")]);
    let model = FakeModel::default().answer("BBB", "no puedo leer esto");

    let output = Pipeline::new(&cfg, renderer, model).run().unwrap();
    assert!(output.batch.is_empty());

    let lines = empty_run_guidance(&cfg, &output.report);
    assert!(lines.iter().any(|l| l.contains("GEMINI_API_KEY")));
    let last = lines.last().unwrap();
    assert!(last.contains("--log-level debug"), "{last}");
    assert!(last.contains("declined: 1, rejected: 1"), "{last}");
}
