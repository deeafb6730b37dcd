use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use serde_json::json;
use stress_gauge_lib::{
    prediction::{LinearPipeline, ScoreError, Scorer},
    schema::{FEATURE_COLUMNS, PREDICTION_COLUMN},
    session::SessionId,
    settings::AppConfig,
    submissions::{
        download_results, submit_manual, submit_upload, view_results, PageResponse,
        SubmitResponse,
    },
    upload::UploadedFile,
    AppState,
};

/// Anxiety decides everything: 0 below 5, 1 up to 15, 2 above.
fn anxiety_pipeline() -> LinearPipeline {
    let names: Vec<&str> = FEATURE_COLUMNS.to_vec();
    let width = names.len();
    let mut mean = vec![0.0; width];
    let mut scale = vec![1.0; width];
    mean[0] = 10.0;
    scale[0] = 10.0;
    let mut coefficients = vec![vec![0.0; width]; 3];
    coefficients[0][0] = -10.0;
    coefficients[2][0] = 10.0;

    let artifact = json!({
        "feature_names": names,
        "scaler": { "mean": mean, "scale": scale },
        "classes": [0, 1, 2],
        "coefficients": coefficients,
        "intercepts": [-5.0, 0.0, -5.0],
    });
    LinearPipeline::from_json_str(&artifact.to_string()).unwrap()
}

/// Counts calls and labels every row 1.
struct CountingScorer {
    names: Vec<String>,
    calls: AtomicUsize,
}

impl Scorer for CountingScorer {
    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<u8>, ScoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1; rows.len()])
    }
}

fn csv_with(anxiety: &[&str]) -> UploadedFile {
    let mut body = FEATURE_COLUMNS.join(",");
    body.push('\n');
    for value in anxiety {
        let mut row = vec!["3"; FEATURE_COLUMNS.len()];
        row[0] = value;
        body.push_str(&row.join(","));
        body.push('\n');
    }
    UploadedFile::new("cohort.csv", body.into_bytes())
}

#[tokio::test]
async fn batch_upload_round_trip() {
    let state = AppState::with_scorer(AppConfig::default(), Arc::new(anxiety_pipeline())).unwrap();
    let session = SessionId::generate();

    let response = submit_upload(&state, &session, Some(&csv_with(&["1", "12", "19", "2"]))).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "success": true, "redirect": "/results" })
    );

    let PageResponse::Render(view) = view_results(&state, &session).await else {
        panic!("results should be stored");
    };
    assert_eq!(view.summary.total, 4);
    assert_eq!(view.summary.low, 2);
    assert_eq!(view.summary.medium, 1);
    assert_eq!(view.summary.high, 1);
    assert_eq!(view.columns.last().map(String::as_str), Some(PREDICTION_COLUMN));
    let labels: Vec<_> = view
        .records
        .iter()
        .map(|record| record[PREDICTION_COLUMN].clone())
        .collect();
    assert_eq!(labels, vec![json!(0), json!(1), json!(2), json!(0)]);

    let PageResponse::Render(download) = download_results(&state, &session).await else {
        panic!("download should be available");
    };
    assert_eq!(download.filename, "stress_predictions.csv");
    let text = String::from_utf8(download.bytes).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("anxiety_level,"));
    assert!(header.ends_with(",stress_level_prediction"));
    assert_eq!(lines.count(), 4);
}

#[tokio::test]
async fn schema_mismatch_never_reaches_the_scorer() {
    let scorer = Arc::new(CountingScorer {
        names: FEATURE_COLUMNS.iter().map(|name| name.to_string()).collect(),
        calls: AtomicUsize::new(0),
    });
    let state = AppState::with_scorer(AppConfig::default(), scorer.clone()).unwrap();
    let session = SessionId::generate();

    let file = UploadedFile::new("wrong.csv", b"col_a,col_b\n1,2\n".to_vec());
    let response = submit_upload(&state, &session, Some(&file)).await;

    let SubmitResponse::Error(payload) = &response else {
        panic!("expected an error response");
    };
    assert_eq!(response.status_code(), 400);
    assert_eq!(payload.missing.as_ref().map(Vec::len), Some(FEATURE_COLUMNS.len()));
    assert_eq!(payload.extra, Some(vec!["col_a".to_string(), "col_b".to_string()]));
    assert!(payload.message.contains("Unexpected columns: col_a, col_b"));
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);

    assert_eq!(
        view_results(&state, &session).await,
        PageResponse::Redirect { location: "/" }
    );
}

#[tokio::test]
async fn manual_prediction_replaces_earlier_batch() {
    let state = AppState::with_scorer(AppConfig::default(), Arc::new(anxiety_pipeline())).unwrap();
    let session = SessionId::generate();
    submit_upload(&state, &session, Some(&csv_with(&["1"]))).await;

    let fields: HashMap<String, String> = FEATURE_COLUMNS
        .iter()
        .map(|name| (name.to_string(), "16".to_string()))
        .collect();
    let response = submit_manual(&state, &session, &fields).await;
    assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "prediction": 2 }));

    assert_eq!(
        download_results(&state, &session).await,
        PageResponse::Redirect { location: "/" }
    );
}

#[tokio::test]
async fn sqlite_store_backs_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        session_db_path: Some(dir.path().join("sessions.sqlite3")),
        ..AppConfig::default()
    };
    let state = AppState::with_scorer(config, Arc::new(anxiety_pipeline())).unwrap();
    let session = SessionId::generate();

    submit_upload(&state, &session, Some(&csv_with(&["20", "20"]))).await;

    let PageResponse::Render(view) = view_results(&state, &session).await else {
        panic!("results should be stored");
    };
    assert_eq!(view.summary.high, 2);
    assert!(dir.path().join("sessions.sqlite3").exists());
}
