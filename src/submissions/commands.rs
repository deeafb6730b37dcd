//! Request-boundary commands.
//!
//! Each function takes the data a web layer extracted from one request and
//! returns a serializable response plus its status code. No error escapes as
//! a panic or an `Err`; everything is resolved here.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    error::{ErrorPayload, SubmissionError},
    log_error, log_info, log_warn,
    materialize::{PredictionBody, DOWNLOAD_CONTENT_TYPE, DOWNLOAD_FILENAME},
    session::{SessionId, SessionPayload},
    upload::UploadedFile,
    AppState,
};

const ENABLE_LOGS: bool = true;

pub const INDEX_LOCATION: &str = "/";
pub const RESULTS_LOCATION: &str = "/results";

/// Body of a POST to the submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmitResponse {
    Prediction(PredictionBody),
    Redirect { success: bool, redirect: String },
    Error(ErrorPayload),
}

impl SubmitResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            SubmitResponse::Prediction(_) | SubmitResponse::Redirect { .. } => 200,
            SubmitResponse::Error(payload) => payload.kind.status_code(),
        }
    }

    fn from_error(action: &str, session: &SessionId, err: SubmissionError) -> Self {
        match &err {
            SubmissionError::Internal(detail) => {
                log_error!("{action} failed for session {session}: {detail}");
            }
            other => {
                log_warn!(
                    "{action} rejected for session {session} ({}): {other}",
                    other.kind().as_str()
                );
            }
        }
        SubmitResponse::Error(err.to_payload())
    }
}

/// Outcome of a GET on a page that needs stored results.
#[derive(Debug, Clone, PartialEq)]
pub enum PageResponse<T> {
    Render(T),
    Redirect { location: &'static str },
}

impl<T> PageResponse<T> {
    pub fn status_code(&self) -> u16 {
        match self {
            PageResponse::Render(_) => 200,
            PageResponse::Redirect { .. } => 302,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Form fields of the index page. `form_type` selects the mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmittedForm {
    pub form_type: Option<String>,
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

pub async fn submit_form(state: &AppState, session: &SessionId, form: &SubmittedForm) -> SubmitResponse {
    match form.form_type.as_deref().map(str::trim) {
        Some("upload") => submit_upload(state, session, form.file.as_ref()).await,
        Some("manual") => submit_manual(state, session, &form.fields).await,
        other => SubmitResponse::from_error(
            "Submission",
            session,
            SubmissionError::input(format!(
                "Unknown form type '{}'",
                other.unwrap_or_default()
            )),
        ),
    }
}

pub async fn submit_manual(
    state: &AppState,
    session: &SessionId,
    fields: &HashMap<String, String>,
) -> SubmitResponse {
    match state.submissions.submit_manual(session, fields).await {
        Ok(body) => {
            log_info!("Manual prediction for session {session}: {}", body.prediction);
            SubmitResponse::Prediction(body)
        }
        Err(err) => SubmitResponse::from_error("Manual prediction", session, err),
    }
}

pub async fn submit_upload(
    state: &AppState,
    session: &SessionId,
    file: Option<&UploadedFile>,
) -> SubmitResponse {
    match state.submissions.submit_batch(session, file).await {
        Ok(payload) => {
            let summary = payload.summary;
            log_info!(
                "Scored {} rows for session {session} (low {}, medium {}, high {})",
                summary.total,
                summary.low,
                summary.medium,
                summary.high
            );
            SubmitResponse::Redirect {
                success: true,
                redirect: RESULTS_LOCATION.to_string(),
            }
        }
        Err(err) => SubmitResponse::from_error("Batch upload", session, err),
    }
}

pub async fn view_results(state: &AppState, session: &SessionId) -> PageResponse<SessionPayload> {
    match state.submissions.results(session).await {
        Some(payload) => PageResponse::Render(payload),
        None => PageResponse::Redirect {
            location: INDEX_LOCATION,
        },
    }
}

pub async fn download_results(state: &AppState, session: &SessionId) -> PageResponse<DownloadFile> {
    match state.submissions.results(session).await {
        Some(payload) => PageResponse::Render(DownloadFile {
            filename: DOWNLOAD_FILENAME,
            content_type: DOWNLOAD_CONTENT_TYPE,
            bytes: payload.csv_bytes,
        }),
        None => PageResponse::Redirect {
            location: INDEX_LOCATION,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        error::ErrorKind,
        prediction::{pipeline::testing::anxiety_threshold_pipeline, LinearPipeline},
        schema::FEATURE_COLUMNS,
        settings::AppConfig,
    };

    fn state() -> AppState {
        AppState::with_scorer(AppConfig::default(), Arc::new(anxiety_threshold_pipeline()))
            .unwrap()
    }

    fn manual_fields(anxiety: &str) -> HashMap<String, String> {
        let mut fields: HashMap<String, String> = FEATURE_COLUMNS
            .iter()
            .map(|name| (name.to_string(), "2".to_string()))
            .collect();
        fields.insert("anxiety_level".into(), anxiety.into());
        fields
    }

    fn upload(body: &str) -> UploadedFile {
        UploadedFile::new("students.csv", body.as_bytes().to_vec())
    }

    fn three_row_csv() -> String {
        let mut body = FEATURE_COLUMNS.join(",");
        body.push('\n');
        for anxiety in ["0", "10", "20"] {
            let mut row = vec!["2"; FEATURE_COLUMNS.len()];
            row[0] = anxiety;
            body.push_str(&row.join(","));
            body.push('\n');
        }
        body
    }

    #[test]
    fn response_shapes_match_contract() {
        let prediction = SubmitResponse::Prediction(PredictionBody { prediction: 1 });
        assert_eq!(serde_json::to_value(&prediction).unwrap(), json!({ "prediction": 1 }));
        assert_eq!(prediction.status_code(), 200);

        let redirect = SubmitResponse::Redirect {
            success: true,
            redirect: RESULTS_LOCATION.into(),
        };
        assert_eq!(
            serde_json::to_value(&redirect).unwrap(),
            json!({ "success": true, "redirect": "/results" })
        );

        let error = SubmitResponse::Error(SubmissionError::scoring("bad").to_payload());
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({ "error": true, "kind": "scoring", "message": "bad" })
        );
        assert_eq!(error.status_code(), 422);
    }

    #[tokio::test]
    async fn manual_submission_returns_label() {
        let state = state();
        let session = SessionId::generate();
        let response = submit_manual(&state, &session, &manual_fields("20")).await;
        assert_eq!(response, SubmitResponse::Prediction(PredictionBody { prediction: 2 }));
    }

    #[tokio::test]
    async fn manual_submission_with_bad_value_is_400() {
        let state = state();
        let response = submit_manual(&state, &SessionId::generate(), &manual_fields("lots")).await;
        assert_eq!(response.status_code(), 400);
    }

    #[tokio::test]
    async fn form_dispatches_on_type() {
        let state = state();
        let session = SessionId::generate();

        let manual = SubmittedForm {
            form_type: Some("manual".into()),
            fields: manual_fields("0"),
            file: None,
        };
        assert_eq!(
            submit_form(&state, &session, &manual).await,
            SubmitResponse::Prediction(PredictionBody { prediction: 0 })
        );

        let upload_form = SubmittedForm {
            form_type: Some("upload".into()),
            fields: HashMap::new(),
            file: Some(upload(&three_row_csv())),
        };
        assert_eq!(submit_form(&state, &session, &upload_form).await.status_code(), 200);

        let unknown = SubmittedForm {
            form_type: Some("survey".into()),
            ..SubmittedForm::default()
        };
        let response = submit_form(&state, &session, &unknown).await;
        let SubmitResponse::Error(payload) = response else {
            panic!("expected error");
        };
        assert_eq!(payload.message, "Unknown form type 'survey'");
    }

    #[tokio::test]
    async fn upload_then_view_and_download() {
        let state = state();
        let session = SessionId::generate();

        let response = submit_upload(&state, &session, Some(&upload(&three_row_csv()))).await;
        assert_eq!(
            response,
            SubmitResponse::Redirect {
                success: true,
                redirect: "/results".into()
            }
        );

        let PageResponse::Render(view) = view_results(&state, &session).await else {
            panic!("expected results");
        };
        assert_eq!(view.summary.total, 3);
        assert_eq!((view.summary.low, view.summary.medium, view.summary.high), (1, 1, 1));
        assert_eq!(view.records[2]["stress_level_prediction"], 2);

        let PageResponse::Render(file) = download_results(&state, &session).await else {
            panic!("expected download");
        };
        assert_eq!(file.filename, "stress_predictions.csv");
        let text = String::from_utf8(file.bytes).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().next().unwrap().ends_with(",stress_level_prediction"));
    }

    #[tokio::test]
    async fn overflowing_value_is_a_scoring_rejection() {
        let pipeline = LinearPipeline::from_json_str(include_str!(
            "../../assets/stress_pipeline.json"
        ))
        .unwrap();
        let state = AppState::with_scorer(AppConfig::default(), Arc::new(pipeline)).unwrap();

        let mut body = FEATURE_COLUMNS.join(",");
        body.push('\n');
        let mut row = vec!["1"; FEATURE_COLUMNS.len()];
        row[2] = "1e308";
        body.push_str(&row.join(","));
        body.push('\n');

        let response = submit_upload(&state, &SessionId::generate(), Some(&upload(&body))).await;
        assert_eq!(response.status_code(), 422);
        let SubmitResponse::Error(payload) = response else {
            panic!("expected error");
        };
        assert_eq!(payload.kind, ErrorKind::Scoring);
        assert!(payload.message.contains("Row 1 has values too large to score"));
    }

    #[tokio::test]
    async fn results_without_submission_redirect_home() {
        let state = state();
        let session = SessionId::generate();

        let view = view_results(&state, &session).await;
        assert_eq!(view, PageResponse::Redirect { location: "/" });
        assert_eq!(view.status_code(), 302);
        assert_eq!(
            download_results(&state, &session).await,
            PageResponse::Redirect { location: "/" }
        );
    }

    #[tokio::test]
    async fn failed_upload_discards_previous_results() {
        let state = state();
        let session = SessionId::generate();
        submit_upload(&state, &session, Some(&upload(&three_row_csv()))).await;

        let response = submit_upload(&state, &session, Some(&upload("col_a,col_b\n1,2\n"))).await;
        assert_eq!(response.status_code(), 400);
        assert_eq!(
            view_results(&state, &session).await,
            PageResponse::Redirect { location: "/" }
        );
    }

    #[tokio::test]
    async fn other_sessions_keep_their_results() {
        let state = state();
        let mine = SessionId::generate();
        let theirs = SessionId::generate();
        submit_upload(&state, &theirs, Some(&upload(&three_row_csv()))).await;
        submit_manual(&state, &mine, &manual_fields("5")).await;

        assert!(matches!(
            view_results(&state, &theirs).await,
            PageResponse::Render(_)
        ));
    }
}
