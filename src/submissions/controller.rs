use std::{collections::HashMap, sync::Arc};

use crate::{
    error::SubmissionError,
    log_error, log_warn,
    materialize::{self, PredictionBody},
    models::FeatureRecord,
    prediction::PredictionAdapter,
    schema::validate_columns,
    session::{SessionId, SessionPayload, SessionStore},
    upload::{check_upload, read_batch, UploadLimits, UploadedFile},
};

const ENABLE_LOGS: bool = true;

/// Runs submissions through validation, scoring and materialization, and
/// owns the hand-off to the session store.
#[derive(Clone)]
pub struct SubmissionController {
    adapter: PredictionAdapter,
    store: Arc<dyn SessionStore>,
    limits: UploadLimits,
}

impl SubmissionController {
    pub fn new(adapter: PredictionAdapter, store: Arc<dyn SessionStore>, limits: UploadLimits) -> Self {
        Self {
            adapter,
            store,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn submit_manual(
        &self,
        session: &SessionId,
        fields: &HashMap<String, String>,
    ) -> Result<PredictionBody, SubmissionError> {
        self.discard_previous(session).await;

        let record = FeatureRecord::from_fields(fields)?;
        let level = self.adapter.predict_one(&record)?;
        Ok(materialize::single(level))
    }

    /// Score an uploaded file and store the results for the session.
    pub async fn submit_batch(
        &self,
        session: &SessionId,
        file: Option<&UploadedFile>,
    ) -> Result<SessionPayload, SubmissionError> {
        self.discard_previous(session).await;

        let payload = self.process_upload(file)?;
        self.store.put(session, payload.clone()).await?;
        Ok(payload)
    }

    pub fn process_upload(
        &self,
        file: Option<&UploadedFile>,
    ) -> Result<SessionPayload, SubmissionError> {
        let file = check_upload(file, &self.limits)?;
        self.process_bytes(&file.bytes)
    }

    /// Reader, schema gate, adapter, materializer. Schema problems never
    /// reach the scorer.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<SessionPayload, SubmissionError> {
        let batch = read_batch(bytes)?;
        validate_columns(&batch.columns)?;
        let scored = self.adapter.predict_batch(batch)?;
        Ok(materialize::package(&scored)?)
    }

    /// Stored results for the session. A store failure reads as "no results".
    pub async fn results(&self, session: &SessionId) -> Option<SessionPayload> {
        match self.store.get(session).await {
            Ok(payload) => payload,
            Err(err) => {
                log_error!("Failed to load results for session {session}: {err:#}");
                None
            }
        }
    }

    async fn discard_previous(&self, session: &SessionId) {
        if let Err(err) = self.store.clear(session).await {
            log_warn!("Failed to discard previous results for session {session}: {err:#}");
        }
    }
}
