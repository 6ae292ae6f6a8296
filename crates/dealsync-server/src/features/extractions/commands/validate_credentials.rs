//! Validate credentials command

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::ingest::{JobError, JobTracker};

/// Request body of `POST /credentials/validate`
#[derive(Clone, Deserialize)]
pub struct ValidateCredentialsCommand {
    #[serde(default)]
    pub access_token: String,
}

impl std::fmt::Debug for ValidateCredentialsCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidateCredentialsCommand")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCredentialsResponse {
    pub valid: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidateCredentialsError {
    #[error("access_token is required")]
    MissingToken,

    #[error(transparent)]
    Job(#[from] JobError),
}

impl Request<Result<ValidateCredentialsResponse, ValidateCredentialsError>>
    for ValidateCredentialsCommand
{
}

#[tracing::instrument(skip_all)]
pub async fn handle(
    tracker: &JobTracker,
    command: ValidateCredentialsCommand,
) -> Result<ValidateCredentialsResponse, ValidateCredentialsError> {
    let token = command.access_token.trim();
    if token.is_empty() {
        return Err(ValidateCredentialsError::MissingToken);
    }

    let valid = tracker.validate_credentials(token).await?;
    Ok(ValidateCredentialsResponse { valid })
}
