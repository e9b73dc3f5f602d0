use anyhow::anyhow;
use platform_api::ApiError;
use platform_authz::{Action, AuthzError};
use products_crm::{PipelineError, RepositoryError};

/// Coded client error for a failed pipeline operation.
pub fn api_error(err: PipelineError) -> ApiError {
    match err {
        PipelineError::Authorization(AuthzError::Unauthenticated { .. }) => {
            ApiError::Unauthenticated
        }
        PipelineError::Authorization(AuthzError::Denied { action, .. }) => {
            ApiError::Forbidden(not_owner(action))
        }
        PipelineError::Repository(RepositoryError::Forbidden(_)) => {
            ApiError::Forbidden("You can only change deals that you own".into())
        }
        PipelineError::UnknownDeal(id) | PipelineError::Repository(RepositoryError::NotFound(id)) => {
            ApiError::NotFound(format!("deal {id}"))
        }
        PipelineError::Validation(errors) => ApiError::validation(
            errors
                .fields
                .iter()
                .map(|issue| (issue.field, issue.message)),
        ),
        PipelineError::InvalidStage(err) => ApiError::validation([("stage", err.to_string())]),
        PipelineError::Repository(RepositoryError::Unavailable(_)) | PipelineError::Timeout(_) => {
            ApiError::Unavailable
        }
        other @ (PipelineError::Repository(_) | PipelineError::Aborted) => {
            ApiError::internal(anyhow!(other))
        }
    }
}

fn not_owner(action: Action) -> String {
    let verb = match action {
        Action::View => "view",
        Action::MoveStage => "move",
        Action::Edit => "edit",
        Action::Delete => "delete",
    };
    format!("You can only {verb} deals that you own")
}
