use scenewatch_api_client::ApiError;

/// Failure of an explicit store action.
///
/// A response discarded because a newer request superseded it is not an
/// error; see [`crate::Outcome::Stale`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error("action declined")]
    ConfirmationDeclined,

    #[error("no job selected")]
    NoJobSelected,
}

pub type Result<T> = std::result::Result<T, SyncError>;
