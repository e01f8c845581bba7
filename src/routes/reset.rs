//! Container reset endpoint.

use axum::extract::{Path, State};

use crate::container::ContainerName;
use crate::error::AppError;
use crate::state::AppState;

/// `POST /reset/{container}`: reset the container and answer "OK" once it is done.
///
/// Blocks until the init script has exited and, for probed containers, the
/// dependent service accepts connections.
pub async fn reset(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> Result<&'static str, AppError> {
    let container = ContainerName::parse(&container)?;
    state.resetter.reset(&container).await?;
    Ok("OK")
}
