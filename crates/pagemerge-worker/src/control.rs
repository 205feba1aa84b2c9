//! Control file that keeps the run loop going.

use std::path::PathBuf;

use tracing;

/// A text file whose trimmed content, compared case-insensitively to
/// `true`, requests another pass.
#[derive(Debug, Clone)]
pub struct ControlFile {
    path: PathBuf,
}

impl ControlFile {
    /// Create a control file reader for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether another pass is requested. A missing or unreadable file stops the loop.
    pub async fn should_repeat(&self) -> bool {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content.trim().eq_ignore_ascii_case("true"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Control file unreadable, stopping");
                false
            }
        }
    }
}
