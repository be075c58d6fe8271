//! Pre-flight resource ceilings

use crate::{GatekeeperError, ResourceLimits};
use std::path::Path;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Enforces file-size and chunk-count ceilings before any model call
#[derive(Debug, Clone, Default)]
pub struct ResourceGuard {
    limits: ResourceLimits,
}

impl ResourceGuard {
    /// Create a guard with the given limits
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }

    /// The active limits
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Fail if the file at `path` is larger than the ceiling
    pub fn check_file_size(&self, path: &Path) -> Result<(), GatekeeperError> {
        let size_mb = std::fs::metadata(path)?.len() as f64 / BYTES_PER_MB;
        debug!("{} is {:.2}MB", path.display(), size_mb);
        if size_mb > self.limits.max_file_size_mb as f64 {
            return Err(GatekeeperError::FileTooLarge {
                size_mb,
                max_mb: self.limits.max_file_size_mb,
            });
        }
        Ok(())
    }

    /// Fail if a run would process more chunks than the ceiling
    pub fn check_chunk_count(&self, count: usize) -> Result<(), GatekeeperError> {
        if count > self.limits.max_chunks {
            return Err(GatekeeperError::TooManyChunks {
                count,
                max: self.limits.max_chunks,
            });
        }
        Ok(())
    }
}
