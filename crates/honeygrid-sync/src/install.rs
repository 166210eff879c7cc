// crates/honeygrid-sync/src/install.rs
// ============================================================================
// Module: Honeygrid Map Install
// Description: Atomic installation of rendered routing map files.
// Purpose: Ensure nginx only ever reads a complete, validated map.
// Dependencies: crate::{error, map}, tempfile
// ============================================================================

//! ## Overview
//! The map file is installed with the classic temp-and-rename protocol: the
//! rendered content is validated, written to a named temporary file in the
//! same directory as the target (so the final rename never crosses a
//! filesystem boundary), flushed, and then persisted over the target path
//! in one atomic step. On any failure the temporary file is discarded and
//! the previously installed file is left byte-identical.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::SyncError;
use crate::map::validate_map;

// ============================================================================
// SECTION: Install
// ============================================================================

/// Validates and atomically installs map content at the given path.
///
/// # Errors
///
/// Returns [`SyncError::Validate`] for structurally invalid content,
/// [`SyncError::Io`] when the temporary file cannot be created or written,
/// and [`SyncError::Install`] when the final rename fails. The installed
/// file is untouched in every error case.
pub fn install_map(path: &Path, content: &str) -> Result<(), SyncError> {
    validate_map(content)?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| SyncError::Io("map path has no parent directory".to_string()))?;
    let mut temp = NamedTempFile::new_in(directory).map_err(|err| SyncError::Io(err.to_string()))?;
    temp.write_all(content.as_bytes()).map_err(|err| SyncError::Io(err.to_string()))?;
    temp.flush().map_err(|err| SyncError::Io(err.to_string()))?;
    temp.persist(path).map_err(|err| SyncError::Install(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use honeygrid_core::Timestamp;

    use super::*;
    use crate::map::render_map;

    #[test]
    fn install_replaces_the_target_atomically() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("honeygrid_upstream.map");
        let first = render_map("tier1_pool", &[], Timestamp::from_unix_millis(1));
        install_map(&target, &first).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), first);

        let second = render_map("tier2_pool", &[], Timestamp::from_unix_millis(2));
        install_map(&target, &second).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), second);
    }

    #[test]
    fn invalid_content_leaves_the_installed_file_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("honeygrid_upstream.map");
        let good = render_map("tier1_pool", &[], Timestamp::from_unix_millis(1));
        install_map(&target, &good).unwrap();

        let err = install_map(&target, "not a map").unwrap_err();
        assert!(matches!(err, SyncError::Validate(_)));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), good);

        // No temp files are left behind either.
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("absent").join("honeygrid_upstream.map");
        let content = render_map("tier1_pool", &[], Timestamp::from_unix_millis(1));
        assert!(matches!(install_map(&target, &content), Err(SyncError::Io(_))));
    }
}
