// crates/honeygrid-sync/src/map.rs
// ============================================================================
// Module: Honeygrid Routing Map
// Description: nginx map rendering and structural validation.
// Purpose: Render the cookie-to-upstream map nginx resolves per request.
// Dependencies: crate::error, honeygrid_core
// ============================================================================

//! ## Overview
//! The routing map is an nginx `map` block keyed on the `hgsess` cookie:
//! the default row sends unrecognized visitors to the shared tier-1 pool,
//! and each committed assignment contributes one quoted row pointing at the
//! container's upstream address. Rendering is pure; validation checks the
//! structure nginx itself would reject (missing map directive, unbalanced
//! braces) before a file is ever installed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use honeygrid_core::RoutingEntry;
use honeygrid_core::Timestamp;

use crate::error::SyncError;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Map directive every valid routing map must contain.
pub const MAP_MARKER: &str = "map $cookie_hgsess $honeygrid_upstream";

/// Renders the full routing map content.
///
/// Entries are emitted in the order given; callers pass store scans, which
/// are already in ascending session-id order, so the rendered file is
/// deterministic for a given table state.
#[must_use]
pub fn render_map(default_upstream: &str, entries: &[RoutingEntry], now: Timestamp) -> String {
    let mut content = String::new();
    let _ = writeln!(
        content,
        "# =============================================================================\n\
         # Honeygrid - Upstream Routing Map\n\
         # =============================================================================\n\
         # Generated automatically by the Honeygrid control plane.\n\
         # DO NOT EDIT MANUALLY - changes will be overwritten.\n\
         #\n\
         # Generated: {now}\n\
         # Total entries: {}\n\
         # =============================================================================\n",
        entries.len()
    );
    let _ = writeln!(content, "{MAP_MARKER} {{");
    let _ = writeln!(content, "    default \"{default_upstream}\";");
    for entry in entries {
        let _ = writeln!(content, "\n    # Session: {}", entry.session_id);
        let _ = writeln!(content, "    \"{}\" \"{}\";", entry.routing_key, entry.upstream);
    }
    content.push_str("}\n");
    content
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Structurally validates rendered map content.
///
/// # Errors
///
/// Returns [`SyncError::Validate`] when the map directive is missing or the
/// braces are unbalanced.
pub fn validate_map(content: &str) -> Result<(), SyncError> {
    if !content.contains(MAP_MARKER) {
        return Err(SyncError::Validate("map directive missing".to_string()));
    }
    let mut depth: i64 = 0;
    for ch in content.chars() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(SyncError::Validate("unbalanced closing brace".to_string()));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SyncError::Validate(format!("unbalanced braces: depth {depth}")));
    }
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

    use honeygrid_core::RoutingKey;
    use honeygrid_core::SessionId;
    use honeygrid_core::UpstreamAddr;

    use super::*;

    fn entry(key: &str, session: &str, host: &str, port: u16) -> RoutingEntry {
        RoutingEntry::new(
            RoutingKey::parse(key).unwrap(),
            SessionId::new(session),
            UpstreamAddr::new(host, port),
            Timestamp::from_unix_millis(1_000),
        )
    }

    #[test]
    fn rendered_map_contains_default_and_entry_rows() {
        let entries =
            vec![entry("hgsess_0123456789abcdef", "sess-a", "10.0.2.7", 8_091)];
        let content = render_map("tier1_pool", &entries, Timestamp::from_unix_millis(5_000));
        assert!(content.contains("map $cookie_hgsess $honeygrid_upstream {"));
        assert!(content.contains("default \"tier1_pool\";"));
        assert!(content.contains("\"hgsess_0123456789abcdef\" \"10.0.2.7:8091\";"));
        assert!(content.contains("# Session: sess-a"));
        assert!(content.contains("# Total entries: 1"));
        validate_map(&content).unwrap();
    }

    #[test]
    fn empty_table_renders_default_only() {
        let content = render_map("tier1_pool", &[], Timestamp::from_unix_millis(0));
        assert!(content.contains("# Total entries: 0"));
        validate_map(&content).unwrap();
    }

    #[test]
    fn validation_rejects_structural_damage() {
        assert!(matches!(
            validate_map("upstream pool { }"),
            Err(SyncError::Validate(_))
        ));
        let content = render_map("tier1_pool", &[], Timestamp::from_unix_millis(0));
        let truncated = content.trim_end_matches("}\n");
        assert!(matches!(validate_map(truncated), Err(SyncError::Validate(_))));
        let extra = format!("{content}}}");
        assert!(matches!(validate_map(&extra), Err(SyncError::Validate(_))));
    }
}
