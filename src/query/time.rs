//! Time-field fallback for platforms without creation times.

use std::path::Path;

use serde::Serialize;

use super::search::TimeField;

/// The time field a search should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedTimeField {
    pub field: TimeField,
    /// `Created` was requested but is unavailable; `Modified` is used instead.
    pub degraded: bool,
}

/// Resolve `requested` against what the filesystem reports for `probe`.
///
/// Creation time is only kept when `probe` exposes one.
#[must_use]
pub fn resolve_time_field(requested: TimeField, probe: &Path) -> ResolvedTimeField {
    if requested == TimeField::Modified {
        return ResolvedTimeField {
            field: TimeField::Modified,
            degraded: false,
        };
    }

    match std::fs::metadata(probe).and_then(|m| m.created()) {
        Ok(_) => ResolvedTimeField {
            field: TimeField::Created,
            degraded: false,
        },
        Err(e) => {
            tracing::info!(
                probe = %probe.display(),
                error = %e,
                "Creation time unavailable, using modification time"
            );
            ResolvedTimeField {
                field: TimeField::Modified,
                degraded: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_modified_is_never_degraded() {
        let resolved = resolve_time_field(TimeField::Modified, Path::new("/definitely/missing"));
        assert_eq!(resolved.field, TimeField::Modified);
        assert!(!resolved.degraded);
    }

    #[test]
    fn test_missing_probe_degrades_created() {
        let resolved = resolve_time_field(TimeField::Created, Path::new("/definitely/missing"));
        assert_eq!(resolved.field, TimeField::Modified);
        assert!(resolved.degraded);
    }

    #[test]
    fn test_created_matches_platform_support() {
        let tmp = TempDir::new().unwrap();
        let supported = std::fs::metadata(tmp.path())
            .and_then(|m| m.created())
            .is_ok();

        let resolved = resolve_time_field(TimeField::Created, tmp.path());
        assert_eq!(resolved.degraded, !supported);
        assert_eq!(resolved.field == TimeField::Created, supported);
    }
}
