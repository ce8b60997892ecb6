//! # tool-locate
//!
//! Find the external executables that batch2md shells out to, so that a
//! missing tool is reported once, up front, with an install hint, instead of
//! surfacing as an opaque "No such file or directory" on every document.
//!
//! ## How it works
//!
//! [`locate`] resolves a [`ToolSpec`] in three steps, first match wins:
//!
//! 1. The spec's environment override (e.g. `BATCH2MD_SOFFICE`), if set and
//!    pointing at an existing file.
//! 2. A `PATH` lookup via [`which`].
//! 3. Well-known per-platform install locations (the LibreOffice app bundle
//!    on macOS, `Program Files` on Windows, `~/.local/bin` for pipx installs).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tool_locate::{locate, SOFFICE};
//!
//! let soffice = locate(&SOFFICE).expect("LibreOffice unavailable");
//! println!("using {}", soffice.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `BATCH2MD_SOFFICE` — path to the LibreOffice `soffice` binary.
//! - `BATCH2MD_MINERU` — path to the MinerU `mineru` binary.

use std::path::PathBuf;

use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool-locate operations.
#[derive(Error, Debug)]
pub enum ToolLocateError {
    /// The tool is neither on `PATH` nor in any well-known location.
    #[error("{tool} not found. Please install it:\n{hint}")]
    NotFound { tool: &'static str, hint: &'static str },

    /// The override variable is set but names a file that does not exist.
    #[error("{var} points to '{path}', which does not exist")]
    OverrideMissing { var: &'static str, path: PathBuf },
}

// ── Tool specifications ──────────────────────────────────────────────────────

/// Describes how to find one external executable.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    /// Human-readable tool name used in error messages.
    pub display_name: &'static str,
    /// Executable name looked up on `PATH`.
    pub binary: &'static str,
    /// Environment variable that, when set, short-circuits the search.
    pub env_override: &'static str,
    /// Installation instructions shown when the tool is missing.
    pub install_hint: &'static str,
    /// Per-platform fallback locations, checked in order.
    pub fallbacks: fn() -> Vec<PathBuf>,
}

/// LibreOffice, used to pre-convert office documents to PDF.
pub const SOFFICE: ToolSpec = ToolSpec {
    display_name: "LibreOffice",
    binary: "soffice",
    env_override: "BATCH2MD_SOFFICE",
    install_hint: "  macOS: brew install --cask libreoffice\n  Ubuntu: sudo apt-get install libreoffice",
    fallbacks: soffice_fallbacks,
};

/// MinerU, used to extract Markdown from PDF.
pub const MINERU: ToolSpec = ToolSpec {
    display_name: "MinerU",
    binary: "mineru",
    env_override: "BATCH2MD_MINERU",
    install_hint: "  pip install mineru\n  mineru-models-download  # download models",
    fallbacks: mineru_fallbacks,
};

fn soffice_fallbacks() -> Vec<PathBuf> {
    match std::env::consts::OS {
        "macos" => vec![PathBuf::from(
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        )],
        "windows" => vec![
            PathBuf::from(r"C:\Program Files\LibreOffice\program\soffice.exe"),
            PathBuf::from(r"C:\Program Files (x86)\LibreOffice\program\soffice.exe"),
        ],
        _ => vec![
            PathBuf::from("/usr/lib/libreoffice/program/soffice"),
            PathBuf::from("/opt/libreoffice/program/soffice"),
            PathBuf::from("/snap/bin/libreoffice"),
        ],
    }
}

fn mineru_fallbacks() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    match std::env::consts::OS {
        "windows" => vec![home.join(r".local\bin\mineru.exe")],
        _ => vec![home.join(".local/bin/mineru")],
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the executable described by `spec`.
///
/// An override variable that points at a missing file is an error rather
/// than a silent fall-through: the user asked for that exact binary.
pub fn locate(spec: &ToolSpec) -> Result<PathBuf, ToolLocateError> {
    if let Some(path) = std::env::var_os(spec.env_override) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        return Err(ToolLocateError::OverrideMissing {
            var: spec.env_override,
            path,
        });
    }

    if let Ok(path) = which::which(spec.binary) {
        return Ok(path);
    }

    first_existing((spec.fallbacks)()).ok_or(ToolLocateError::NotFound {
        tool: spec.display_name,
        hint: spec.install_hint,
    })
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn no_fallbacks() -> Vec<PathBuf> {
        Vec::new()
    }

    #[test]
    fn override_pointing_at_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-tool");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let spec = ToolSpec {
            display_name: "Fake",
            binary: "batch2md-definitely-not-on-path",
            env_override: "TOOL_LOCATE_TEST_OVERRIDE_OK",
            install_hint: "n/a",
            fallbacks: no_fallbacks,
        };
        std::env::set_var(spec.env_override, &fake);
        let found = locate(&spec);
        std::env::remove_var(spec.env_override);

        assert_eq!(found.unwrap(), fake);
    }

    #[test]
    fn override_pointing_at_missing_file_is_error() {
        let spec = ToolSpec {
            display_name: "Fake",
            binary: "batch2md-definitely-not-on-path",
            env_override: "TOOL_LOCATE_TEST_OVERRIDE_MISSING",
            install_hint: "n/a",
            fallbacks: no_fallbacks,
        };
        std::env::set_var(spec.env_override, "/no/such/dir/fake-tool");
        let err = locate(&spec).unwrap_err();
        std::env::remove_var(spec.env_override);

        assert!(matches!(err, ToolLocateError::OverrideMissing { .. }));
        assert!(err.to_string().contains("TOOL_LOCATE_TEST_OVERRIDE_MISSING"));
    }

    #[test]
    fn missing_tool_reports_install_hint() {
        let spec = ToolSpec {
            display_name: "Nonexistent",
            binary: "batch2md-definitely-not-on-path",
            env_override: "TOOL_LOCATE_TEST_UNSET",
            install_hint: "  brew install nonexistent",
            fallbacks: no_fallbacks,
        };
        let err = locate(&spec).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Nonexistent not found"), "got: {msg}");
        assert!(msg.contains("brew install nonexistent"), "got: {msg}");
    }

    #[test]
    fn fallback_location_is_used() {
        fn tmp_fallback() -> Vec<PathBuf> {
            vec![
                PathBuf::from("/no/such/fallback"),
                std::env::temp_dir().join("tool-locate-fallback-test-bin"),
            ]
        }
        let target = std::env::temp_dir().join("tool-locate-fallback-test-bin");
        std::fs::write(&target, b"bin").unwrap();

        let spec = ToolSpec {
            display_name: "Fallback",
            binary: "batch2md-definitely-not-on-path",
            env_override: "TOOL_LOCATE_TEST_FALLBACK_UNSET",
            install_hint: "n/a",
            fallbacks: tmp_fallback,
        };
        let found = locate(&spec);
        std::fs::remove_file(&target).ok();

        assert_eq!(found.unwrap(), target);
    }

    #[test]
    fn builtin_specs_have_distinct_overrides() {
        assert_ne!(SOFFICE.env_override, MINERU.env_override);
        assert_eq!(SOFFICE.binary, "soffice");
        assert_eq!(MINERU.binary, "mineru");
    }
}
