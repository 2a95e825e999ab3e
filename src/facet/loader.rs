//! Layered facet resolution: piece-local map → project directory → user
//! directory → builtin embedded default.
//!
//! Grounded on the teacher's `PromptLoader::load_template`: check project
//! override, then user override, then an embedded fallback, in that order.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Persona,
    Policy,
    Knowledge,
    Instruction,
    ReportFormat,
}

impl FacetKind {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Persona => "personas",
            Self::Policy => "policies",
            Self::Knowledge => "knowledge",
            Self::Instruction => "instructions",
            Self::ReportFormat => "report-formats",
        }
    }
}

#[derive(Debug, Error)]
pub enum FacetError {
    #[error("{kind:?} facet {key:?} not found in piece-local map, project, user, or builtin layers")]
    NotFound { kind: FacetKind, key: String },

    #[error("failed to read facet file {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

impl std::fmt::Debug for FacetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

pub struct FacetLoader {
    project_dir: PathBuf,
    user_dir: Option<PathBuf>,
    builtins: HashMap<(&'static str, &'static str), &'static str>,
}

impl FacetLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_root.into().join(".takt"),
            user_dir: dirs::config_dir().map(|d| d.join("takt")),
            builtins: HashMap::new(),
        }
    }

    /// Resolve a facet reference. `piece_local` is the piece's own
    /// `personas`/`policies`/... map, consulted first since it is the most
    /// specific layer; a direct file path (absolute or containing a `/`) is
    /// read as-is and bypasses the layered lookup entirely.
    pub fn resolve(
        &self,
        kind: FacetKind,
        key: &str,
        piece_local: &HashMap<String, String>,
    ) -> Result<String, FacetError> {
        debug!(kind = ?kind, key, "FacetLoader::resolve: called");

        if key.contains('/') || key.starts_with('.') {
            let path = PathBuf::from(key);
            return std::fs::read_to_string(&path).map_err(|e| FacetError::Io {
                path: path.display().to_string(),
                source: e,
            });
        }

        if let Some(content) = piece_local.get(key) {
            return Ok(content.clone());
        }

        for dir in [Some(&self.project_dir), self.user_dir.as_ref()].into_iter().flatten() {
            let candidate = dir.join(kind.dir_name()).join(format!("{key}.md"));
            if candidate.exists() {
                return std::fs::read_to_string(&candidate).map_err(|e| FacetError::Io {
                    path: candidate.display().to_string(),
                    source: e,
                });
            }
        }

        if let Some(content) = self.builtins.get(&(kind.dir_name(), key)) {
            return Ok(content.to_string());
        }

        Err(FacetError::NotFound {
            kind,
            key: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_piece_local_first() {
        let root = tempdir().unwrap();
        let loader = FacetLoader::new(root.path());
        let mut local = HashMap::new();
        local.insert("reviewer".to_string(), "You review code.".to_string());

        let resolved = loader.resolve(FacetKind::Persona, "reviewer", &local).unwrap();
        assert_eq!(resolved, "You review code.");
    }

    #[test]
    fn falls_back_to_project_directory() {
        let root = tempdir().unwrap();
        let personas_dir = root.path().join(".takt").join("personas");
        std::fs::create_dir_all(&personas_dir).unwrap();
        std::fs::write(personas_dir.join("reviewer.md"), "Project reviewer persona").unwrap();

        let loader = FacetLoader::new(root.path());
        let resolved = loader.resolve(FacetKind::Persona, "reviewer", &HashMap::new()).unwrap();
        assert_eq!(resolved, "Project reviewer persona");
    }

    #[test]
    fn missing_facet_errors() {
        let root = tempdir().unwrap();
        let loader = FacetLoader::new(root.path());
        assert!(matches!(
            loader.resolve(FacetKind::Persona, "nonexistent", &HashMap::new()),
            Err(FacetError::NotFound { .. })
        ));
    }
}
