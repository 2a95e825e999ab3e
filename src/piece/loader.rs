//! 4-layer piece lookup: package-local → project → user → builtin.
//!
//! Grounded on the teacher's `LoopTypeLoader`: embedded builtin YAML via
//! `include_str!`, directories consulted in precedence order, a `.yml`/`.yaml`
//! file named after the identifier. Unlike the teacher's loader (which loads
//! every layer and lets later ones override earlier ones by name), a single
//! piece identifier resolves to exactly one file: the first layer that has
//! it wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::PieceResolutionError;
use super::validate::validate_piece;
use crate::domain::Piece;

/// No builtin pieces ship with the framework today (TAKT's scope names no
/// default workflow); the layer exists so a future release can add one
/// without changing the lookup order. See DESIGN.md.
const BUILTIN_PIECES: &[(&str, &str)] = &[];

pub struct PieceLoader {
    package_local_dir: Option<PathBuf>,
    project_dir: PathBuf,
    user_dir: Option<PathBuf>,
    builtins: HashMap<&'static str, &'static str>,
}

impl PieceLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_dir = project_root.into().join(".takt").join("pieces");
        let user_dir = dirs::config_dir().map(|d| d.join("takt").join("pieces"));

        Self {
            package_local_dir: None,
            project_dir,
            user_dir,
            builtins: BUILTIN_PIECES.iter().copied().collect(),
        }
    }

    /// A package-local directory (e.g. a repertoire package's own `pieces/`)
    /// takes precedence over everything else when set.
    pub fn with_package_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_local_dir = Some(dir.into());
        self
    }

    pub fn load(&self, identifier: &str) -> Result<Piece, PieceResolutionError> {
        debug!(identifier, "PieceLoader::load: called");

        for dir in [self.package_local_dir.as_deref(), Some(self.project_dir.as_path()), self.user_dir.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(path) = find_piece_file(dir, identifier) {
                let piece = load_from_file(&path)?;
                validate_piece(&piece).map_err(|e| PieceResolutionError::NotFound(format!("{identifier}: {e}")))?;
                info!(identifier, path = %path.display(), "PieceLoader::load: resolved");
                return Ok(piece);
            }
        }

        if let Some(yaml) = self.builtins.get(identifier) {
            let piece: Piece = serde_yaml::from_str(yaml).map_err(|e| PieceResolutionError::Yaml {
                path: format!("<builtin:{identifier}>"),
                source: e,
            })?;
            validate_piece(&piece).map_err(|e| PieceResolutionError::NotFound(format!("{identifier}: {e}")))?;
            info!(identifier, "PieceLoader::load: resolved from builtin");
            return Ok(piece);
        }

        Err(PieceResolutionError::NotFound(identifier.to_string()))
    }
}

fn find_piece_file(dir: &Path, identifier: &str) -> Option<PathBuf> {
    for ext in ["yml", "yaml"] {
        let candidate = dir.join(format!("{identifier}.{ext}"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn load_from_file(path: &Path) -> Result<Piece, PieceResolutionError> {
    let content = std::fs::read_to_string(path).map_err(|e| PieceResolutionError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| PieceResolutionError::Yaml {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_piece_yaml() -> &'static str {
        r#"
name: sample
movements:
  - name: plan
    persona: planner
    rules:
      - condition: "[PLAN:1] clear"
        next: COMPLETE
"#
    }

    #[test]
    fn resolves_from_project_dir() {
        let root = tempdir().unwrap();
        let pieces_dir = root.path().join(".takt").join("pieces");
        std::fs::create_dir_all(&pieces_dir).unwrap();
        std::fs::write(pieces_dir.join("sample.yml"), sample_piece_yaml()).unwrap();

        let loader = PieceLoader::new(root.path());
        let piece = loader.load("sample").unwrap();
        assert_eq!(piece.name, "sample");
    }

    #[test]
    fn package_local_takes_precedence_over_project() {
        let root = tempdir().unwrap();
        let project_pieces = root.path().join(".takt").join("pieces");
        std::fs::create_dir_all(&project_pieces).unwrap();
        std::fs::write(project_pieces.join("sample.yml"), sample_piece_yaml()).unwrap();

        let package_dir = tempdir().unwrap();
        std::fs::write(
            package_dir.path().join("sample.yml"),
            sample_piece_yaml().replace("sample", "overridden"),
        )
        .unwrap();

        let loader = PieceLoader::new(root.path()).with_package_local_dir(package_dir.path());
        let piece = loader.load("sample").unwrap();
        assert_eq!(piece.name, "overridden");
    }

    #[test]
    fn missing_piece_is_not_found() {
        let root = tempdir().unwrap();
        let loader = PieceLoader::new(root.path());
        assert!(matches!(loader.load("nonexistent"), Err(PieceResolutionError::NotFound(_))));
    }
}
