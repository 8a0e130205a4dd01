//! Loading syntax trees handed over by an external parser as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::lang::program::Program;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed syntax tree: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn parse_program(text: &str) -> Result<Program, TreeError> {
    Ok(serde_json::from_str(text)?)
}

pub fn load_program(path: &Path) -> Result<Program, TreeError> {
    let text = fs::read_to_string(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_program(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::node::{Expression as E, Statement as S};

    #[test]
    fn test_parse_program() {
        let text = r#"{"statements": [
            {"let": {"name": "x", "value": {"integer": 5}}},
            {"expression": {"identifier": "x"}}
        ]}"#;

        let program = parse_program(text).unwrap();
        assert_eq!(
            program,
            Program::new(vec![S::let_("x", E::int(5)), S::expr(E::ident("x"))])
        );
    }

    #[test]
    fn test_malformed_tree() {
        let err = parse_program(r#"{"statements": [{"loop": {}}]}"#).unwrap_err();
        assert!(matches!(err, TreeError::Json(_)));
        assert!(err.to_string().starts_with("malformed syntax tree"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_program(Path::new("/nonexistent/tree.json")).unwrap_err();
        assert!(matches!(err, TreeError::Io { .. }));
    }
}
