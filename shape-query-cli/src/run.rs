//! Loading input documents and rendering verdicts.

use serde::Deserialize;
use shape_query::{MemoryModel, Plan, PlanError, Recipe, SyntaxError, TestResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Errors of one command line run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The input could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Input path
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// The input is not a valid document
    #[error("{0}")]
    Syntax(#[from] SyntaxError),

    /// The recipe does not compile
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Verdicts could not be serialized
    #[error("cannot write output: {0}")]
    Output(#[source] serde_json::Error),
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// One `id: VERDICT` line per element
    Text,
    /// A JSON object mapping ids to verdicts
    Json,
}

/// A recipe and the model to run it over.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    recipe: Recipe,
    model: MemoryModel,
}

impl Document {
    /// Parse a document, positioning JSON and content errors in `text`.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        serde_json::from_str(text).map_err(|e| {
            let message = e.to_string();
            // serde_json appends the position, which the rendering already shows
            let message = match message.rfind(" at line ") {
                Some(end) => message[..end].to_string(),
                None => message,
            };
            SyntaxError::in_text(text, e.line(), e.column(), message)
        })
    }

    /// Read and parse the document at `path`.
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = text.len(), "read input");
        Ok(Self::parse(&text)?)
    }

    /// Compile the recipe with `named` matches and walk the whole model.
    pub fn evaluate(&self, named: &[&str]) -> Result<HashMap<String, TestResult>, RunError> {
        let plan = Plan::compile_named(&self.recipe, named)?;
        let verdicts = self.model.evaluate(&plan);
        info!(
            elements = verdicts.len(),
            matched = verdicts.values().filter(|v| v.is_passed()).count(),
            "evaluated recipe"
        );
        Ok(verdicts)
    }
}

/// Render verdicts sorted by element id.
pub fn render(verdicts: &HashMap<String, TestResult>, format: Format) -> Result<String, RunError> {
    let sorted: BTreeMap<&str, TestResult> = verdicts
        .iter()
        .map(|(id, verdict)| (id.as_str(), *verdict))
        .collect();

    match format {
        Format::Text => Ok(sorted
            .iter()
            .map(|(id, verdict)| format!("{id}: {verdict}\n"))
            .collect()),
        Format::Json => {
            let mut out = serde_json::to_string_pretty(&sorted).map_err(RunError::Output)?;
            out.push('\n');
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const DOCUMENT: &str = r#"{
  "recipe": {
    "statements": [
      { "kind": "class", "define": "base", "name": "*.Base" },
      { "kind": "class", "return": true, "extends": "%base" }
    ]
  },
  "model": {
    "elements": [
      { "id": "a.Base", "kind": "class" },
      { "id": "a.Mid", "kind": "class", "superclass": "a.Base" },
      { "id": "a.Leaf", "kind": "class", "superclass": "a.Mid" }
    ]
  }
}"#;

    #[test]
    #[traced_test]
    fn test_evaluate_and_render_text() {
        let document = Document::parse(DOCUMENT).unwrap();
        let verdicts = document.evaluate(&[]).unwrap();
        assert_eq!(
            render(&verdicts, Format::Text).unwrap(),
            "a.Base: NOT_PASSED\na.Leaf: PASSED\na.Mid: PASSED\n"
        );
        assert!(logs_contain("evaluated recipe"));
    }

    #[test]
    fn test_render_json_with_named_match() {
        let document = Document::parse(DOCUMENT).unwrap();
        let verdicts = document.evaluate(&["base"]).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&render(&verdicts, Format::Json).unwrap()).unwrap();
        assert_eq!(json["a.Base"], "PASSED");
        assert_eq!(json["a.Leaf"], "PASSED");
    }

    #[test]
    fn test_unknown_named_match() {
        let document = Document::parse(DOCUMENT).unwrap();
        let err = document.evaluate(&["nope"]).unwrap_err();
        assert_eq!(err.to_string(), "named match %nope is not defined by any statement");
    }

    #[test]
    fn test_json_error_points_into_text() {
        let text = "{\n  \"recipe\": { \"statements\": [] },\n  \"model\": { \"elements\": [ } \n}";
        let err = Document::parse(text).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(!err.message.contains(" at line "));
        let rendered = err.render();
        assert!(rendered.contains("3 |   \"model\""), "{rendered}");
    }

    #[test]
    fn test_content_error_points_into_text() {
        let text = "{\n  \"recipe\": { \"statements\": [ { \"kind\": \"class\", \"name\": \"a..b\" } ] },\n  \"model\": { \"elements\": [] }\n}";
        let err = Document::parse(text).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("expected a name"), "{}", err.message);
    }
}
