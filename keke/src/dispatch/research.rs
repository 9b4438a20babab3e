//! Research actions. Only `load_dataset` touches the filesystem; the rest
//! acknowledge the request without running any numerical work.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::action::ActionError;
use crate::io::project::ProjectContext;

pub(super) fn load_dataset(
    project: &ProjectContext,
    path: &str,
    format: Option<&str>,
) -> Result<String, ActionError> {
    let bytes = fs::read(project.root.join(path))
        .map_err(|err| ActionError::io("loading dataset", path, err))?;
    let text = String::from_utf8_lossy(&bytes);
    let format = format
        .map(str::to_ascii_lowercase)
        .or_else(|| {
            Path::new(path)
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        })
        .unwrap_or_else(|| "unknown".to_string());
    debug!(path, %format, bytes = bytes.len(), "dataset loaded");

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let mut summary = format!(
        "Dataset loaded from {path}. Format: {format}. Size: {} bytes.",
        bytes.len()
    );
    let delimiter = match format.as_str() {
        "csv" => Some(','),
        "tsv" => Some('\t'),
        _ => None,
    };
    match delimiter {
        Some(delimiter) => {
            let columns: Vec<&str> = lines
                .next()
                .map(|header| header.split(delimiter).map(str::trim).collect())
                .unwrap_or_default();
            let rows = lines.count();
            summary.push_str(&format!(" Rows: {rows}. Columns: [{}]", columns.join(", ")));
        }
        None => summary.push_str(&format!(" Lines: {}.", lines.count())),
    }
    Ok(summary)
}

pub(super) fn analyze_data(analysis_type: &str, parameters: &Map<String, Value>) -> String {
    format!(
        "Analysis '{analysis_type}' recorded with parameters {}. No analysis engine runs locally; \
         use execute_command to run it.",
        describe(parameters)
    )
}

pub(super) fn train_model(model_type: &str, parameters: &Map<String, Value>) -> String {
    format!(
        "Training of '{model_type}' recorded with parameters {}. No training backend runs locally; \
         use execute_command to run it.",
        describe(parameters)
    )
}

pub(super) fn evaluate_model(path: &str) -> String {
    format!(
        "Evaluation of {path} recorded. No evaluation backend runs locally; \
         use execute_command to run it."
    )
}

pub(super) fn visualize(viz_type: &str, parameters: &Map<String, Value>) -> String {
    format!(
        "Visualization '{viz_type}' recorded with parameters {}. No plot was written; \
         use write_file or execute_command to produce it.",
        describe(parameters)
    )
}

fn describe(parameters: &Map<String, Value>) -> String {
    if parameters.is_empty() {
        "none".to_string()
    } else {
        Value::Object(parameters.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProject;
    use serde_json::json;

    #[test]
    fn tsv_by_explicit_format() {
        let project = TestProject::new().expect("project");
        project.write("data.txt", "x\ty\tz\n1\t2\t3\n").expect("seed");

        let summary = load_dataset(project.context(), "data.txt", Some("TSV")).expect("load");

        assert!(summary.contains("Format: tsv."));
        assert!(summary.ends_with("Rows: 1. Columns: [x, y, z]"));
    }

    #[test]
    fn unknown_format_counts_lines() {
        let project = TestProject::new().expect("project");
        project.write("notes", "a\n\nb\n").expect("seed");

        let summary = load_dataset(project.context(), "notes", None).expect("load");

        assert!(summary.contains("Format: unknown."));
        assert!(summary.ends_with("Lines: 2."));
    }

    #[test]
    fn missing_dataset_is_io_error() {
        let project = TestProject::new().expect("project");
        let err = load_dataset(project.context(), "gone.csv", None).unwrap_err();
        assert!(err.to_string().starts_with("Error loading dataset gone.csv:"));
    }

    #[test]
    fn simulated_results_echo_parameters() {
        let params = json!({"column": "price"})
            .as_object()
            .cloned()
            .expect("object");
        assert!(analyze_data("summary", &params).contains(r#"{"column":"price"}"#));
        assert!(train_model("linear", &Map::new()).contains("parameters none"));
    }
}
