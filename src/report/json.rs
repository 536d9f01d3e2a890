use super::{Report, ReportGenerator, ReportResult};
use crate::dispatch::EntityError;
use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// JSON report structure with all gathered data
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    /// Report metadata
    pub metadata: ReportMetadata,

    /// Records of the command
    pub report: &'a Report,

    /// Per-entity failures met while gathering
    pub errors: &'a [EntityError],
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub run_id: String,
    pub report_generated_at: String,
    pub tool_version: String,
    pub command: String,
    pub error_count: usize,
}

/// JSON report generator
#[derive(Debug, Default)]
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }

    /// Render the report, then print it to stdout or save it when a path is given
    pub fn save_report(&self, report: &Report, errors: &[EntityError], output_path: &Path) -> ReportResult<()> {
        let json = self.render(report, errors)?;

        if output_path == Path::new("-") || output_path == Path::new("") {
            println!("{}", json);
        } else {
            let mut file = File::create(output_path)?;
            file.write_all(json.as_bytes())?;
        }

        Ok(())
    }

    fn generate_report<'a>(&self, report: &'a Report, errors: &'a [EntityError]) -> JsonReport<'a> {
        JsonReport {
            metadata: ReportMetadata {
                run_id: uuid::Uuid::new_v4().to_string(),
                report_generated_at: Utc::now().to_rfc3339(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                command: report.command().to_string(),
                error_count: errors.len(),
            },
            report,
            errors,
        }
    }
}

impl ReportGenerator for JsonReporter {
    fn render(&self, report: &Report, errors: &[EntityError]) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(&self.generate_report(report, errors))?)
    }

    fn name(&self) -> &'static str {
        "JsonReporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ErrorKind;
    use crate::scan::types::PerCluster;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn sample() -> (Report, Vec<EntityError>) {
        let report = Report::TopicNames(vec![PerCluster::new("bku10", vec!["orders".to_string()])]);
        let errors = vec![EntityError::new("bkt20", "preflight", ErrorKind::Connectivity, "refused")];
        (report, errors)
    }

    #[test]
    fn test_report_shape() {
        let (report, errors) = sample();
        let json = JsonReporter::new().render(&report, &errors).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["command"], "topic");
        assert_eq!(value["metadata"]["error_count"], 1);
        assert_eq!(value["report"]["command"], "topic_names");
        assert_eq!(value["report"]["data"][0]["cluster"], "bku10");
        assert_eq!(value["report"]["data"][0]["records"][0], "orders");
        assert_eq!(value["errors"][0]["kind"], "connectivity");

        let stamp = value["metadata"]["report_generated_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        let run_id = value["metadata"]["run_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(run_id).is_ok());
    }

    #[test]
    fn test_save_report_to_file() {
        let (report, errors) = sample();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        JsonReporter::new().save_report(&report, &errors, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["errors"][0]["cluster"], "bkt20");
    }
}
