//! User-facing messages. Diagnostics go through `tracing` on stderr; only
//! these lines are written to stdout.

use facecheck_core::{MatchDecision, RunEvent, RunOutcome, Upload};
use serde::Serialize;
use std::path::Path;

pub fn upload_details(upload: &Upload) -> String {
    format!(
        "File Details: name={}, type={}, size={} bytes",
        upload.name, upload.mime_type, upload.size
    )
}

/// Progress line for an orchestrator event, if it warrants one.
pub fn event_line(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::SourcePrepared(asset) => Some(format!(
            "Prepared source image: {} ({}x{})",
            asset.path.display(),
            asset.width,
            asset.height
        )),
        RunEvent::Comparing { name } => Some(format!("Comparing with: {name}")),
        RunEvent::TargetSkipped { name, reason } => {
            Some(format!("Skipping {name}: {reason}"))
        }
        RunEvent::ComparisonFailed { name, reason } => {
            Some(format!("Error comparing with {name}: {reason}"))
        }
        RunEvent::Matched(hit) => Some(format!(
            "Match found with {} with {:.2}% similarity.",
            hit.name, hit.similarity
        )),
    }
}

/// Closing line for a run. Matches were already announced as they happened.
pub fn outcome_line(outcome: &RunOutcome) -> Option<String> {
    match outcome {
        RunOutcome::Decided(report) => match report.decision {
            MatchDecision::Match(_) => None,
            MatchDecision::NoMatch => Some("No matches found in the database.".to_string()),
        },
        RunOutcome::DirectoryMissing { dir, .. } => Some(directory_missing(dir)),
    }
}

pub fn directory_missing(dir: &Path) -> String {
    format!(
        "Faces folder not found. Please create a '{}' folder and add images for comparison.",
        dir.display()
    )
}

/// Machine-readable result of `facecheck check --json`.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub upload: &'a Upload,
    pub result: &'a RunOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecheck_core::{DetectedFace, RunReport, TargetMatch};
    use std::path::PathBuf;

    fn hit() -> TargetMatch {
        TargetMatch {
            name: "alice.jpg".into(),
            path: PathBuf::from("faces/alice.jpg"),
            similarity: 93.456,
            face: DetectedFace::default(),
        }
    }

    fn report(decision: MatchDecision) -> RunReport {
        RunReport {
            run_id: "run".into(),
            decision,
            comparisons: 1,
            matches: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    #[test]
    fn test_match_line_two_decimals() {
        let line = event_line(&RunEvent::Matched(hit())).unwrap();
        assert_eq!(line, "Match found with alice.jpg with 93.46% similarity.");
    }

    #[test]
    fn test_comparing_line() {
        let line = event_line(&RunEvent::Comparing {
            name: "bob.png".into(),
        })
        .unwrap();
        assert_eq!(line, "Comparing with: bob.png");
    }

    #[test]
    fn test_no_match_line() {
        let outcome = RunOutcome::Decided(report(MatchDecision::NoMatch));
        assert_eq!(
            outcome_line(&outcome).as_deref(),
            Some("No matches found in the database.")
        );

        let outcome = RunOutcome::Decided(report(MatchDecision::Match(hit())));
        assert_eq!(outcome_line(&outcome), None);
    }

    #[test]
    fn test_directory_missing_line() {
        let outcome = RunOutcome::DirectoryMissing {
            dir: PathBuf::from("faces"),
            reason: "not found".into(),
        };
        assert_eq!(
            outcome_line(&outcome).unwrap(),
            "Faces folder not found. Please create a 'faces' folder and add images for comparison."
        );
    }

    #[test]
    fn test_json_report_shape() {
        let upload = Upload::from_bytes("me.png", vec![0; 10]);
        let outcome = RunOutcome::Decided(report(MatchDecision::Match(hit())));
        let json = serde_json::to_value(JsonReport {
            upload: &upload,
            result: &outcome,
        })
        .unwrap();

        assert_eq!(json["upload"]["name"], "me.png");
        assert_eq!(json["result"]["outcome"], "decided");
        assert_eq!(json["result"]["decision"]["status"], "match");
        assert_eq!(json["result"]["comparisons"], 1);
    }
}
