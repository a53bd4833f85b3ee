//! Builds presentation-ready reports from run outcomes and pipeline errors.

use crate::error::PipelineError;
use crate::model::{Attachment, EvolutionRecord, Report, ReportField, RunOutcome, Severity};

pub const OUTPUT_TITLE: &str = "Output";
pub const ERROR_TITLE: &str = "Error";

/// Report builder. The separator between column entries is configurable so
/// presentation layers that cannot show newlines can pick something else.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    join_separator: String,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            join_separator: "\n".to_string(),
        }
    }
}

impl ReportBuilder {
    pub fn new(join_separator: impl Into<String>) -> Self {
        Self {
            join_separator: join_separator.into(),
        }
    }

    /// Report for a completed run. `attachment` is dropped on error reports.
    pub fn build(&self, outcome: &RunOutcome, attachment: Option<Attachment>) -> Report {
        match outcome {
            RunOutcome::Success { records, raw } if records.is_empty() => {
                self.from_error(&PipelineError::ParseAnomaly { raw: raw.clone() })
            }
            RunOutcome::Success { records, .. } => Report {
                title: OUTPUT_TITLE.to_string(),
                severity: Severity::Normal,
                fields: self.record_fields(records),
                description: None,
                attachment,
            },
            RunOutcome::Failure { raw, reason } => self.from_error(&PipelineError::SimulatorRuntime {
                raw: raw.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Error-severity report for any pipeline error, including pre-run rejection.
    pub fn from_error(&self, err: &PipelineError) -> Report {
        let fields = err
            .raw_output()
            .map(|raw| {
                vec![ReportField {
                    name: "Output".to_string(),
                    value: raw.to_string(),
                    inline: false,
                }]
            })
            .unwrap_or_default();
        Report {
            title: ERROR_TITLE.to_string(),
            severity: Severity::Error,
            fields,
            description: Some(err.to_string()),
            attachment: None,
        }
    }

    fn record_fields(&self, records: &[EvolutionRecord]) -> Vec<ReportField> {
        let column = |name: &str, f: &dyn Fn(&EvolutionRecord) -> String| ReportField {
            name: name.to_string(),
            value: records
                .iter()
                .map(f)
                .collect::<Vec<_>>()
                .join(&self.join_separator),
            inline: true,
        };
        vec![
            column("Stage", &|r: &EvolutionRecord| r.stage.clone()),
            column("Time", &|r: &EvolutionRecord| r.time_text.clone()),
            column("Mass", &|r: &EvolutionRecord| r.mass_text.clone()),
        ]
    }
}
