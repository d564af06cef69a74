use crate::workflow::runner::WorkflowResult;
use serde::Serialize;

/// Latest outcome served to plotting clients.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ReportModel {
    pub status: String,
    pub runs: usize,
    pub result: Option<WorkflowResult>,
}

impl ReportModel {
    pub fn record(&mut self, result: WorkflowResult) {
        self.runs += 1;
        self.status = format!("ingested {}", result.source);
        self.result = Some(result);
    }

    /// Keeps the previous result so clients still have something to plot.
    pub fn record_failure(&mut self, message: String) {
        self.runs += 1;
        self.status = format!("error: {}", message);
    }
}
