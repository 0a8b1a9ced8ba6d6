use std::collections::BTreeMap;
use std::sync::Arc;

use futures::{stream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{
    agent::{Agent, AgentTuning},
    index::VectorIndex,
    llm::CompletionModel,
    ANALYSIS_ROLES,
};

/// Admission cap for concurrent agent queries. The backing model server is
/// typically a single local instance; two in-flight completions saturate it.
pub const MAX_CONCURRENT_AGENTS: usize = 2;

pub struct AnalysisTask {
    pub key: String,
    pub query: String,
    pub agent: Agent,
}

/// Posted once per finished task, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub completed: usize,
    pub total: usize,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    /// One report per submitted key; failed tasks carry an inline error string.
    pub reports: BTreeMap<String, String>,
    pub failed: Vec<String>,
}

impl AnalysisOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Fixed-pair cross report from the spend and risk results.
    ///
    /// `None` when either key is missing from the batch; not a general merge.
    pub fn executive_summary(&self) -> Option<String> {
        let spend = self.reports.get("spend")?;
        let risk = self.reports.get("risk")?;
        Some(format!(
            "### Financial Overview\n{spend}\n\n### Risk Overview\n{risk}"
        ))
    }
}

/// The canonical six-task batch, one task per built-in role.
pub fn default_analysis_tasks(
    index: &Arc<VectorIndex>,
    model: &Arc<dyn CompletionModel>,
    tuning: AgentTuning,
) -> Vec<AnalysisTask> {
    // Order mirrors ANALYSIS_ROLES.
    let queries = [
        ("spend", "Analyze spend patterns, identifying anomalies and opportunities."),
        ("risk", "Identify high-risk suppliers and potential supply chain disruptions."),
        ("supplier", "Provide a detailed analysis of top suppliers and their performance."),
        ("contract", "Review contracts for expiry and compliance risks."),
        ("po", "Analyze Purchase Orders for delays and price discrepancies."),
        ("compliance", "Check for policy violations and budget adherence."),
    ];

    ANALYSIS_ROLES
        .iter()
        .zip(queries)
        .map(|(role, (key, query))| AnalysisTask {
            key: key.to_owned(),
            query: query.to_owned(),
            agent: Agent::new(*role, Arc::clone(index), Arc::clone(model)).with_tuning(tuning),
        })
        .collect()
}

/// Fans the batch out under the bounded pool and collects results by key.
///
/// A single task failure never aborts the batch: the error is recorded inline
/// under that task's key and listed in `failed`, and the remaining tasks run
/// to completion. Completion order is whatever the pool schedules; every
/// submitted key is present in the returned mapping.
pub async fn run_analysis(
    tasks: Vec<AnalysisTask>,
    progress: Option<UnboundedSender<TaskProgress>>,
) -> AnalysisOutcome {
    let total = tasks.len();
    info!(total, "starting analysis batch");

    let mut results = stream::iter(tasks.into_iter().map(|task| async move {
        let AnalysisTask { key, query, agent } = task;
        let result = agent.run(&query).await;
        (key, result)
    }))
    .buffer_unordered(MAX_CONCURRENT_AGENTS);

    let mut outcome = AnalysisOutcome::default();
    let mut completed = 0usize;

    while let Some((key, result)) = results.next().await {
        completed = completed.saturating_add(1);

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                warn!(task = %key, error = %err, "analysis task failed");
                outcome.failed.push(key.clone());
                format!("Analysis failed: {err}")
            }
        };

        if let Some(sender) = &progress {
            // A dropped receiver just means nobody is rendering progress.
            let _ = sender.send(TaskProgress {
                completed,
                total,
                label: format!("{key} complete"),
            });
        }

        outcome.reports.insert(key, report);
    }

    info!(
        total,
        failed = outcome.failed.len(),
        "analysis batch finished"
    );

    outcome
}
