use std::sync::Arc;
use std::time::Instant;

use common::error::AppError;
use tracing::{debug, info};

use crate::{
    index::{RetrievedRow, VectorIndex, DEFAULT_TOP_K},
    llm::CompletionModel,
};

/// Role descriptor for one analytical agent.
///
/// Variants differ only in data: display name, persona sentence, and the
/// analytical-focus instruction spliced into the shared prompt template. New
/// roles are new descriptor values, not new types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentRole {
    pub key: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    pub focus: &'static str,
}

pub const ANALYSIS_ROLES: [AgentRole; 6] = [
    AgentRole {
        key: "spend",
        name: "Spend Analysis Agent",
        role: "Analyzes spend patterns and identifies cost-saving opportunities.",
        focus: "analyze the spend data. Identify monthly/yearly trends, category-wise spend, \
                and cost-saving opportunities.",
    },
    AgentRole {
        key: "risk",
        name: "Risk Monitoring Agent",
        role: "Identifies supplier risks and supply chain disruptions.",
        focus: "identify high-risk suppliers and potential supply chain disruptions.",
    },
    AgentRole {
        key: "supplier",
        name: "Supplier Intelligence Agent",
        role: "Evaluates supplier performance and rankings.",
        focus: "analyze supplier performance. Provide a ranking of top suppliers and detailed \
                performance analysis (Delivery, Quality).",
    },
    AgentRole {
        key: "contract",
        name: "Contract Intelligence Agent",
        role: "Reviews contracts for expiry, clauses, and compliance.",
        focus: "review the contract details. Focus on Expiry dates, Key clauses, and \
                Compliance status.",
    },
    AgentRole {
        key: "po",
        name: "PO Automation Agent",
        role: "Automates PO creation and tracks delivery status.",
        focus: "analyze the Purchase Order data. Identify potential issues with Delivery \
                Tracking and Price Validation.",
    },
    AgentRole {
        key: "compliance",
        name: "Compliance & Policy Agent",
        role: "Ensures adherence to procurement policies and regulations.",
        focus: "check for Policy Violations, Budget Deviations, and Missing Documentation.",
    },
];

impl AgentRole {
    pub fn by_key(key: &str) -> Option<&'static AgentRole> {
        ANALYSIS_ROLES.iter().find(|role| role.key == key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AgentTuning {
    pub top_k: usize,
    /// Character budget for the retrieved-context block, sized to stay inside
    /// a small local model's context window.
    pub context_budget_chars: usize,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            context_budget_chars: 12_000,
        }
    }
}

/// A role-bound query executor over the shared vector index.
///
/// Construction is cheap; the expensive resources (index connection, model
/// client) are shared handles owned elsewhere.
pub struct Agent {
    role: AgentRole,
    index: Arc<VectorIndex>,
    model: Arc<dyn CompletionModel>,
    tuning: AgentTuning,
}

impl Agent {
    pub fn new(role: AgentRole, index: Arc<VectorIndex>, model: Arc<dyn CompletionModel>) -> Self {
        Self {
            role,
            index,
            model,
            tuning: AgentTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: AgentTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn role(&self) -> &AgentRole {
        &self.role
    }

    pub fn shares_index_with(&self, other: &Agent) -> bool {
        Arc::ptr_eq(&self.index, &other.index)
    }

    /// Runs one retrieval-augmented query.
    ///
    /// Retrieved row texts are concatenated into a single context block and
    /// summarized in one completion pass. Backend errors propagate; retries
    /// belong to the caller.
    pub async fn run(&self, query: &str) -> Result<String, AppError> {
        info!(agent = self.role.name, query, "agent query started");
        let started = Instant::now();

        let rows = self.index.search(query, self.tuning.top_k).await?;
        for row in &rows {
            debug!(
                agent = self.role.name,
                source = %row.source,
                row_index = %row.row_index,
                distance = row.distance,
                "retrieved context row"
            );
        }

        let context = build_context(&rows, self.tuning.context_budget_chars);
        let system_prompt = format!("You are the {}. {}", self.role.name, self.role.role);
        let user_prompt = render_prompt(&context, self.role.focus, query);

        let answer = self.model.complete(&system_prompt, &user_prompt).await?;

        info!(
            agent = self.role.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            context_rows = rows.len(),
            "agent query finished"
        );

        Ok(answer)
    }
}

fn build_context(rows: &[RetrievedRow], budget_chars: usize) -> String {
    let mut context = String::new();
    for row in rows {
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&row.text);
    }

    if context.chars().count() > budget_chars {
        context = context.chars().take(budget_chars).collect();
    }
    context
}

fn render_prompt(context: &str, focus: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, {focus}\n\
         Provide a concise summary with bullet points.\n\
         Query: {query}\n\
         Answer: "
    )
}
