pub mod agent;
pub mod index;
pub mod llm;
pub mod orchestrator;

pub use agent::{Agent, AgentRole, AgentTuning, ANALYSIS_ROLES};
pub use index::{IndexGateway, RetrievedRow, VectorIndex, DEFAULT_TOP_K};
pub use llm::{CompletionModel, OpenAiCompletion};
pub use orchestrator::{
    default_analysis_tasks, run_analysis, AnalysisOutcome, AnalysisTask, TaskProgress,
    MAX_CONCURRENT_AGENTS,
};
