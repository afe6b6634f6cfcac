pub mod extract;
pub mod loop_;
pub mod prompt;
pub mod transcript;

pub use extract::{Action, Decision, ExtractionError, ResponseExtractor};
pub use loop_::{Agent, ExecutionReport, ExecutionState, Outcome, DEFAULT_MAX_ITERATIONS, EXHAUSTED_MESSAGE};
pub use prompt::{PromptBuilder, DEFAULT_TEMPLATE};
pub use transcript::{Role, Transcript, TranscriptEntry};
