//! # Newsloom Pipeline
//!
//! The staged digest pipeline: sequential preparation stages (scrape,
//! process, summarize) feeding a bounded quality refinement loop
//! (draft, critique, refine, gate), orchestrated by [`DigestPipeline`].
//!
//! Stages communicate only through session state under declared contracts;
//! the loop stops on an explicit [`newsloom_core::StageSignal::Terminate`]
//! from its gate or when the iteration cap runs out, whichever comes first.

pub mod digest;
pub mod gate;
pub mod llm_stage;
pub mod prompts;
pub mod quality;
pub mod refine;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use digest::{DigestPipeline, DigestReport, SaveOutcome};
pub use gate::{DigestPresenceGate, QualityGate};
pub use llm_stage::LlmStage;
pub use quality::QualityChecker;
pub use refine::{LoopOutcome, RefinementLoop};
