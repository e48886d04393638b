//! LLM-backed research synthesis and post writing.

mod prompts;
mod synthesizer;
mod writer;

pub use prompts::{PromptManager, RESEARCH_SYSTEM_PROMPT, WRITER_SYSTEM_PROMPT};
pub use synthesizer::{Evidence, ResearchSynthesizer, Synthesis};
pub use writer::{PostSections, PostWriter, Written};
