pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod rules;
pub mod stages;

pub use error::{LlmError, PipelineError};
pub use io::{
    NormalizedMeta, NormalizedSnapshot, RunManifest, create_lock, load_profile,
    parse_utterance_file, read_classified, resolve_lock, write_classified,
};
pub use llm::{AnthropicClient, AnthropicConfig, Classifier, Normalizer};
pub use models::{LabeledUtterance, Profile, Requirement, Utterance};
pub use stages::{
    DEFAULT_TEMPLATE, Reconciled, RenderConfig, RenderInput, SynthesisConfig, classify,
    execute_stage1, execute_stage2, execute_stage3,
};
