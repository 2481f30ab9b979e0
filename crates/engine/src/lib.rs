pub mod bootstrap;
pub mod resolution;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use resolution::{AdminError, ResolutionEngine};

pub use snapquote_core::prompt::{
    compose_estimator_prompt, compose_qa_prompt, compose_render_prompt, CompiledRenderPrompt,
    RenderRequest,
};
