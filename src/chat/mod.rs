pub mod fallback;
pub mod pipeline;
pub mod prompt;

pub use fallback::best_effort;
pub use pipeline::ChatPipeline;
