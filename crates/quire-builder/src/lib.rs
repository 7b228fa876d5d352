mod builder;
mod error;
mod research;

pub use builder::PipelineBuilder;
pub use error::BuildError;
pub use research::research_workflow;
