//! Quire Config
//!
//! Serializable workflow definitions. A [`WorkflowDef`] describes the ordered
//! stages of a pipeline by name: which worker each step calls, which earlier
//! steps it reads and how its result is stored. Definitions are plain data;
//! `quire-builder` turns them into an executable pipeline.
//!
//! ```json
//! {
//!   "name": "demo",
//!   "stages": [
//!     { "type": "batch", "name": "summaries", "worker": "Summarizer",
//!       "items": { "source": "documents" } },
//!     { "type": "step", "name": "overview", "worker": "Writer",
//!       "inputs": { "summaries": "summaries" }, "format": "markdown" }
//!   ]
//! }
//! ```

mod error;
mod stage;
mod workflow;

pub use error::ConfigError;
pub use stage::{BatchDef, GroupDef, ItemsDef, MemberDef, StageDef, StepDef};
pub use workflow::WorkflowDef;

pub use quire_artifact::ArtifactFormat;
