mod pipeline_error;

pub use pipeline_error::{ErrorKind, PipelineError};
