use crate::pipeline::PipelineFailure;

pub type VidbadgeResult<T> = Result<T, VidbadgeError>;

#[derive(thiserror::Error, Debug)]
pub enum VidbadgeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("open failed: {0}")]
    Open(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("render error: {0}")]
    Render(String),

    /// A demo job's pipeline run for one video variant did not reach `Done`.
    #[error("{variant} video: {failure}")]
    Pipeline {
        variant: &'static str,
        #[source]
        failure: Box<PipelineFailure>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VidbadgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn pipeline(variant: &'static str, failure: PipelineFailure) -> Self {
        Self::Pipeline {
            variant,
            failure: Box::new(failure),
        }
    }
}
