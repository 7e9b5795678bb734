use inai_markup::MarkupError;
use thiserror::Error;

pub type PreviewResult<T> = Result<T, PreviewError>;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Render scheduler has shut down")]
    SchedulerClosed,

    #[error("Surface failed to load document: {0}")]
    Surface(String),

    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
