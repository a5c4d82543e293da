use crate::BoxError;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Speech synthesis failed")]
    Engine(#[source] BoxError),
    #[error("Audio file not found")]
    NotFound,
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub(crate) fn engine<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Engine(err.into())
    }

    /// Render the error and every source beneath it, outermost first.
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            rendered.push_str(": ");
            rendered.push_str(&err.to_string());
            source = err.source();
        }
        rendered
    }
}
