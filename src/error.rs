use std::fmt;

#[derive(Debug)]
pub enum TextCardError {
    /// The card surface could not be allocated or encoded. Fatal for that page only.
    RenderFailure { page_index: usize, message: String },
    InvalidConfiguration(String),
    Font(String),
    Io(std::io::Error),
}

impl fmt::Display for TextCardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextCardError::RenderFailure {
                page_index,
                message,
            } => write!(f, "render failed for card {}: {}", page_index + 1, message),
            TextCardError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            TextCardError::Font(message) => write!(f, "font error: {}", message),
            TextCardError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for TextCardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextCardError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TextCardError {
    fn from(value: std::io::Error) -> Self {
        TextCardError::Io(value)
    }
}
