use std::fmt;

#[derive(Debug)]
pub enum PagemillError {
    NoUsableFonts,
    InvalidConfiguration(String),
    Reentrant,
    Pdf(String),
    Io(std::io::Error),
}

impl fmt::Display for PagemillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagemillError::NoUsableFonts => {
                write!(f, "no usable fonts: register a font program or enable standard fonts")
            }
            PagemillError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PagemillError::Reentrant => {
                write!(f, "conversion already in progress on this converter")
            }
            PagemillError::Pdf(message) => write!(f, "pdf error: {}", message),
            PagemillError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PagemillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PagemillError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PagemillError {
    fn from(value: std::io::Error) -> Self {
        PagemillError::Io(value)
    }
}

impl From<lopdf::Error> for PagemillError {
    fn from(value: lopdf::Error) -> Self {
        PagemillError::Pdf(value.to_string())
    }
}
