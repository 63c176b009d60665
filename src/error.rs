use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
};

/// Wraps any startup-time failure (config, bind, privilege drop) behind a
/// single colorized error type. Never produced on the request-handling path:
/// a malformed client request becomes a status response, not an error.
pub struct ServerError(pub Box<dyn Error>);

impl Debug for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[31mERROR\x1b[0m: {}", self.0)
    }
}

impl Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(e: std::net::AddrParseError) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<http_wire::ParseError> for ServerError {
    fn from(e: http_wire::ParseError) -> Self {
        ServerError(Box::new(e))
    }
}

#[derive(Debug)]
pub struct Simple(pub String);

impl Display for Simple {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Simple {}

impl From<String> for ServerError {
    fn from(s: String) -> Self {
        ServerError(Box::new(Simple(s)))
    }
}

impl From<&str> for ServerError {
    fn from(s: &str) -> Self {
        ServerError(Box::new(Simple(s.to_string())))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
