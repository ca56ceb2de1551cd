use thiserror::Error;

/// Every failure the client can surface to a caller.
///
/// Transport and protocol errors are delivered to the single caller whose
/// pending call failed. Codec errors are raised synchronously to whoever
/// invoked the encoder or decoder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The socket could not be opened or a frame could not be written.
    #[error("connection error: {0}")]
    Connection(String),

    /// The socket dropped while the call was still pending.
    #[error("connection lost before a response was received")]
    ConnectionLost,

    /// The node answered with an error envelope.
    #[error("node returned error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// A payload did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid ABI type descriptor, argument value, address or object id.
    #[error("malformed parameter: {0}")]
    MalformedParameter(String),

    /// Asset arithmetic across different asset ids, or overflow.
    #[error("incompatible operation: {0}")]
    IncompatibleOperation(String),

    #[error("signing error: {0}")]
    Signing(String),

    /// The blocking wrapper gave up waiting.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The caller cancelled the call locally.
    #[error("call was cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Decode(error.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(error: hex::FromHexError) -> Self {
        Error::MalformedParameter(error.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error.to_string())
    }
}

impl From<secp256k1::Error> for Error {
    fn from(error: secp256k1::Error) -> Self {
        Error::Signing(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
