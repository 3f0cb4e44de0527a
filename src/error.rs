use std::io;

/// Broad categories a failure falls into, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The byte stream no longer holds well-formed frames.
    Framing,
    /// The peer could not be reached or went away.
    Connectivity,
    /// The server answered `ERR`.
    Rejected,
    /// Something was wrong locally before anything was sent.
    Precondition,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum FtpError {
    #[error("malformed frame: length prefix {0:?} is not a non-negative decimal number")]
    MalformedLength(String),

    #[error("truncated frame: expected {expected} bytes, peer closed after {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("frame too large: {0} bytes does not fit a 10-digit length prefix")]
    FrameTooLarge(usize),

    #[error("could not reach server at {addr}: {source}")]
    ConnectionRefused {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("could not reach server data channel at {addr}: {source}")]
    DataChannelUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("could not reach server: connection closed")]
    ConnectionClosed,

    #[error("could not reach server: timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("server rejected request: {0}")]
    ServerRejected(String),

    #[error("malformed command code {0:?}")]
    MalformedCommand(String),

    #[error("unexpected reply from server: {0:?}")]
    UnexpectedReply(String),

    #[error("local precondition not met: {0}")]
    LocalPrecondition(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl FtpError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FtpError::MalformedLength(_)
            | FtpError::TruncatedFrame { .. }
            | FtpError::FrameTooLarge(_)
            | FtpError::MalformedCommand(_)
            | FtpError::UnexpectedReply(_) => ErrorClass::Framing,
            FtpError::ConnectionRefused { .. }
            | FtpError::DataChannelUnreachable { .. }
            | FtpError::ConnectionClosed
            | FtpError::Timeout(_) => ErrorClass::Connectivity,
            FtpError::ServerRejected(_) => ErrorClass::Rejected,
            FtpError::LocalPrecondition(_) => ErrorClass::Precondition,
            FtpError::Io(_) => ErrorClass::Io,
        }
    }

    /// Framing and connectivity failures leave the connection they happened on unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Framing | ErrorClass::Connectivity
        )
    }
}

impl From<io::Error> for FtpError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => FtpError::ConnectionClosed,
            _ => FtpError::Io(err),
        }
    }
}
