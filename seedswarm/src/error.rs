pub use tokio::{
    io::Error as IoError, sync::mpsc::error::SendError, task::JoinError,
};

use std::fmt;

use crate::{manifest::ManifestError, NodeId};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The channel on which some component was listening or sending died.
    Channel,
    /// The first message a peer received from the tracker was not the ready
    /// signal.
    HandshakeFailed,
    /// A message arrived that is not valid in the receiver's current state.
    UnexpectedMessage(&'static str),
    /// A message was addressed to a node outside the swarm.
    UnknownNode(NodeId),
    /// The peer's input manifest could not be parsed.
    Manifest(ManifestError),
    /// An IO error ocurred.
    Io(IoError),
    /// A node task panicked or was cancelled.
    Task(JoinError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            Channel => write!(f, "channel error"),
            HandshakeFailed => {
                write!(f, "tracker did not send the ready signal")
            }
            UnexpectedMessage(kind) => {
                write!(f, "unexpected {} message", kind)
            }
            UnknownNode(id) => write!(f, "unknown node {}", id),
            Manifest(e) => write!(f, "{}", e),
            Io(e) => write!(f, "{}", e),
            Task(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;
        match self {
            Manifest(e) => Some(e),
            Io(e) => Some(e),
            Task(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl From<ManifestError> for Error {
    fn from(e: ManifestError) -> Self {
        Self::Manifest(e)
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Self::Task(e)
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(_: SendError<T>) -> Self {
        Self::Channel
    }
}
