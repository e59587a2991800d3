//! The protocol messages exchanged between the tracker and peers, and the
//! space separated payload grammar they are carried in.

use std::{convert::TryFrom, fmt, io, str::SplitWhitespace};

use crate::{NodeId, OwnedFile, SegmentId, TERMINATE_SENTINEL};

/// The logical channel a message travels on. Keeping these apart lets a node
/// wait for one kind of traffic without consuming another.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// Peer to tracker and tracker to peer coordination.
    Control = 1,
    /// The ACK/NACK answers to segment requests.
    Response = 2,
    /// Segment requests between peers and the tracker's termination signal.
    Request = 3,
}

impl TryFrom<u8> for Channel {
    type Error = io::Error;
    fn try_from(k: u8) -> Result<Self, Self::Error> {
        use Channel::*;
        match k {
            k if k == Control as u8 => Ok(Control),
            k if k == Response as u8 => Ok(Response),
            k if k == Request as u8 => Ok(Request),
            _ => Err(invalid_data("Unknown channel tag")),
        }
    }
}

/// The action code that precedes the payload of every control message.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionCode {
    Ready = 1,
    InitialOwnership = 11,
    AllFilesCompleted = 22,
    FileCompleted = 33,
    PeerUpdate = 44,
    SwarmQuery = 55,
    SwarmReply = 56,
}

impl TryFrom<i32> for ActionCode {
    type Error = io::Error;
    fn try_from(k: i32) -> Result<Self, Self::Error> {
        use ActionCode::*;
        match k {
            k if k == Ready as i32 => Ok(Ready),
            k if k == InitialOwnership as i32 => Ok(InitialOwnership),
            k if k == AllFilesCompleted as i32 => Ok(AllFilesCompleted),
            k if k == FileCompleted as i32 => Ok(FileCompleted),
            k if k == PeerUpdate as i32 => Ok(PeerUpdate),
            k if k == SwarmQuery as i32 => Ok(SwarmQuery),
            k if k == SwarmReply as i32 => Ok(SwarmReply),
            _ => Err(invalid_data("Unknown action code")),
        }
    }
}

/// A peer's answer to a segment request.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    Nack = 0,
    Ack = 1,
}

impl TryFrom<i32> for Response {
    type Error = io::Error;
    fn try_from(k: i32) -> Result<Self, Self::Error> {
        match k {
            k if k == Response::Ack as i32 => Ok(Response::Ack),
            k if k == Response::Nack as i32 => Ok(Response::Nack),
            _ => Err(invalid_data("Unknown response code")),
        }
    }
}

/// The tracker's answer to a swarm query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwarmReply {
    /// The nodes that can serve at least one segment of the file, in the order
    /// they joined the swarm.
    pub owners: Vec<NodeId>,
    /// The file's full manifest.
    pub segments: Vec<SegmentId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// The files a peer seeds from the start, sent once before anything else.
    InitialOwnership(Vec<OwnedFile>),
    /// Sent by the tracker to every peer once all peers announced their
    /// initial files.
    Ready,
    SwarmQuery {
        file: String,
    },
    SwarmReply(SwarmReply),
    /// The sender now holds at least one segment of the file.
    PeerUpdate {
        file: String,
    },
    /// The sender attempted every segment of the file.
    FileCompleted {
        file: String,
    },
    /// The sender processed all of its wanted files.
    AllFilesCompleted,
    SegmentRequest {
        file: String,
        segment: SegmentId,
    },
    /// Sent by the tracker on the segment-request channel to stop uploaders.
    Terminate,
    SegmentResponse(Response),
}

impl Message {
    /// Returns the channel on which this message is delivered.
    pub fn channel(&self) -> Channel {
        use Message::*;
        match self {
            SegmentRequest { .. } | Terminate => Channel::Request,
            SegmentResponse(_) => Channel::Response,
            _ => Channel::Control,
        }
    }

    /// A short name of the message kind, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        use Message::*;
        match self {
            InitialOwnership(_) => "initial ownership",
            Ready => "ready",
            SwarmQuery { .. } => "swarm query",
            SwarmReply(_) => "swarm reply",
            PeerUpdate { .. } => "peer update",
            FileCompleted { .. } => "file completed",
            AllFilesCompleted => "all files completed",
            SegmentRequest { .. } => "segment request",
            Terminate => "terminate",
            SegmentResponse(_) => "segment response",
        }
    }

    /// Returns the action code of a control message, or `None` for messages
    /// on the other channels.
    pub(crate) fn action_code(&self) -> Option<ActionCode> {
        use Message::*;
        match self {
            InitialOwnership(_) => Some(ActionCode::InitialOwnership),
            Ready => Some(ActionCode::Ready),
            SwarmQuery { .. } => Some(ActionCode::SwarmQuery),
            SwarmReply(_) => Some(ActionCode::SwarmReply),
            PeerUpdate { .. } => Some(ActionCode::PeerUpdate),
            FileCompleted { .. } => Some(ActionCode::FileCompleted),
            AllFilesCompleted => Some(ActionCode::AllFilesCompleted),
            SegmentRequest { .. } | Terminate | SegmentResponse(_) => None,
        }
    }

    /// Builds the payload string of a control or segment-request message.
    /// Segment responses carry no payload and produce an empty string.
    pub(crate) fn payload(&self) -> String {
        use Message::*;
        let mut tokens: Vec<String> = Vec::new();
        match self {
            InitialOwnership(files) => {
                tokens.push(files.len().to_string());
                for file in files {
                    tokens.push(file.name.clone());
                    tokens.push(file.segments.len().to_string());
                    tokens.extend(file.segments.iter().cloned());
                }
            }
            SwarmReply(reply) => {
                tokens.push(reply.owners.len().to_string());
                tokens.extend(reply.owners.iter().map(|id| id.to_string()));
                tokens.push(reply.segments.len().to_string());
                tokens.extend(reply.segments.iter().cloned());
            }
            SwarmQuery { file }
            | PeerUpdate { file }
            | FileCompleted { file } => tokens.push(file.clone()),
            SegmentRequest { file, segment } => {
                tokens.push(file.clone());
                tokens.push(segment.clone());
            }
            Terminate => tokens.push(TERMINATE_SENTINEL.to_string()),
            Ready | AllFilesCompleted | SegmentResponse(_) => {}
        }
        tokens.join(" ")
    }

    /// Parses the payload of a control message with the given action code.
    pub(crate) fn from_control(
        code: ActionCode,
        payload: &str,
    ) -> io::Result<Self> {
        let mut tokens = Tokens::new(payload);
        let msg = match code {
            ActionCode::Ready => Message::Ready,
            ActionCode::AllFilesCompleted => Message::AllFilesCompleted,
            ActionCode::SwarmQuery => Message::SwarmQuery {
                file: tokens.next_str()?,
            },
            ActionCode::PeerUpdate => Message::PeerUpdate {
                file: tokens.next_str()?,
            },
            ActionCode::FileCompleted => Message::FileCompleted {
                file: tokens.next_str()?,
            },
            ActionCode::InitialOwnership => {
                let file_count = tokens.next_count()?;
                let mut files = Vec::new();
                for _ in 0..file_count {
                    let name = tokens.next_str()?;
                    let segments = tokens.next_list()?;
                    files.push(OwnedFile { name, segments });
                }
                Message::InitialOwnership(files)
            }
            ActionCode::SwarmReply => {
                let owner_count = tokens.next_count()?;
                let mut owners = Vec::new();
                for _ in 0..owner_count {
                    owners.push(tokens.next_count()?);
                }
                let segments = tokens.next_list()?;
                Message::SwarmReply(SwarmReply { owners, segments })
            }
        };
        tokens.finish()?;
        Ok(msg)
    }

    /// Parses the payload of a segment-request channel message.
    pub(crate) fn from_request(payload: &str) -> io::Result<Self> {
        let mut tokens = Tokens::new(payload);
        let file = tokens.next_str()?;
        if file == TERMINATE_SENTINEL {
            return Ok(Message::Terminate);
        }
        let segment = tokens.next_str()?;
        tokens.finish()?;
        Ok(Message::SegmentRequest { file, segment })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Walks the whitespace separated tokens of a payload.
struct Tokens<'a>(SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn new(payload: &'a str) -> Self {
        Self(payload.split_whitespace())
    }

    fn next_str(&mut self) -> io::Result<String> {
        self.0
            .next()
            .map(str::to_string)
            .ok_or_else(|| invalid_data("Payload ended prematurely"))
    }

    fn next_count(&mut self) -> io::Result<usize> {
        let token = self.next_str()?;
        token
            .parse()
            .map_err(|_| invalid_data("Payload count is not a number"))
    }

    // a count followed by that many tokens
    fn next_list(&mut self) -> io::Result<Vec<String>> {
        let count = self.next_count()?;
        (0..count).map(|_| self.next_str()).collect()
    }

    fn finish(mut self) -> io::Result<()> {
        match self.0.next() {
            Some(_) => Err(invalid_data("Trailing tokens in payload")),
            None => Ok(()),
        }
    }
}

fn invalid_data(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
