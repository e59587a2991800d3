//! A tracker-mediated segment swarming protocol.
//!
//! A single tracker node keeps, for every named file, the file's canonical
//! segment manifest and the list of nodes that can serve at least one of its
//! segments. Peer nodes announce what they seed, ask the tracker for a file's
//! swarm, and then pull the file's segments directly from swarm members in
//! a round-robin fashion. Once every peer reports that it has all its wanted
//! files, the tracker tells every peer to stop serving and exits.
//!
//! Only segment identifiers are exchanged, never file content.

pub mod conf;
mod disk;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod message;
pub mod peer;
pub mod prelude;
pub mod tracker;
pub mod transport;

pub use disk::Stats as DiskStats;

/// Identifies a node in the swarm. The tracker is always node
/// [`TRACKER_ID`], peers are numbered from 1.
pub type NodeId = usize;

/// An opaque content fingerprint of a single fixed-size unit of a file.
///
/// The order of segments within a file is significant and is fixed by the
/// file's manifest.
pub type SegmentId = String;

/// The node id of the tracker.
pub const TRACKER_ID: NodeId = 0;

/// The file name that, when received on the segment-request channel, tells an
/// uploader to shut down. Files cannot be named this.
pub const TERMINATE_SENTINEL: &str = "TERMINATE";

/// A file and its ordered list of segments, as owned by a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedFile {
    pub name: String,
    pub segments: Vec<SegmentId>,
}

impl OwnedFile {
    pub fn new(
        name: impl Into<String>,
        segments: impl IntoIterator<Item = impl Into<SegmentId>>,
    ) -> Self {
        Self {
            name: name.into(),
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }
}
