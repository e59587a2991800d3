//! This module exports types commonly used by applications as a convenience.

pub use crate::{
    conf::Conf,
    engine::{self, SwarmReport},
    error::Error,
    manifest::PeerManifest,
    peer::{Peer, PeerReport},
    tracker::{Tracker, TrackerState},
    NodeId, OwnedFile, TRACKER_ID,
};
