//! Logging macros shared by a peer's downloader and uploader.
//!
//! Both tasks of a peer log to the same output, as do all other peers of a
//! local swarm. Every line is tagged with `[Peer <id>]` so a single peer's
//! activity can be grepped out of it. The first macro argument is the task
//! (`self`), which must have an `id` field holding the peer's node id.

macro_rules! peer_warn {
    ($self:ident, $($arg:tt)*) => ({
        ::log::warn!("[Peer {}] {}", $self.id, format!($($arg)*));
    })
}

macro_rules! peer_info {
    ($self:ident, $($arg:tt)*) => ({
        ::log::info!("[Peer {}] {}", $self.id, format!($($arg)*));
    })
}

macro_rules! peer_debug {
    ($self:ident, $($arg:tt)*) => ({
        ::log::debug!("[Peer {}] {}", $self.id, format!($($arg)*));
    })
}

macro_rules! peer_trace {
    ($self:ident, $($arg:tt)*) => ({
        ::log::trace!("[Peer {}] {}", $self.id, format!($($arg)*));
    })
}
