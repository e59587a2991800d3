//! The tracker mediates swarm membership. It never transfers segments, it
//! only keeps track of who has what and hands out that information on
//! request.

mod state;

pub use state::{Member, Role, Swarm, TrackerState};

use crate::{
    error::*,
    message::Message,
    transport::{Endpoint, Frame, FrameReceiver, Router},
    NodeId,
};

/// The tracker's single threaded event loop.
///
/// Control messages are processed one at a time in the order they arrive, so
/// all state transitions are serialized and no locking is needed.
pub struct Tracker {
    state: TrackerState,
    router: Router,
    /// The port on which peers' control messages arrive.
    control_port: FrameReceiver,
}

impl Tracker {
    /// Creates the tracker of a swarm. Every node of the endpoint's swarm other
    /// than the tracker itself is a peer.
    pub fn new(endpoint: Endpoint) -> Self {
        let Endpoint { router, inbox, .. } = endpoint;
        // the tracker is never sent segment requests or responses
        let peer_count = router.node_count().saturating_sub(1);
        Self {
            state: TrackerState::new(peer_count),
            router,
            control_port: inbox.control,
        }
    }

    /// Runs the tracker until every peer has finished downloading, then tells
    /// every peer to stop and returns the final swarm state.
    pub async fn run(mut self) -> Result<TrackerState> {
        log::info!(
            "Starting tracker for {} peer(s)",
            self.state.peer_count()
        );

        self.receive_initial_ownership().await?;
        self.acknowledge_initial_ownership()?;
        self.mediate().await?;
        self.terminate()?;

        log::info!("Tracker done");
        Ok(self.state)
    }

    /// Waits until every peer announced the files it seeds.
    async fn receive_initial_ownership(&mut self) -> Result<()> {
        while !self.state.all_announced() {
            let Frame { from, msg } = self.recv().await?;
            match msg {
                Message::InitialOwnership(files) => {
                    if self.state.has_announced(from) {
                        log::warn!(
                            "Peer {} announced its initial files twice",
                            from
                        );
                    }
                    log::info!(
                        "Peer {} seeds {} file(s)",
                        from,
                        files.len()
                    );
                    self.state.register_initial_ownership(from, files);
                }
                msg => {
                    log::warn!(
                        "Ignoring {} message from peer {} before all peers \
                        announced",
                        msg,
                        from
                    );
                }
            }
        }
        Ok(())
    }

    /// Releases every peer's downloader and uploader.
    fn acknowledge_initial_ownership(&self) -> Result<()> {
        log::info!("All peers announced, sending ready signal");
        for peer in self.peers() {
            self.router.send(peer, Message::Ready)?;
        }
        Ok(())
    }

    /// Dispatches control messages until every peer reported completion.
    async fn mediate(&mut self) -> Result<()> {
        while !self.state.is_done() {
            let frame = self.recv().await?;
            self.dispatch(frame)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        let Frame { from, msg } = frame;
        log::debug!("Tracker received {} from peer {}", msg, from);
        match msg {
            Message::SwarmQuery { file } => {
                let reply = self.state.swarm_reply(&file);
                log::debug!(
                    "Sending swarm of file {} ({} owner(s)) to peer {}",
                    file,
                    reply.owners.len(),
                    from
                );
                self.router.send(from, Message::SwarmReply(reply))?;
            }
            Message::PeerUpdate { file } => {
                if self.state.peer_progress(from, &file) {
                    log::info!("Peer {} joined swarm of file {}", from, file);
                }
            }
            Message::FileCompleted { file } => {
                log::info!("Peer {} completed file {}", from, file);
                self.state.file_completed(from, &file);
            }
            Message::AllFilesCompleted => {
                let count = self.state.all_files_completed(from);
                log::info!(
                    "Peer {} finished all downloads ({}/{})",
                    from,
                    count,
                    self.state.peer_count()
                );
            }
            Message::InitialOwnership(_) => {
                log::warn!(
                    "Ignoring late initial ownership from peer {}",
                    from
                );
            }
            msg => {
                log::warn!("Ignoring unexpected {} from node {}", msg, from);
            }
        }
        Ok(())
    }

    /// Tells every peer's uploader to shut down.
    fn terminate(&self) -> Result<()> {
        log::info!("All peers finished, terminating swarm");
        for peer in self.peers() {
            self.router.send(peer, Message::Terminate)?;
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame> {
        self.control_port.recv().await.ok_or(Error::Channel)
    }

    fn peers(&self) -> impl Iterator<Item = NodeId> {
        1..self.router.node_count()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        message::SwarmReply, transport::mesh, OwnedFile, TRACKER_ID,
    };

    // Drives a tracker through the whole protocol with hand-crafted peer
    // messages and checks what each peer receives.
    #[tokio::test]
    async fn test_tracker_protocol() {
        let mut nodes = mesh(3);
        let mut peer2 = nodes.pop().unwrap();
        let mut peer1 = nodes.pop().unwrap();
        let tracker = Tracker::new(nodes.pop().unwrap());
        let tracker = tokio::spawn(tracker.run());

        // messages other than the announcement are ignored before the gate
        peer2
            .router
            .send(TRACKER_ID, Message::SwarmQuery { file: "f".into() })
            .unwrap();
        peer1
            .router
            .send(
                TRACKER_ID,
                Message::InitialOwnership(vec![OwnedFile::new(
                    "f",
                    vec!["h1", "h2"],
                )]),
            )
            .unwrap();
        peer2
            .router
            .send(TRACKER_ID, Message::InitialOwnership(Vec::new()))
            .unwrap();

        for peer in [&mut peer1, &mut peer2].iter_mut() {
            let frame = peer.inbox.control.recv().await.unwrap();
            assert_eq!(frame.from, TRACKER_ID);
            assert_eq!(frame.msg, Message::Ready);
        }

        peer2
            .router
            .send(TRACKER_ID, Message::SwarmQuery { file: "f".into() })
            .unwrap();
        assert_eq!(
            peer2.inbox.control.recv().await.unwrap().msg,
            Message::SwarmReply(SwarmReply {
                owners: vec![1],
                segments: vec!["h1".into(), "h2".into()],
            })
        );

        peer2
            .router
            .send(TRACKER_ID, Message::PeerUpdate { file: "f".into() })
            .unwrap();
        peer2
            .router
            .send(TRACKER_ID, Message::SwarmQuery { file: "f".into() })
            .unwrap();
        match peer2.inbox.control.recv().await.unwrap().msg {
            Message::SwarmReply(reply) => assert_eq!(reply.owners, vec![1, 2]),
            msg => panic!("unexpected message: {:?}", msg),
        }

        peer2
            .router
            .send(TRACKER_ID, Message::FileCompleted { file: "f".into() })
            .unwrap();
        peer2
            .router
            .send(TRACKER_ID, Message::AllFilesCompleted)
            .unwrap();

        // nobody is terminated until every peer finished
        assert!(peer1.inbox.requests.try_recv().is_err());

        peer1
            .router
            .send(TRACKER_ID, Message::AllFilesCompleted)
            .unwrap();

        let state = tracker.await.unwrap().unwrap();
        assert_eq!(state.completed_count(), 2);
        assert_eq!(state.swarm("f").unwrap().seeds(), vec![1, 2]);

        for peer in [&mut peer1, &mut peer2].iter_mut() {
            let frame = peer.inbox.requests.recv().await.unwrap();
            assert_eq!(frame.from, TRACKER_ID);
            assert_eq!(frame.msg, Message::Terminate);
        }
    }

    // Tests that a swarm without peers terminates right away.
    #[tokio::test]
    async fn test_tracker_without_peers() {
        let mut nodes = mesh(1);
        let tracker = Tracker::new(nodes.pop().unwrap());
        let state = tracker.run().await.unwrap();
        assert_eq!(state.peer_count(), 0);
        assert!(state.is_done());
    }
}
