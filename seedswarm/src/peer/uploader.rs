use {
    super::store::OwnedSegments,
    crate::{
        error::*,
        message::{Message, Response},
        transport::{Frame, FrameReceiver, Router},
        NodeId,
    },
};

/// Statistics of the segment requests a peer served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// The number of requests answered with an ACK.
    pub served: usize,
    /// The number of requests answered with a NACK.
    pub refused: usize,
}

/// Answers other peers' segment requests from the segments we own.
pub(super) struct Uploader {
    id: NodeId,
    store: OwnedSegments,
    router: Router,
    /// The port on which segment requests and the termination signal arrive.
    request_port: FrameReceiver,
    stats: UploadStats,
}

impl Uploader {
    pub fn new(
        id: NodeId,
        store: OwnedSegments,
        router: Router,
        request_port: FrameReceiver,
    ) -> Self {
        Self {
            id,
            store,
            router,
            request_port,
            stats: UploadStats::default(),
        }
    }

    /// Serves requests until the tracker's termination signal arrives.
    pub async fn run(mut self) -> Result<UploadStats> {
        peer_info!(self, "Starting uploader");
        while let Some(Frame { from, msg }) = self.request_port.recv().await {
            match msg {
                Message::Terminate => {
                    peer_info!(
                        self,
                        "Terminating uploader (served: {}, refused: {})",
                        self.stats.served,
                        self.stats.refused
                    );
                    return Ok(self.stats);
                }
                Message::SegmentRequest { file, segment } => {
                    self.handle_request(from, &file, &segment).await?;
                }
                msg => {
                    peer_warn!(
                        self,
                        "Ignoring unexpected {} from node {}",
                        msg,
                        from
                    );
                }
            }
        }
        // every sender is gone without us having been told to stop
        Err(Error::Channel)
    }

    async fn handle_request(
        &mut self,
        requester: NodeId,
        file: &str,
        segment: &str,
    ) -> Result<()> {
        peer_debug!(
            self,
            "Peer {} requested segment {} of file {}",
            requester,
            segment,
            file
        );
        let response = if self.store.contains(file, segment).await {
            peer_trace!(
                self,
                "Sending segment {} to peer {}",
                segment,
                requester
            );
            self.stats.served += 1;
            Response::Ack
        } else {
            peer_trace!(
                self,
                "Refusing segment {} to peer {}",
                segment,
                requester
            );
            self.stats.refused += 1;
            Response::Nack
        };
        self.router
            .send(requester, Message::SegmentResponse(response))
    }
}
