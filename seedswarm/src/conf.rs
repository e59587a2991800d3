use std::{path::PathBuf, time::Duration};

/// The default number of acquired segments after which a peer reports its
/// progress to the tracker and refreshes the file's swarm.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10;

#[derive(Clone, Debug)]
pub struct Conf {
    pub peer: PeerConf,
    pub net: NetConf,
}

impl Conf {
    /// Returns the default configuration, with completed files saved under
    /// `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            peer: PeerConf {
                output_dir: output_dir.into(),
                progress_interval: DEFAULT_PROGRESS_INTERVAL,
            },
            net: NetConf::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PeerConf {
    /// The directory in which the segment lists of downloaded files are
    /// saved.
    pub output_dir: PathBuf,
    /// Every time the total number of acquired segments reaches a multiple of
    /// this value, the peer announces itself as a partial owner of the
    /// current file and re-queries the file's swarm.
    ///
    /// Zero disables progress updates.
    pub progress_interval: u64,
}

/// Settings of the TCP transport.
#[derive(Clone, Debug)]
pub struct NetConf {
    /// How many times to try connecting to a remote node before giving up.
    /// Nodes are started independently so the first attempts may well be
    /// refused.
    pub connect_attempts: usize,
    /// The pause between two connection attempts.
    pub connect_retry_interval: Duration,
}

impl Default for NetConf {
    fn default() -> Self {
        Self {
            connect_attempts: 50,
            connect_retry_interval: Duration::from_millis(100),
        }
    }
}
