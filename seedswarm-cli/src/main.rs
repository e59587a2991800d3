use std::{net::SocketAddr, path::PathBuf};

use flexi_logger::{FileSpec, Logger};
use seedswarm::{manifest, prelude::*};
use structopt::StructOpt;
use tokio::net::TcpListener;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(StructOpt, Debug)]
pub struct Args {
    /// Log to files in this directory instead of stderr.
    #[structopt(long)]
    log_dir: Option<PathBuf>,

    /// Announce progress to the tracker after every this many acquired
    /// segments. Zero disables progress updates.
    #[structopt(long, default_value = "10")]
    progress_interval: u64,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Run the tracker and all peers in this process.
    Local {
        /// The number of peers in the swarm.
        #[structopt(short, long)]
        peers: usize,

        /// The folder containing the peers' manifests, named `in<rank>.txt`.
        #[structopt(short, long, default_value = ".")]
        input_dir: PathBuf,

        /// The folder in which to save downloaded files.
        #[structopt(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Run the tracker node of a TCP swarm.
    Tracker {
        /// A comma separated list of the <ip>:<port> pairs of all nodes, the
        /// tracker's first.
        #[structopt(short, long, use_delimiter = true)]
        nodes: Vec<SocketAddr>,
    },
    /// Run a single peer node of a TCP swarm.
    Peer {
        /// The id of this peer, which is also its index in the node list.
        #[structopt(short, long)]
        rank: NodeId,

        /// A comma separated list of the <ip>:<port> pairs of all nodes, the
        /// tracker's first.
        #[structopt(short, long, use_delimiter = true)]
        nodes: Vec<SocketAddr>,

        /// The peer's manifest. Defaults to `in<rank>.txt`.
        #[structopt(short, long)]
        input: Option<PathBuf>,

        /// The folder in which to save downloaded files.
        #[structopt(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::from_args();

    let logger = Logger::try_with_env_or_str("info")?;
    let _logger = match &args.log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .start()?,
        None => logger.start()?,
    };
    log::debug!("Arguments: {:?}", args);

    match args.cmd {
        Command::Local {
            peers,
            input_dir,
            output_dir,
        } => {
            let mut manifests = Vec::with_capacity(peers);
            for rank in 1..=peers {
                let path = input_dir.join(manifest::file_name(rank));
                manifests.push(PeerManifest::from_file(&path)?);
            }
            let mut conf = Conf::new(output_dir);
            conf.peer.progress_interval = args.progress_interval;

            let report = engine::run_local_swarm(conf, manifests).await?;
            for peer in report.peers.iter() {
                print_peer(peer);
            }
            println!(
                "{}/{} peers completed",
                report.tracker.completed_count(),
                report.tracker.peer_count()
            );
        }
        Command::Tracker { nodes } => {
            let addr = nodes.get(TRACKER_ID).ok_or("no tracker address")?;
            let listener = TcpListener::bind(addr).await?;
            let conf = Conf::new(".");
            let state =
                engine::run_tracker_node(listener, &nodes, &conf).await?;
            println!(
                "{}/{} peers completed",
                state.completed_count(),
                state.peer_count()
            );
        }
        Command::Peer {
            rank,
            nodes,
            input,
            output_dir,
        } => {
            let addr = nodes.get(rank).ok_or("rank out of range")?;
            let input =
                input.unwrap_or_else(|| manifest::file_name(rank).into());
            let manifest = PeerManifest::from_file(&input)?;
            let mut conf = Conf::new(output_dir);
            conf.peer.progress_interval = args.progress_interval;

            let listener = TcpListener::bind(addr).await?;
            let report =
                engine::run_peer_node(listener, rank, &nodes, manifest, &conf)
                    .await?;
            print_peer(&report);
        }
    }

    Ok(())
}

fn print_peer(peer: &PeerReport) {
    println!(
        "peer {}: acquired {} segment(s), failed {}, skipped {} file(s), \
        served {}, refused {}",
        peer.id,
        peer.download.acquired,
        peer.download.failed,
        peer.download.skipped_files,
        peer.upload.served,
        peer.upload.refused,
    );
}
