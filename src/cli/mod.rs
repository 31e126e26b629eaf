use anyhow::{Context, Result};
use bittorrent_wire::metainfo::{AnnounceList, Info, MetaInfo};
use bittorrent_wire::peer::{ConnectionConfig, ExtendedHandshake, Message, PeerConnection};
use bittorrent_wire::Magnet;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bittorrent-wire")]
#[command(about = "Inspect and create torrents, and talk to BitTorrent peers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a torrent file
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,
    },

    /// Create a torrent file from a file or directory
    Create {
        /// File or directory to hash
        path: PathBuf,

        /// Where to write the .torrent file [default: <name>.torrent]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Piece length in bytes, picked from the content size if omitted
        #[arg(short, long)]
        piece_length: Option<u64>,

        /// Tracker URL, each one its own tier. May be repeated.
        #[arg(short, long = "tracker")]
        trackers: Vec<String>,

        /// Mark the torrent private
        #[arg(long)]
        private: bool,

        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Print the magnet link of a torrent file
    Magnet {
        /// Path to the .torrent file
        torrent: PathBuf,
    },

    /// Decode a magnet link
    ParseMagnet {
        uri: String,
    },

    /// Handshake with a peer and print what it advertises
    Handshake {
        /// Peer address, e.g. 127.0.0.1:6881
        addr: SocketAddr,

        /// Path to the .torrent file
        torrent: PathBuf,

        /// Largest message accepted from the peer, in bytes
        #[arg(long)]
        max_message_length: Option<u32>,

        /// Seconds to wait for the peer's first message
        #[arg(long, default_value = "5")]
        wait: u64,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Info { torrent } => {
                self.show_torrent_info(torrent).await?;
            }

            Commands::Create {
                path,
                output,
                piece_length,
                trackers,
                private,
                comment,
            } => {
                let mut info = Info {
                    piece_length: piece_length.unwrap_or(0),
                    private: private.then_some(true),
                    ..Default::default()
                };
                let root = path.clone();
                let info = tokio::task::spawn_blocking(move || {
                    info.build_from_file_path(&root)?;
                    Ok::<_, bittorrent_wire::BittorrentError>(info)
                })
                .await
                .context("hashing task failed")??;

                let mut mi = MetaInfo {
                    announce: trackers.first().cloned().unwrap_or_default(),
                    comment: comment.clone(),
                    ..Default::default()
                };
                if trackers.len() > 1 {
                    mi.announce_list =
                        AnnounceList(trackers.iter().map(|t| vec![t.clone()]).collect());
                }
                mi.set_info(&info);
                mi.set_defaults();

                let output = output
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(format!("{}.torrent", info.name)));
                mi.write_to_file(&output).await?;

                info!(
                    "Wrote {} ({} pieces), info hash {}",
                    output.display(),
                    info.num_pieces(),
                    mi.hash_info_bytes()
                );
            }

            Commands::Magnet { torrent } => {
                let mi = MetaInfo::load_from_file(torrent).await?;
                let info = mi.unmarshal_info()?;
                println!("{}", mi.magnet(Some(&info)));
            }

            Commands::ParseMagnet { uri } => {
                let magnet: Magnet = uri.parse()?;
                println!("Info Hash: {}", magnet.info_hash);
                if let Some(name) = &magnet.display_name {
                    println!("Name: {}", name);
                }
                for tracker in &magnet.trackers {
                    println!("Tracker: {}", tracker);
                }
                for (key, value) in &magnet.params {
                    println!("{}: {}", key, value);
                }
            }

            Commands::Handshake {
                addr,
                torrent,
                max_message_length,
                wait,
            } => {
                let mut config = ConnectionConfig::default();
                if let Some(max) = max_message_length {
                    config.max_message_length = *max;
                }
                self.handshake(*addr, torrent, &config, Duration::from_secs(*wait))
                    .await?;
            }
        }

        Ok(())
    }

    async fn show_torrent_info(&self, torrent_path: &Path) -> Result<()> {
        let metainfo = MetaInfo::load_from_file(torrent_path).await?;
        let info = metainfo.unmarshal_info()?;

        println!("Torrent Information");
        println!("==================");
        println!("Name: {}", info.name);
        println!("Info Hash: {}", metainfo.hash_info_bytes());
        println!("Total Size: {} bytes", info.total_length());
        println!("Piece Length: {} bytes", info.piece_length);
        println!("Number of Pieces: {}", info.num_pieces());
        if info.private == Some(true) {
            println!("Private: yes");
        }
        if let Some(comment) = &metainfo.comment {
            println!("Comment: {}", comment);
        }
        if let Some(created_by) = &metainfo.created_by {
            println!("Created By: {}", created_by);
        }

        println!("\nFiles:");
        for (i, file) in info.upverted_files().iter().enumerate() {
            let path = if file.path.is_empty() {
                info.name.clone()
            } else {
                file.display_path()
            };
            println!("  {}: {} ({} bytes)", i + 1, path, file.length);
        }

        let tiers = metainfo.upverted_announce_list();
        if !tiers.is_empty() {
            println!("\nTrackers:");
            for (tier, trackers) in tiers.0.iter().enumerate() {
                println!("  Tier {}:", tier + 1);
                for tracker in trackers {
                    println!("    - {}", tracker);
                }
            }
        }

        if !metainfo.nodes.is_empty() {
            println!("\nDHT Nodes:");
            for node in &metainfo.nodes {
                println!("    - {}", node);
            }
        }

        println!("\nMagnet: {}", metainfo.magnet(Some(&info)));

        Ok(())
    }

    async fn handshake(
        &self,
        addr: SocketAddr,
        torrent_path: &Path,
        config: &ConnectionConfig,
        wait: Duration,
    ) -> Result<()> {
        let metainfo = MetaInfo::load_from_file(torrent_path).await?;
        let mut conn = PeerConnection::connect(addr, metainfo.hash_info_bytes(), config).await?;

        println!("Peer ID: {}", hex::encode(conn.peer_id()));
        println!("Extensions: {:?}", conn.extensions());

        if conn.extensions().supports_extended() {
            let ours = ExtendedHandshake {
                v: Some(format!(
                    "{} {}",
                    env!("CARGO_PKG_NAME"),
                    env!("CARGO_PKG_VERSION")
                )),
                ..Default::default()
            };
            conn.send_extended_handshake(&ours).await?;
        }

        match timeout(wait, conn.receive_message()).await {
            Ok(Ok(Some(Message::Extended { id: 0, payload }))) => {
                let theirs = ExtendedHandshake::from_bytes(&payload)?;
                println!("Extended handshake: {:?}", theirs);
            }
            Ok(Ok(Some(message))) => println!("First message: {:?}", message.message_type()),
            Ok(Ok(None)) => println!("Peer closed the connection"),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => warn!("No message from {} within {:?}", addr, wait),
        }

        Ok(())
    }
}
