use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dispatch::{packet, DeviceWriter, FrameWriter};
use routing::{Board, PathFinder, DEFAULT_MIN_REAL};
use shared::domain::{CellId, CellType, Route};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo routes streamed by `send-demo`, in order.
const DEMO_SEQUENCES: [[u8; 12]; 3] = [
    [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
    [12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1],
    [5, 6, 7, 8, 1, 2, 3, 4, 9, 10, 11, 12],
];

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the 15-byte frame for a route.
    Encode {
        #[arg(required = true)]
        cells: Vec<CellId>,
    },
    /// Run the route search on a board given as `<cell>=<type>` pairs.
    Solve {
        #[arg(long, default_value_t = DEFAULT_MIN_REAL)]
        min_real: usize,
        #[arg(value_parser = parse_square)]
        squares: Vec<(CellId, CellType)>,
    },
    /// Stream demo frames to a serial device for bench testing.
    SendDemo {
        #[arg(long)]
        device: String,
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        /// Stop after this many passes over the demo routes.
        #[arg(long)]
        rounds: Option<u32>,
    },
}

fn parse_square(raw: &str) -> Result<(CellId, CellType)> {
    let (cell, kind) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <cell>=<type>, got '{raw}'"))?;
    let cell = cell.parse::<CellId>()?;
    let kind = kind.trim().parse::<CellType>()?;
    Ok((cell, kind))
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Encode { cells } => {
            let frame = packet::encode(&Route::from(cells));
            println!("{}", hex(frame.as_bytes()));
            println!("checksum {:#04x}", frame.checksum());
        }
        Command::Solve { min_real, squares } => {
            let mut board = Board::new();
            board.merge(squares);
            println!("board: {board}");
            println!(
                "real={} r1={} fake={}",
                board.count(CellType::Real),
                board.count(CellType::R1),
                board.count(CellType::Fake)
            );
            let routes = PathFinder::new(&board, min_real).find_routes();
            if routes.is_empty() {
                println!("no route with at least {min_real} Real cells");
            }
            for candidate in routes {
                println!("{} real={}", candidate.route, candidate.real_count);
            }
        }
        Command::SendDemo {
            device,
            interval_ms,
            rounds,
        } => {
            let mut writer = DeviceWriter::new(&device);
            let interval = Duration::from_millis(interval_ms);
            let mut round = 0u32;
            while rounds.map_or(true, |limit| round < limit) {
                for sequence in DEMO_SEQUENCES {
                    let frame = packet::encode_payload(&sequence);
                    writer
                        .write_frame(frame.as_bytes())
                        .await
                        .with_context(|| format!("writing demo frame to {device}"))?;
                    info!(frame = %hex(frame.as_bytes()), "sent demo frame");
                    tokio::time::sleep(interval).await;
                }
                round += 1;
            }
        }
    }

    Ok(())
}
