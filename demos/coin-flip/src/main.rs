//! A match worker that flips a coin.
//!
//! Launched by the lobby as
//! `coin-flip --port P --player_count N --players p1 p2 ...`. Each player
//! connects over TCP and sends its name on one line. Once everyone has
//! arrived (or the join window closes) one of the present players wins at
//! random, every client is told the result, and the worker prints
//! `GAME_RESULT: {...}` on stdout for the lobby to record. If nobody
//! arrives the worker exits without a result line.
//!
//! Logs go to stderr; stdout carries only the result line.

use std::time::Duration;

use clap::Parser;
use rand::Rng;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "coin-flip", about = "Coin-flip match worker")]
struct Args {
    /// Port to listen on for players.
    #[arg(long)]
    port: u16,

    /// Number of players expected.
    #[arg(long = "player_count", default_value_t = 2)]
    player_count: usize,

    /// Rostered player names, in join order.
    #[arg(long, num_args = 0..)]
    players: Vec<String>,

    /// Seconds to wait for everyone to connect.
    #[arg(long = "join_timeout", default_value_t = 30)]
    join_timeout: u64,
}

/// A connected, rostered player.
struct Seat {
    name: String,
    stream: TcpStream,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coin_flip=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, expected = args.player_count, roster = ?args.players, "waiting for players");

    let expected = args.player_count.min(args.players.len());
    let mut seats = Vec::with_capacity(expected);
    let window = tokio::time::sleep(Duration::from_secs(args.join_timeout));
    tokio::pin!(window);

    while seats.len() < expected {
        tokio::select! {
            _ = &mut window => {
                warn!(arrived = seats.len(), expected, "join window closed");
                break;
            }
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                match greet(stream, &args.players, &seats).await {
                    Some(seat) => {
                        info!(player = %seat.name, %addr, "player joined");
                        seats.push(seat);
                    }
                    None => warn!(%addr, "rejected connection"),
                }
            }
        }
    }

    let present: Vec<String> = seats.iter().map(|s| s.name.clone()).collect();
    let Some(winner) = pick_winner(&present, &mut rand::rng()) else {
        warn!("nobody showed up, exiting without a result");
        return Ok(());
    };

    let announcement = format!("The coin says: {winner} wins!\n");
    for seat in &mut seats {
        if let Err(e) = seat.stream.write_all(announcement.as_bytes()).await {
            warn!(player = %seat.name, error = %e, "failed to announce result");
        }
    }

    println!("{}", result_line(&winner, &args.players));
    Ok(())
}

/// Reads the player's name line and checks it against the roster.
async fn greet(stream: TcpStream, roster: &[String], seats: &[Seat]) -> Option<Seat> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line)).await;
    if !matches!(read, Ok(Ok(n)) if n > 0) {
        return None;
    }

    let name = line.trim().to_string();
    let rostered = roster.contains(&name);
    let seated = seats.iter().any(|s| s.name == name);
    if !rostered || seated {
        return None;
    }

    let mut stream = reader.into_inner();
    stream.write_all(format!("welcome {name}\n").as_bytes()).await.ok()?;
    Some(Seat { name, stream })
}

/// Uniform pick among the players present. `None` when nobody came.
fn pick_winner<R: Rng>(present: &[String], rng: &mut R) -> Option<String> {
    if present.is_empty() {
        return None;
    }
    Some(present[rng.random_range(0..present.len())].clone())
}

/// The sentinel line the lobby parses. `players` is the full roster.
fn result_line(winner: &str, players: &[String]) -> String {
    format!(
        "GAME_RESULT: {}",
        json!({ "winner": winner, "players": players })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pick_winner_is_a_present_player() {
        let present = names(&["alice", "bob"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let winner = pick_winner(&present, &mut rng).unwrap();
            assert!(present.contains(&winner));
        }
    }

    #[test]
    fn test_pick_winner_nobody_present() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_winner(&[], &mut rng), None);
    }

    #[test]
    fn test_result_line_format() {
        let line = result_line("bob", &names(&["alice", "bob"]));
        let payload = line.strip_prefix("GAME_RESULT: ").unwrap();
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value, json!({ "winner": "bob", "players": ["alice", "bob"] }));
    }

    #[test]
    fn test_result_line_is_one_line() {
        let line = result_line("bob", &names(&["alice", "bob", "carol"]));
        assert!(line.starts_with("GAME_RESULT: {"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_args_match_lobby_invocation() {
        let args = Args::parse_from([
            "coin-flip",
            "--port",
            "40000",
            "--player_count",
            "2",
            "--players",
            "alice",
            "bob",
        ]);
        assert_eq!(args.port, 40000);
        assert_eq!(args.player_count, 2);
        assert_eq!(args.players, names(&["alice", "bob"]));
    }
}
