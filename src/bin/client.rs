use std::io::{self, Write};
use std::path::Path;

use alsrec::protocol::{self, RecommendRequest, RecommendResponse};
use alsrec::{init_tracing, Config, PoiRecord};
use anyhow::Result;
use clap::Parser;
use tokio::net::TcpStream;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Reads a user id and count from stdin, re-prompting on anything invalid.
/// Returns `None` when the user asks to exit.
fn read_query() -> io::Result<Option<(u64, u64)>> {
    println!("Enter id = -1 to exit.");
    loop {
        let user: i64 = match prompt("Enter user id: ")?.parse() {
            Ok(value) => value,
            Err(_) => {
                println!("Invalid input");
                continue;
            }
        };
        if user == -1 {
            return Ok(None);
        }

        let count: i64 = match prompt("Enter number of POIs: ")?.parse() {
            Ok(value) => value,
            Err(_) => {
                println!("Invalid input");
                continue;
            }
        };

        if user < 0 || count <= 0 {
            println!("Invalid input");
            continue;
        }
        return Ok(Some((user as u64, count as u64)));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    let config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        Config::default()
    };

    let Some((user_id, count)) = read_query()? else {
        return Ok(());
    };

    // The candidate the client already knows about; excluded from results.
    let exclude = PoiRecord::new(13, "Central Station", 40.6403, 22.9439, "Transport Hub");

    let addr = format!(
        "{}:{}",
        config.cluster.master_host, config.cluster.client_port
    );
    let mut stream = TcpStream::connect(&addr).await?;
    info!("connected to server at {}", addr);

    protocol::send_frame(
        &mut stream,
        &RecommendRequest {
            user_id,
            exclude,
            count,
        },
    )
    .await?;

    let response: RecommendResponse = protocol::read_frame(&mut stream).await?;
    match response.items {
        None => println!("Out of bounds."),
        Some(items) => {
            print!("Recommended POIs:");
            for id in items {
                print!(" | {}", id);
            }
            println!();
        }
    }

    Ok(())
}
