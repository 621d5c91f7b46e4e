//! nodekeeper line client
//!
//! Sends request lines to a running `nkd` and prints each reply.
//!
//! # Usage
//!
//! ```bash
//! # One-off requests
//! nk CREATE:/config SET:/config:v1 GET:/config
//!
//! # Requests from stdin, one per line
//! printf 'CHILDREN:/\nEXISTS:/config\n' | nk
//!
//! # Watch a node and keep printing notices until Ctrl-C
//! nk --follow WATCH:/config
//! ```

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use nk_protocol::is_notice_line;

/// nodekeeper client - send request lines to nkd
#[derive(Parser, Debug)]
#[command(name = "nk", version, about)]
struct Args {
    /// Address of the daemon
    #[arg(short, long, default_value = "127.0.0.1:8123")]
    addr: SocketAddr,

    /// Keep the connection open and print watch notices until Ctrl-C
    #[arg(short, long)]
    follow: bool,

    /// Request lines such as `CREATE:/a`; read from stdin when omitted
    requests: Vec<String>,
}

type ServerLines = Lines<BufReader<OwnedReadHalf>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut lines, mut writer) = establish_connection(args.addr).await?;

    let greeting = next_line(&mut lines).await?;
    println!("{greeting}");

    if args.requests.is_empty() {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Some(request) = stdin.next_line().await.context("failed to read stdin")? {
            if request.is_empty() {
                continue;
            }
            round_trip(&mut lines, &mut writer, &request).await?;
        }
    } else {
        for request in &args.requests {
            round_trip(&mut lines, &mut writer, request).await?;
        }
    }

    if args.follow {
        follow_notices(&mut lines).await?;
    }

    let _ = writer.shutdown().await;
    Ok(())
}

async fn establish_connection(addr: SocketAddr) -> Result<(ServerLines, OwnedWriteHalf)> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;

    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader).lines(), writer))
}

/// Sends one request and prints lines until its reply arrives.
///
/// Notices received in the meantime are printed but do not count as the reply.
async fn round_trip(lines: &mut ServerLines, writer: &mut OwnedWriteHalf, request: &str) -> Result<()> {
    writer
        .write_all(format!("{request}\n").as_bytes())
        .await
        .context("failed to send request")?;

    loop {
        let line = next_line(lines).await?;
        println!("{line}");
        if !is_notice_line(&line) {
            return Ok(());
        }
    }
}

async fn follow_notices(lines: &mut ServerLines) -> Result<()> {
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read from server")? {
                    Some(line) => println!("{line}"),
                    None => {
                        eprintln!("*** server closed the connection");
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn next_line(lines: &mut ServerLines) -> Result<String> {
    match lines.next_line().await.context("failed to read from server")? {
        Some(line) => Ok(line),
        None => bail!("server closed the connection"),
    }
}
