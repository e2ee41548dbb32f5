//! Desk Bank line client
//!
//! Connects to a running `desk-bank`, waits until a desk is ready, then sends
//! one command per line from standard input and prints each response.
//! Commands are checked locally first, so a typo never costs a round trip.
//!
//! ```bash
//! cargo run --bin desk-client -- --connect 127.0.0.1:7878
//! ```
//!
//! # Exit Codes
//!
//! - 0: Session ended with `q` or end of input
//! - 1: Connection failed, the server turned the session away, or the server
//!   closed the session

use clap::Parser;
use desk_bank::io::protocol::{self, Command, LineRead, READY_TOKEN};
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;

/// Talk to a desk bank server
#[derive(Parser, Debug)]
#[command(name = "desk-client")]
#[command(about = "Interactive client for the desk bank server", long_about = None)]
struct ClientArgs {
    /// Server address
    #[arg(long = "connect", value_name = "ADDR", default_value = "127.0.0.1:7878")]
    connect: String,
}

fn main() {
    let args = ClientArgs::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &ClientArgs) -> io::Result<()> {
    let stream = TcpStream::connect(&args.connect)?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    eprintln!("Waiting for a desk...");
    match read_response(&mut reader)? {
        line if line == READY_TOKEN => eprintln!("Connected. Commands: l, w, d, t, q"),
        // Busy or shutting down.
        line => return Err(io::Error::other(line)),
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        protocol::write_line(&mut writer, line.trim())?;
        if command == Command::Quit {
            return Ok(());
        }
        writeln!(stdout, "{}", read_response(&mut reader)?)?;
        stdout.flush()?;
    }

    protocol::write_line(&mut writer, "q")
}

fn read_response(reader: &mut BufReader<TcpStream>) -> io::Result<String> {
    match protocol::read_line(reader)? {
        LineRead::Line(line) => Ok(line),
        LineRead::TooLong => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "response line too long",
        )),
        LineRead::Closed => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "server closed the session",
        )),
    }
}
