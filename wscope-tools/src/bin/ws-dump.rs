// ws-dump
//
// Opens a socket, sends the given messages once it is open, and prints one
// line per frame event until the socket closes.

use chrono::{DateTime, Local};
use clap::Parser;
use std::process::ExitCode;
use wscope::event::FrameEvent;
use wscope::format::{display_line, display_lines};
use wscope::socket::{close_codes, Client, Delivery, Status};
use wscope_tools::{logging, WsOpts};

#[derive(Parser, Debug)]
#[command(name = "ws-dump", version, about = "Print the traffic of a WebSocket")]
struct Cli {
    #[command(flatten)]
    ws: WsOpts,

    /// Message to send once the socket is open; may be repeated
    #[arg(long = "send")]
    send: Vec<String>,
}

fn print_event(event: &FrameEvent) {
    let time = DateTime::from_timestamp_millis(event.time)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| event.time.to_string());
    match event.display_text() {
        Some(text) if event.kind.is_message() && event.is_binary => {
            println!("{} {}", time, event.kind);
            for line in display_lines(text) {
                println!("    {}", line);
            }
        }
        _ => println!("{} {} {}", time, event.kind, display_line(&event.summary())),
    }
}

fn dump(cli: &Cli) -> Result<u16, String> {
    let settings = cli.ws.load_settings().map_err(|e| e.to_string())?;
    let (mut client, deliveries) = Client::new(&settings);
    client.open(&cli.ws.url).map_err(|e| e.to_string())?;

    for delivery in deliveries.iter() {
        match delivery {
            Delivery::Frames(batch) => batch.iter().for_each(print_event),
            Delivery::Status(Status::Open { .. }) => {
                for (id, message) in cli.send.iter().enumerate() {
                    client
                        .send(id as u64 + 1, message.as_str())
                        .map_err(|e| e.to_string())?;
                }
            }
            Delivery::Status(Status::SendError { id, error, .. }) => {
                eprintln!("message {} failed: {}", id, error);
            }
            Delivery::Status(Status::Closed { code, .. }) => return Ok(code),
            Delivery::Status(_) => {}
        }
    }
    Err("socket worker stopped".to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.ws.log_config()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match dump(&cli) {
        Ok(close_codes::ABNORMAL) => {
            eprintln!("connection closed abnormally");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
