use std::io::{stdin, BufRead};

use arq_core::Callsign;
use arq_modem::{EngineConfig, EngineEvent, Station};
use clap::Parser;
use log::info;

#[derive(Parser)]
struct Args {
    #[arg(short = 'i', help = "Soundcard name for the receive path")]
    input: String,
    #[arg(short = 'o', help = "Soundcard name for the transmit path")]
    output: String,
    #[arg(short = 'c', value_parser = valid_callsign, help = "Your station callsign")]
    callsign: Callsign,
}

fn valid_callsign(s: &str) -> Result<Callsign, String> {
    Callsign::new(s).map_err(|e| e.to_string())
}

fn main() {
    env_logger::builder()
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .init();

    let args = Args::parse();
    let (station, events) = Station::start(&args.input, &args.output, args.callsign, EngineConfig::default())
        .expect("failed to start station");

    std::thread::spawn(move || {
        for event in events {
            match event {
                EngineEvent::TransmitActive(active) => info!("tx active: {active}"),
                EngineEvent::RxCallsign(callsign) => info!("heard {callsign}"),
                EngineEvent::RxPayload(payload) => info!("received {} byte payload", payload.len()),
                EngineEvent::RetransmitFailed => info!("retransmit request exhausted retries"),
            }
        }
    });

    println!("arq-station running. Commands: send <text> | retransmit | test | volume <0-100> | quit");
    let stdin = stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let mut parts = line.trim().splitn(2, ' ');
        match parts.next() {
            Some("send") => {
                if let Some(text) = parts.next() {
                    let _ = station.submit_payload(text.as_bytes().to_vec());
                }
            }
            Some("retransmit") => {
                let _ = station.submit_retransmit_request();
            }
            Some("test") => {
                let _ = station.submit_test_frame();
            }
            Some("volume") => {
                if let Some(value) = parts.next().and_then(|v| v.parse::<u8>().ok()) {
                    station.set_tx_volume(value);
                }
            }
            Some("quit") => break,
            _ => println!("unrecognised command"),
        }
    }

    let _ = station.stop();
}
