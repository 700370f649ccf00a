//! One-shot subcommands
//!
//! Each validates its operands before the port is opened, so a typo never
//! puts bytes on the wire.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use desuart_core::protocol::{
    encode_hex, list_ports, normalize_input, parse_hex_bytes, Block, Connection,
    ConnectionConfig, Key, Mode, Request,
};
use desuart_core::report::{RoundTripReport, SelfTestSummary};
use desuart_core::selftest;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_operands(block: &str, key: &str) -> Result<(Block, Key)> {
    let block = Block::from_hex(&normalize_input(block)).context("Invalid block")?;
    let key = Key::from_hex(&normalize_input(key)).context("Invalid key")?;
    Ok((block, key))
}

fn open(config: &ConnectionConfig) -> Result<Connection> {
    if config.port_name.is_empty() {
        bail!("No serial port given; pass --port or set \"port\" in the config file");
    }
    Connection::open(config.clone())
        .with_context(|| format!("Failed to connect to {}", config.port_name))
}

pub fn ports(json: bool) -> Result<()> {
    let ports = list_ports();
    if json {
        return print_json(&ports);
    }
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    println!("Available serial ports:");
    for port in &ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => {
                println!("  - {}: {} [{vid:04x}:{pid:04x}]", port.name, port.description)
            }
            _ => println!("  - {}: {}", port.name, port.description),
        }
    }
    Ok(())
}

pub fn transform(
    config: &ConnectionConfig,
    block: &str,
    key: &str,
    mode: Mode,
    json: bool,
) -> Result<()> {
    let (block, key) = parse_operands(block, key)?;
    let mut conn = open(config)?;
    let record = conn
        .exchange(Request::new(mode, block, key))
        .with_context(|| format!("{mode} failed"))?;

    if json {
        return print_json(&record);
    }
    let input = mode.input_label();
    let output = mode.output_label();
    println!("{input:<11} {}", record.input);
    println!("{:<11} {}", "key", record.key);
    println!("{output:<11} {}", record.output);
    Ok(())
}

fn print_round_trip(report: &RoundTripReport) {
    println!("Plaintext:  {}", report.plaintext);
    println!("Key:        {}", report.key);
    println!("Ciphertext: {}", report.ciphertext);
    println!("Decrypted:  {}", report.recovered);
    if let Some(expected) = report.expected_ciphertext {
        if report.ciphertext_matches() {
            println!("Ciphertext matches the reference value.");
        } else {
            println!("Ciphertext differs from the reference value {expected}.");
        }
    }
}

pub fn round_trip(config: &ConnectionConfig, block: &str, key: &str, json: bool) -> Result<()> {
    let (block, key) = parse_operands(block, key)?;
    let expected = (block == selftest::KNOWN_PLAINTEXT && key == selftest::KNOWN_KEY)
        .then_some(selftest::KNOWN_CIPHERTEXT);

    let mut conn = open(config)?;
    let report = selftest::round_trip(&mut conn, block, key, expected)
        .context("Round trip did not complete")?;

    if json {
        print_json(&report)?;
    } else {
        print_round_trip(&report);
    }
    if !report.passed() {
        bail!("Round trip failed");
    }
    if !json {
        println!("TEST PASSED! Plaintext recovered correctly.");
    }
    Ok(())
}

#[derive(Serialize)]
struct RawExchange {
    sent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    received: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<usize>,
}

pub fn send(config: &ConnectionConfig, data: &str, receive: Option<usize>, json: bool) -> Result<()> {
    let bytes = parse_hex_bytes(&normalize_input(data)).context("Invalid hex data")?;

    let mut conn = open(config)?;
    conn.send_raw(&bytes).context("Write failed")?;
    let received = match receive {
        Some(n) => Some(conn.receive_raw(n).context("Read failed")?),
        None => None,
    };

    if json {
        return print_json(&RawExchange {
            sent: encode_hex(&bytes),
            received: received.as_deref().map(encode_hex),
            expected: receive,
        });
    }

    println!("Sent {} bytes: {}", bytes.len(), encode_hex(&bytes));
    if let (Some(data), Some(n)) = (received, receive) {
        if data.is_empty() {
            println!("No response received");
        } else if data.len() < n {
            println!(
                "Timeout: expected {n} bytes, got {}: {}",
                data.len(),
                encode_hex(&data)
            );
        } else {
            println!("Received: {}", encode_hex(&data));
        }
    }
    Ok(())
}

fn print_summary(summary: &SelfTestSummary) {
    for report in &summary.reports {
        let verdict = if report.passed() { "PASS" } else { "FAIL" };
        println!(
            "{verdict}  {} / {} -> {} -> {}",
            report.plaintext, report.key, report.ciphertext, report.recovered
        );
    }
    for error in &summary.errors {
        println!("ERROR {error}");
    }
    println!(
        "{} of {} passed, {} failed, {} errors",
        summary.passed,
        summary.total(),
        summary.failed,
        summary.errors.len()
    );
}

pub fn selftest(config: &ConnectionConfig, count: usize, seed: Option<u64>, json: bool) -> Result<()> {
    let vectors = selftest::random_vectors(seed, count);
    let mut conn = open(config)?;
    let summary = selftest::run(&mut conn, &vectors);

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }
    if !summary.all_passed() {
        bail!("Self-test failed");
    }
    Ok(())
}
