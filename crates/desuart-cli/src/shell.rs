//! Interactive menu
//!
//! Reads choices and hex operands line by line, drives the connection and
//! prints results. Input and output are generic so the whole menu can be
//! scripted in tests.

use std::io::{self, BufRead, Write};

use desuart_core::protocol::{
    encode_hex, normalize_input, parse_hex_bytes, Connection, ConnectionConfig, Mode, PortInfo,
    ProtocolError, Transport, DEFAULT_BAUD_RATE, HEX_LEN,
};
use desuart_core::selftest;

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Opens a connection for the given settings
pub type Connector<'a, T> =
    Box<dyn FnMut(&ConnectionConfig) -> Result<Connection<T>, ProtocolError> + 'a>;

/// Enumerates serial ports
pub type PortLister<'a> = Box<dyn Fn() -> Vec<PortInfo> + 'a>;

/// The interactive test menu
pub struct Shell<'a, R, W, T: Transport> {
    input: R,
    output: W,
    connect: Connector<'a, T>,
    list_ports: PortLister<'a>,
    conn: Option<Connection<T>>,
    config: ConnectionConfig,
}

impl<'a, R: BufRead, W: Write, T: Transport> Shell<'a, R, W, T> {
    pub fn new(
        input: R,
        output: W,
        config: ConnectionConfig,
        connect: Connector<'a, T>,
        list_ports: PortLister<'a>,
    ) -> Self {
        Self {
            input,
            output,
            connect,
            list_ports,
            conn: None,
            config,
        }
    }

    /// Consume the shell and hand back the output sink
    pub fn into_output(self) -> W {
        self.output
    }

    /// Pick a port if none was configured, connect, then run the menu until
    /// the user exits or input ends
    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "{RULE}")?;
        writeln!(self.output, "DES UART Interactive Test Tool")?;
        writeln!(self.output, "{RULE}")?;

        if self.config.port_name.is_empty() {
            match self.choose_port()? {
                Some(port) => self.config.port_name = port,
                None => {
                    writeln!(self.output, "No port specified. Exiting.")?;
                    return Ok(());
                }
            }
        }

        let config = self.config.clone();
        if !self.reconnect(&config)? {
            writeln!(self.output, "Failed to connect to board. Exiting.")?;
            return Ok(());
        }

        let result = self.menu_loop();
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        result
    }

    fn menu_loop(&mut self) -> io::Result<()> {
        loop {
            self.print_menu()?;
            let Some(choice) = self.prompt("Enter choice: ")? else {
                return Ok(());
            };

            let keep_going = match choice.as_str() {
                "0" => {
                    writeln!(self.output, "Exiting...")?;
                    return Ok(());
                }
                "1" => self.transform_action(Mode::Encrypt)?,
                "2" => self.transform_action(Mode::Decrypt)?,
                "3" => self.round_trip_action()?,
                "4" => self.custom_data_action()?,
                "5" => self.settings_action()?,
                "6" => {
                    self.print_ports()?;
                    true
                }
                _ => {
                    writeln!(self.output, "Invalid choice. Please try again.")?;
                    true
                }
            };
            if !keep_going || self.prompt("\nPress Enter to continue...")?.is_none() {
                return Ok(());
            }
        }
    }

    fn print_menu(&mut self) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{RULE}")?;
        writeln!(self.output, "DES UART Test Menu")?;
        writeln!(self.output, "{RULE}")?;
        writeln!(self.output, "1. Encrypt plaintext")?;
        writeln!(self.output, "2. Decrypt ciphertext")?;
        writeln!(self.output, "3. Run encryption + decryption test")?;
        writeln!(self.output, "4. Send custom hex data")?;
        writeln!(self.output, "5. Change serial port settings")?;
        writeln!(self.output, "6. List serial ports")?;
        writeln!(self.output, "0. Exit")?;
        writeln!(self.output, "{RULE}")
    }

    fn section(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{THIN_RULE}")?;
        writeln!(self.output, "{title}")?;
        writeln!(self.output, "{THIN_RULE}")
    }

    /// Print `text`, read one line. `None` at end of input.
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompt until the user types exactly 16 hex characters
    fn prompt_hex(&mut self, text: &str) -> io::Result<Option<String>> {
        loop {
            let Some(raw) = self.prompt(text)? else {
                return Ok(None);
            };
            let value = normalize_input(&raw);
            if value.len() == HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(Some(value));
            }
            writeln!(
                self.output,
                "Invalid input. Please enter exactly {HEX_LEN} hex characters (0-9, A-F)"
            )?;
        }
    }

    fn choose_port(&mut self) -> io::Result<Option<String>> {
        let ports = self.print_ports()?;
        let answer = match ports.first() {
            Some(first) => {
                let default = first.name.clone();
                self.prompt(&format!("\nEnter serial port [{default}]: "))?
                    .map(|p| if p.is_empty() { default } else { p })
            }
            None => self.prompt("\nNo ports detected. Enter port manually (e.g., COM3): ")?,
        };
        Ok(answer.filter(|p| !p.is_empty()))
    }

    fn print_ports(&mut self) -> io::Result<Vec<PortInfo>> {
        let ports = (self.list_ports)();
        if ports.is_empty() {
            writeln!(self.output, "\nNo serial ports found")?;
        } else {
            writeln!(self.output, "\nAvailable serial ports:")?;
            for port in &ports {
                writeln!(self.output, "  - {}: {}", port.name, port.description)?;
            }
        }
        Ok(ports)
    }

    /// Replace the current connection. Returns whether the new one is up.
    fn reconnect(&mut self, config: &ConnectionConfig) -> io::Result<bool> {
        if let Some(mut old) = self.conn.take() {
            old.close();
            writeln!(self.output, "Disconnected from {}", old.config().port_name)?;
        }
        match (self.connect)(config) {
            Ok(conn) => {
                writeln!(
                    self.output,
                    "Connected to {} at {} baud",
                    config.port_name, config.baud_rate
                )?;
                self.conn = Some(conn);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(port = %config.port_name, "connect failed: {e}");
                writeln!(self.output, "Error connecting to {}: {e}", config.port_name)?;
                Ok(false)
            }
        }
    }

    /// Run one exchange, printing the outcome. `None` if it failed.
    fn run_transform(&mut self, block: &str, key: &str, mode: Mode) -> io::Result<Option<String>> {
        let Some(conn) = self.conn.as_mut() else {
            writeln!(self.output, "Serial port not open")?;
            return Ok(None);
        };
        match conn.transform(block, key, mode) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                writeln!(self.output, "\n{} failed: {e}", capitalize(&mode.to_string()))?;
                Ok(None)
            }
        }
    }

    fn transform_action(&mut self, mode: Mode) -> io::Result<bool> {
        let title = match mode {
            Mode::Encrypt => "DES Encryption Test",
            Mode::Decrypt => "DES Decryption Test",
        };
        self.section(title)?;

        let input_label = mode.input_label();
        let Some(block) = self.prompt_hex(&format!("Enter {input_label} (16 hex chars): "))? else {
            return Ok(false);
        };
        let Some(key) = self.prompt_hex("Enter key (16 hex chars): ")? else {
            return Ok(false);
        };

        writeln!(self.output, "\n{:<11} {block}", format!("{}:", capitalize(input_label)))?;
        writeln!(self.output, "{:<11} {key}", "Key:")?;

        if let Some(result) = self.run_transform(&block, &key, mode)? {
            let output_label = capitalize(mode.output_label());
            writeln!(self.output, "\n{} Result:", capitalize(&mode.to_string()))?;
            writeln!(self.output, "  {output_label}: {result}")?;
        }
        Ok(true)
    }

    fn round_trip_action(&mut self) -> io::Result<bool> {
        self.section("Full DES Encryption/Decryption Test")?;

        let Some(plaintext) = self.prompt_hex("Enter plaintext (16 hex chars): ")? else {
            return Ok(false);
        };
        let Some(key) = self.prompt_hex("Enter key (16 hex chars): ")? else {
            return Ok(false);
        };

        writeln!(self.output, "\n{RULE}\nStep 1: Encryption\n{RULE}")?;
        writeln!(self.output, "Plaintext:  {plaintext}\nKey:        {key}")?;
        let Some(ciphertext) = self.run_transform(&plaintext, &key, Mode::Encrypt)? else {
            writeln!(self.output, "Test aborted.")?;
            return Ok(true);
        };
        writeln!(self.output, "\nCiphertext: {ciphertext}")?;

        if self
            .prompt("\nPress Enter to continue with decryption...")?
            .is_none()
        {
            return Ok(false);
        }

        writeln!(self.output, "\n{RULE}\nStep 2: Decryption\n{RULE}")?;
        writeln!(self.output, "Ciphertext: {ciphertext}\nKey:        {key}")?;
        let Some(decrypted) = self.run_transform(&ciphertext, &key, Mode::Decrypt)? else {
            writeln!(self.output, "Test aborted.")?;
            return Ok(true);
        };
        writeln!(self.output, "\nDecrypted:  {decrypted}")?;

        writeln!(self.output, "\n{RULE}\nVerification\n{RULE}")?;
        writeln!(self.output, "Original:  {plaintext}\nDecrypted: {decrypted}")?;
        if decrypted == plaintext {
            writeln!(self.output, "\nTEST PASSED! Plaintext recovered correctly.")?;
        } else {
            writeln!(self.output, "\nTEST FAILED! Plaintext mismatch.")?;
        }

        // The worked example has a published ciphertext worth checking too
        if plaintext == selftest::KNOWN_PLAINTEXT.to_hex() && key == selftest::KNOWN_KEY.to_hex() {
            if ciphertext == selftest::KNOWN_CIPHERTEXT.to_hex() {
                writeln!(self.output, "Ciphertext matches the reference value.")?;
            } else {
                writeln!(
                    self.output,
                    "Ciphertext differs from the reference value {}.",
                    selftest::KNOWN_CIPHERTEXT
                )?;
            }
        }
        Ok(true)
    }

    fn custom_data_action(&mut self) -> io::Result<bool> {
        self.section("Send Custom Hex Data")?;

        let Some(raw) = self.prompt("Enter hex data (even number of chars): ")? else {
            return Ok(false);
        };
        let bytes = match parse_hex_bytes(&normalize_input(&raw)) {
            Ok(bytes) => bytes,
            Err(e) => {
                writeln!(self.output, "Invalid hex data: {e}")?;
                return Ok(true);
            }
        };

        let Some(conn) = self.conn.as_mut() else {
            writeln!(self.output, "Serial port not open")?;
            return Ok(true);
        };
        if let Err(e) = conn.send_raw(&bytes) {
            writeln!(self.output, "Error: {e}")?;
            return Ok(true);
        }
        writeln!(
            self.output,
            "Sent {} bytes: {}",
            bytes.len(),
            encode_hex(&bytes)
        )?;

        let Some(answer) = self.prompt("\nReceive response? (y/n): ")? else {
            return Ok(false);
        };
        if !answer.eq_ignore_ascii_case("y") {
            return Ok(true);
        }

        let Some(count) = self.prompt("Number of bytes to receive: ")? else {
            return Ok(false);
        };
        let count: usize = match count.parse() {
            Ok(n) => n,
            Err(_) => {
                writeln!(self.output, "Error: '{count}' is not a byte count")?;
                return Ok(true);
            }
        };

        let Some(conn) = self.conn.as_mut() else {
            return Ok(true);
        };
        match conn.receive_raw(count) {
            Ok(data) if data.is_empty() => writeln!(self.output, "No response received")?,
            Ok(data) if data.len() < count => writeln!(
                self.output,
                "Timeout: expected {count} bytes, got {}: {}",
                data.len(),
                encode_hex(&data)
            )?,
            Ok(data) => writeln!(self.output, "Received: {}", encode_hex(&data))?,
            Err(e) => writeln!(self.output, "Error: {e}")?,
        }
        Ok(true)
    }

    fn settings_action(&mut self) -> io::Result<bool> {
        self.section("Current settings will be applied on reconnect")?;

        let Some(port) = self.prompt("Enter serial port (e.g., COM3): ")? else {
            return Ok(false);
        };
        let Some(baud) = self.prompt(&format!("Enter baud rate (default: {DEFAULT_BAUD_RATE}): "))?
        else {
            return Ok(false);
        };

        let baud_rate = if baud.is_empty() {
            DEFAULT_BAUD_RATE
        } else {
            match baud.parse::<u32>() {
                Ok(rate) if rate > 0 => rate,
                _ => {
                    writeln!(
                        self.output,
                        "Invalid baud rate. Using default {DEFAULT_BAUD_RATE}."
                    )?;
                    DEFAULT_BAUD_RATE
                }
            }
        };

        let mut config = self.config.clone();
        if !port.is_empty() {
            config.port_name = port;
        }
        config.baud_rate = baud_rate;
        self.config = config.clone();
        self.reconnect(&config)?;
        Ok(true)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desuart_core::protocol::mock::ScriptedTransport;
    use desuart_core::protocol::Pacing;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::io::Cursor;

    const CIPHERTEXT: [u8; 8] = [0x85, 0xE8, 0x13, 0x54, 0x0F, 0x0A, 0xB4, 0x05];
    const PLAINTEXT: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];

    fn config(port: &str) -> ConnectionConfig {
        ConnectionConfig {
            pacing: Pacing::none(),
            ..ConnectionConfig::for_port(port)
        }
    }

    fn no_ports() -> PortLister<'static> {
        Box::new(Vec::new)
    }

    /// Run a scripted session against a board that answers with `replies`
    fn session(script: &str, replies: Vec<Vec<u8>>) -> String {
        let connect: Connector<'_, ScriptedTransport> = Box::new(move |config: &ConnectionConfig| {
            Ok(Connection::with_transport(
                config.clone(),
                ScriptedTransport::with_replies(replies.clone()),
            ))
        });
        let mut shell = Shell::new(
            Cursor::new(script.to_string()),
            Vec::new(),
            config("mock"),
            connect,
            no_ports(),
        );
        shell.run().unwrap();
        String::from_utf8(shell.into_output()).unwrap()
    }

    #[test]
    fn test_encrypt_from_menu() {
        let out = session(
            "1\n0x01 23 45 67 89 ab cd ef\n133457799BBCDFF1\n\n0\n",
            vec![CIPHERTEXT.to_vec()],
        );
        assert!(out.contains("Connected to mock at 115200 baud"));
        assert!(out.contains("Plaintext:  0123456789ABCDEF"));
        assert!(out.contains("Ciphertext: 85E813540F0AB405"));
        assert!(out.contains("Exiting..."));
    }

    #[test]
    fn test_bad_hex_is_reprompted() {
        let out = session(
            "2\n85E8\n85E813540F0AB405\n133457799BBCDFF1\n\n0\n",
            vec![PLAINTEXT.to_vec()],
        );
        assert!(out.contains("Invalid input. Please enter exactly 16 hex characters"));
        assert!(out.contains("Plaintext: 0123456789ABCDEF"));
    }

    #[test]
    fn test_round_trip_from_menu() {
        let out = session(
            "3\n0123456789ABCDEF\n133457799BBCDFF1\n\n\n0\n",
            vec![CIPHERTEXT.to_vec(), PLAINTEXT.to_vec()],
        );
        assert!(out.contains("TEST PASSED!"));
        assert!(out.contains("Ciphertext matches the reference value."));
    }

    #[test]
    fn test_timeout_is_reported() {
        let out = session(
            "1\n0123456789ABCDEF\n133457799BBCDFF1\n\n0\n",
            vec![vec![0x85, 0xE8]],
        );
        assert!(out.contains("Encrypt failed: Timeout: expected 8 bytes, got 2"));
    }

    #[test]
    fn test_custom_data() {
        let out = session("4\n01 02 0x03\ny\n2\n\n0\n", vec![vec![0xAA, 0xBB]]);
        assert!(out.contains("Sent 3 bytes: 010203"));
        assert!(out.contains("Received: AABB"));

        let out = session("4\n012\n\n0\n", vec![]);
        assert!(out.contains("Invalid hex data"));
    }

    #[test]
    fn test_change_settings_reconnects() {
        let seen = RefCell::new(Vec::new());
        let connect: Connector<'_, ScriptedTransport> = Box::new(|config: &ConnectionConfig| {
            seen.borrow_mut().push(config.clone());
            Ok(Connection::with_transport(
                config.clone(),
                ScriptedTransport::new(),
            ))
        });
        let mut shell = Shell::new(
            Cursor::new("5\nCOM9\nfast\n\n0\n".to_string()),
            Vec::new(),
            config("COM3"),
            connect,
            no_ports(),
        );
        shell.run().unwrap();
        let out = String::from_utf8(shell.into_output()).unwrap();

        assert!(out.contains("Invalid baud rate. Using default 115200."));
        assert!(out.contains("Disconnected from COM3"));
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].port_name, "COM9");
        assert_eq!(seen[1].baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn test_picks_first_listed_port() {
        let seen = RefCell::new(None);
        let connect: Connector<'_, ScriptedTransport> = Box::new(|config: &ConnectionConfig| {
            *seen.borrow_mut() = Some(config.port_name.clone());
            Ok(Connection::with_transport(config.clone(), ScriptedTransport::new()))
        });
        let lister: PortLister<'_> = Box::new(|| {
            vec![PortInfo {
                name: "/dev/ttyACM0".into(),
                description: "DE2 UART".into(),
                vid: None,
                pid: None,
                manufacturer: None,
                serial_number: None,
            }]
        });
        let mut shell = Shell::new(
            Cursor::new("\n0\n".to_string()),
            Vec::new(),
            config(""),
            connect,
            lister,
        );
        shell.run().unwrap();
        let out = String::from_utf8(shell.into_output()).unwrap();
        assert!(out.contains("  - /dev/ttyACM0: DE2 UART"));
        assert_eq!(seen.into_inner().as_deref(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_no_port_exits() {
        let connect: Connector<'_, ScriptedTransport> =
            Box::new(|_: &ConnectionConfig| Err(ProtocolError::NotConnected));
        let mut shell = Shell::new(
            Cursor::new("\n".to_string()),
            Vec::new(),
            config(""),
            connect,
            no_ports(),
        );
        shell.run().unwrap();
        let out = String::from_utf8(shell.into_output()).unwrap();
        assert!(out.contains("No serial ports found"));
        assert!(out.contains("No port specified. Exiting."));
    }

    #[test]
    fn test_connect_failure_exits() {
        let connect: Connector<'_, ScriptedTransport> = Box::new(|config: &ConnectionConfig| {
            Err(ProtocolError::PortNotFound(config.port_name.clone()))
        });
        let mut shell = Shell::new(
            Cursor::new("1\n".to_string()),
            Vec::new(),
            config("/dev/ttyUSB7"),
            connect,
            no_ports(),
        );
        shell.run().unwrap();
        let out = String::from_utf8(shell.into_output()).unwrap();
        assert!(out.contains("Error connecting to /dev/ttyUSB7: Port not found"));
        assert!(out.contains("Failed to connect to board. Exiting."));
        assert!(!out.contains("DES UART Test Menu"));
    }
}
