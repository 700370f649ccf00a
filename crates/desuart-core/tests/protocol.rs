use desuart_core::protocol::mock::{ScriptedTransport, TransportEvent};
use desuart_core::protocol::{
    Block, Connection, ConnectionConfig, ConnectionState, ErrorKind, ExchangePhase, Key, Mode,
    Pacing, ProtocolError, Transport,
};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

const PLAINTEXT: &str = "0123456789ABCDEF";
const KEY: &str = "133457799BBCDFF1";
const CIPHERTEXT: [u8; 8] = [0x85, 0xE8, 0x13, 0x54, 0x0F, 0x0A, 0xB4, 0x05];

fn config() -> ConnectionConfig {
    ConnectionConfig {
        pacing: Pacing::none(),
        ..ConnectionConfig::for_port("mock")
    }
}

fn connection(replies: Vec<Vec<u8>>) -> Connection<ScriptedTransport> {
    Connection::with_transport(config(), ScriptedTransport::with_replies(replies))
}

#[test]
fn test_hex_roundtrip() {
    let samples = [
        0u64,
        u64::MAX,
        0x0123_4567_89AB_CDEF,
        0x8000_0000_0000_0001,
        0x00FF_00FF_00FF_00FF,
    ];
    for value in samples {
        let block = Block::from_u64(value);
        assert_eq!(Block::from_hex(&block.to_hex()).unwrap(), block);
        let key = Key::from_u64(value);
        assert_eq!(Key::from_hex(&key.to_hex()).unwrap(), key);
        assert_eq!(block.to_hex().len(), 16);
    }
}

#[test]
fn test_encrypt_writes_known_frame() {
    let mut conn = connection(vec![CIPHERTEXT.to_vec()]);
    let result = conn.encrypt(PLAINTEXT, KEY).unwrap();
    assert_eq!(result, "85E813540F0AB405");
    assert_eq!(
        conn.transport().written(),
        vec![
            0x01, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x13, 0x34, 0x57, 0x79, 0x9B,
            0xBC, 0xDF, 0xF1
        ]
    );
}

#[test]
fn test_decrypt_uses_mode_two() {
    let mut conn = connection(vec![hex_bytes(PLAINTEXT)]);
    let result = conn.decrypt("85E813540F0AB405", KEY).unwrap();
    assert_eq!(result, PLAINTEXT);
    assert_eq!(conn.transport().written()[0], 0x02);
}

#[test]
fn test_short_read_is_timeout() {
    let mut conn = connection(vec![vec![0x85, 0xE8, 0x13]]);
    let err = conn.encrypt(PLAINTEXT, KEY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(matches!(
        err,
        ProtocolError::Timeout {
            expected: 8,
            received: 3
        }
    ));
    assert_eq!(conn.phase(), ExchangePhase::TimedOut);
    // Still connected; the caller may simply try again
    assert_eq!(conn.state(), ConnectionState::Connected);
}

#[test]
fn test_no_response_is_timeout() {
    let mut conn = connection(vec![]);
    let err = conn.transform(PLAINTEXT, KEY, Mode::Encrypt).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Timeout {
            expected: 8,
            received: 0
        }
    ));
}

#[test]
fn test_bad_lengths_send_nothing() {
    let cases = [
        ("0123456789ABCDE", KEY),
        ("0123456789ABCDEF0", KEY),
        (PLAINTEXT, "133457799BBCDFF"),
        (PLAINTEXT, "133457799BBCDFF10"),
        ("0123456789ABCDEX", KEY),
    ];
    for (block, key) in cases {
        let mut conn = connection(vec![CIPHERTEXT.to_vec()]);
        let err = conn.encrypt(block, key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{block} / {key}");
        assert!(conn.transport().events().is_empty(), "{block} / {key}");
        assert_eq!(conn.phase(), ExchangePhase::Idle);
    }
}

#[test]
fn test_stale_bytes_are_flushed() {
    let transport =
        ScriptedTransport::with_replies([CIPHERTEXT.to_vec()]).with_stale_input(&[0xEE; 5]);
    let mut conn = Connection::with_transport(config(), transport);
    assert_eq!(conn.encrypt(PLAINTEXT, KEY).unwrap(), "85E813540F0AB405");
}

#[test]
fn test_recovers_after_timeout() {
    let mut conn = connection(vec![vec![0x11; 4], CIPHERTEXT.to_vec()]);
    assert!(conn.encrypt(PLAINTEXT, KEY).is_err());
    assert_eq!(conn.encrypt(PLAINTEXT, KEY).unwrap(), "85E813540F0AB405");

    let flushes = conn
        .transport()
        .events()
        .iter()
        .filter(|e| **e == TransportEvent::Flush)
        .count();
    assert_eq!(flushes, 2);
}

#[test]
fn test_round_trip_is_passed_through_untouched() {
    let mut conn = connection(vec![CIPHERTEXT.to_vec(), hex_bytes(PLAINTEXT)]);
    let ciphertext = conn.encrypt(PLAINTEXT, KEY).unwrap();
    let recovered = conn.decrypt(&ciphertext, KEY).unwrap();
    assert_eq!(recovered, PLAINTEXT);

    let written = conn.transport().written();
    assert_eq!(&written[18..26], &CIPHERTEXT);
}

#[test]
fn test_close_is_idempotent() {
    let mut never_opened = Connection::disconnected(ConnectionConfig::for_port("/dev/ttyUSB0"));
    never_opened.close();
    never_opened.close();
    assert_eq!(never_opened.state(), ConnectionState::Disconnected);

    let mut conn = connection(vec![]);
    conn.close();
    conn.close();
    assert!(!conn.transport().is_open());
    assert_eq!(
        conn.transport().events(),
        &[TransportEvent::Close],
        "close should reach the transport once"
    );
}

#[test]
fn test_exchange_after_close_fails() {
    let mut conn = connection(vec![CIPHERTEXT.to_vec()]);
    conn.close();
    let err = conn.encrypt(PLAINTEXT, KEY).unwrap_err();
    assert!(matches!(err, ProtocolError::NotConnected));
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_exchange_record() {
    let mut conn = connection(vec![CIPHERTEXT.to_vec()]);
    let request = desuart_core::protocol::Request::from_hex(Mode::Encrypt, PLAINTEXT, KEY).unwrap();
    let record = conn.exchange(request).unwrap();
    assert_eq!(record.mode, Mode::Encrypt);
    assert_eq!(record.input.to_hex(), PLAINTEXT);
    assert_eq!(record.key.to_hex(), KEY);
    assert_eq!(record.output.as_bytes(), &CIPHERTEXT);
}

#[test]
fn test_pacing_adds_delays() {
    let config = ConnectionConfig {
        pacing: Pacing {
            settle_delay_ms: 0,
            inter_write_delay_ms: 20,
            processing_delay_ms: 40,
        },
        ..ConnectionConfig::for_port("mock")
    };
    let mut conn =
        Connection::with_transport(config, ScriptedTransport::with_replies([CIPHERTEXT.to_vec()]));
    let request = desuart_core::protocol::Request::from_hex(Mode::Encrypt, PLAINTEXT, KEY).unwrap();

    let start = Instant::now();
    let record = conn.exchange(request).unwrap();
    // three writes at 20 ms each, then 40 ms before the read
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(record.elapsed_ms >= 100, "elapsed_ms = {}", record.elapsed_ms);
}

#[test]
fn test_no_pacing_is_immediate() {
    let mut conn = connection(vec![CIPHERTEXT.to_vec()]);
    let start = Instant::now();
    conn.encrypt(PLAINTEXT, KEY).unwrap();
    assert!(start.elapsed() < Duration::from_millis(50));
}

fn hex_bytes(s: &str) -> Vec<u8> {
    Block::from_hex(s).unwrap().as_bytes().to_vec()
}
