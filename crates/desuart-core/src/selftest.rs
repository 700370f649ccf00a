//! Board self-test
//!
//! Drives encrypt/decrypt round trips through a [`Connection`] and checks
//! that the board hands back what went in. The DES arithmetic itself is
//! never done on the host; only the published FIPS 46 worked example is
//! known ahead of time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::protocol::{Block, Connection, Key, Mode, ProtocolError, Transport};
use crate::report::{RoundTripReport, SelfTestSummary};

/// Plaintext of the classic DES worked example
pub const KNOWN_PLAINTEXT: Block = Block::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);

/// Key of the classic DES worked example
pub const KNOWN_KEY: Key = Key::new([0x13, 0x34, 0x57, 0x79, 0x9B, 0xBC, 0xDF, 0xF1]);

/// Ciphertext of [`KNOWN_PLAINTEXT`] under [`KNOWN_KEY`]
pub const KNOWN_CIPHERTEXT: Block = Block::new([0x85, 0xE8, 0x13, 0x54, 0x0F, 0x0A, 0xB4, 0x05]);

/// Encrypt `plaintext`, decrypt the result, and report both halves
pub fn round_trip<T: Transport>(
    conn: &mut Connection<T>,
    plaintext: Block,
    key: Key,
    expected_ciphertext: Option<Block>,
) -> Result<RoundTripReport, ProtocolError> {
    let ciphertext = conn.transform_block(plaintext, key, Mode::Encrypt)?;
    let recovered = conn.transform_block(ciphertext, key, Mode::Decrypt)?;

    let report = RoundTripReport {
        plaintext,
        key,
        ciphertext,
        recovered,
        expected_ciphertext,
    };
    if report.passed() {
        tracing::debug!(%plaintext, %key, %ciphertext, "round trip passed");
    } else {
        tracing::warn!(%plaintext, %key, %ciphertext, %recovered, "round trip failed");
    }
    Ok(report)
}

/// Round trip of the worked example, checking the ciphertext too
pub fn known_answer<T: Transport>(
    conn: &mut Connection<T>,
) -> Result<RoundTripReport, ProtocolError> {
    round_trip(conn, KNOWN_PLAINTEXT, KNOWN_KEY, Some(KNOWN_CIPHERTEXT))
}

/// Random block/key pairs. The same seed always yields the same pairs.
pub fn random_vectors(seed: Option<u64>, count: usize) -> Vec<(Block, Key)> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..count)
        .map(|_| (Block::from_u64(rng.gen()), Key::from_u64(rng.gen())))
        .collect()
}

/// Run the known-answer test followed by `vectors`.
///
/// An exchange that fails is recorded and the run moves on; the next
/// request flushes whatever the failed one left behind.
pub fn run<T: Transport>(conn: &mut Connection<T>, vectors: &[(Block, Key)]) -> SelfTestSummary {
    let mut summary = SelfTestSummary::default();

    let known = known_answer(conn);
    if tally(&mut summary, KNOWN_PLAINTEXT, KNOWN_KEY, known) {
        for &(block, key) in vectors {
            let outcome = round_trip(conn, block, key, None);
            if !tally(&mut summary, block, key, outcome) {
                break;
            }
        }
    }

    tracing::info!(
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors.len(),
        "self-test finished"
    );
    summary
}

/// Fold one outcome into `summary`. False once the session is gone.
fn tally(
    summary: &mut SelfTestSummary,
    block: Block,
    key: Key,
    outcome: Result<RoundTripReport, ProtocolError>,
) -> bool {
    match outcome {
        Ok(report) => summary.record(report),
        Err(ProtocolError::NotConnected) => {
            summary.errors.push(ProtocolError::NotConnected.to_string());
            return false;
        }
        Err(e) => {
            tracing::warn!(%block, %key, "round trip aborted: {e}");
            summary.errors.push(format!("{block}/{key}: {e}"));
        }
    }
    true
}
