//! Exchange records and test reports
//!
//! Plain serializable results, suitable for printing or emitting as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{Block, Key, Mode};

/// One completed request/response exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    /// Operation requested
    pub mode: Mode,
    /// Block sent to the board
    pub input: Block,
    /// Key sent to the board
    pub key: Key,
    /// Block returned by the board
    pub output: Block,
    /// When the request started
    pub started_at: DateTime<Utc>,
    /// Time from the first write to the last byte read
    pub elapsed_ms: u64,
}

/// Encrypt followed by decrypt of the same block under the same key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTripReport {
    /// Block that was encrypted
    pub plaintext: Block,
    /// Key used both ways
    pub key: Key,
    /// What the board returned for the encrypt
    pub ciphertext: Block,
    /// What the board returned for the decrypt
    pub recovered: Block,
    /// Set when a known ciphertext was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_ciphertext: Option<Block>,
}

impl RoundTripReport {
    /// The board gave back the original plaintext
    pub fn recovered_plaintext(&self) -> bool {
        self.recovered == self.plaintext
    }

    /// Ciphertext matched the expected value, when there was one
    pub fn ciphertext_matches(&self) -> bool {
        self.expected_ciphertext
            .map_or(true, |expected| expected == self.ciphertext)
    }

    /// Both checks held
    pub fn passed(&self) -> bool {
        self.recovered_plaintext() && self.ciphertext_matches()
    }
}

/// Outcome of a batch of round trips
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestSummary {
    /// Round trips that passed
    pub passed: usize,
    /// Round trips that completed with a wrong result
    pub failed: usize,
    /// Round trips that could not complete (timeouts, write failures)
    pub errors: Vec<String>,
    /// Every completed round trip, in order
    pub reports: Vec<RoundTripReport>,
}

impl SelfTestSummary {
    /// Round trips attempted
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errors.len()
    }

    /// At least one round trip ran and nothing went wrong
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors.is_empty() && self.passed > 0
    }

    /// Fold one round trip into the summary
    pub fn record(&mut self, report: RoundTripReport) {
        if report.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.reports.push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(recovered: u64, expected: Option<u64>) -> RoundTripReport {
        RoundTripReport {
            plaintext: Block::from_u64(0x0123_4567_89AB_CDEF),
            key: Key::from_u64(0x1334_5779_9BBC_DFF1),
            ciphertext: Block::from_u64(0x85E8_1354_0F0A_B405),
            recovered: Block::from_u64(recovered),
            expected_ciphertext: expected.map(Block::from_u64),
        }
    }

    #[test]
    fn test_round_trip_verdict() {
        assert!(report(0x0123_4567_89AB_CDEF, None).passed());
        assert!(report(0x0123_4567_89AB_CDEF, Some(0x85E8_1354_0F0A_B405)).passed());
        assert!(!report(0x0123_4567_89AB_CDEF, Some(0)).passed());
        assert!(!report(0, None).passed());
    }

    #[test]
    fn test_summary() {
        let mut summary = SelfTestSummary::default();
        assert!(!summary.all_passed());
        summary.record(report(0x0123_4567_89AB_CDEF, None));
        assert!(summary.all_passed());
        summary.record(report(1, None));
        summary.errors.push("Timeout: expected 8 bytes, got 0".into());
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_report_json_uses_hex() {
        let json = serde_json::to_value(report(0x0123_4567_89AB_CDEF, None)).unwrap();
        assert_eq!(json["ciphertext"], "85E813540F0AB405");
        assert!(json.get("expected_ciphertext").is_none());
    }
}
