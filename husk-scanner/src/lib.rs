//! Constant scanner over module data segments.
//!
//! Two heuristics run over the raw payload bytes of every data segment:
//! printable-text run extraction ([`strings`]) and a sliding-window
//! Shannon-entropy scan ([`entropy`]) that flags key-like byte windows.
//! Both are pure functions of the payloads; nothing else in the module is
//! consulted.
//!
//! The output is a signal for a human analyst, not a proof of anything:
//! the entropy threshold is tuned to reject ASCII text and repetitive
//! padding while accepting keys, hashes, and ciphertext.

#![forbid(unsafe_code)]

use husk_format::DataSegment;

pub mod entropy;
pub mod strings;

pub use entropy::EntropyWindow;
pub use strings::ExtractedString;

/// Combined scanner output.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Printable-text runs of length >= 4.
    pub strings: Vec<ExtractedString>,
    /// High-entropy windows, deduplicated and sorted by descending
    /// entropy.
    pub entropy_candidates: Vec<EntropyWindow>,
}

/// Scan every data segment for embedded text and key-like constants.
pub fn scan(segments: &[DataSegment]) -> ScanReport {
    let mut report = ScanReport {
        strings: Vec::new(),
        entropy_candidates: Vec::new(),
    };

    for segment in segments {
        strings::extract_into(segment, &mut report.strings);
        entropy::scan_into(segment, &mut report.entropy_candidates);
    }

    entropy::dedup_and_rank(&mut report.entropy_candidates);
    log::debug!(
        "scanned {} segments: {} strings, {} entropy candidates",
        segments.len(),
        report.strings.len(),
        report.entropy_candidates.len()
    );
    report
}
