//! Printable-text run extraction.

use husk_format::DataSegment;

/// Minimum run length worth reporting.
const MIN_RUN_LEN: usize = 4;

/// Printable ASCII range, inclusive.
const PRINTABLE_LOW: u8 = 0x20;
const PRINTABLE_HIGH: u8 = 0x7E;

/// A maximal printable-ASCII run found in a data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedString {
    /// Placement in linear memory: the segment's init offset plus the
    /// run's local offset. `None` for passive segments, whose placement
    /// is unknown until a runtime initializes them.
    pub absolute_offset: Option<u64>,
    /// The run text.
    pub text: String,
}

fn is_printable(byte: u8) -> bool {
    (PRINTABLE_LOW..=PRINTABLE_HIGH).contains(&byte)
}

/// Extract every printable run of length >= 4 from one segment.
pub fn extract_into(segment: &DataSegment, out: &mut Vec<ExtractedString>) {
    let mut run_start: Option<usize> = None;

    for (i, &byte) in segment.payload.iter().enumerate() {
        if is_printable(byte) {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            emit(segment, start, i, out);
        }
    }

    if let Some(start) = run_start {
        emit(segment, start, segment.payload.len(), out);
    }
}

fn emit(segment: &DataSegment, start: usize, end: usize, out: &mut Vec<ExtractedString>) {
    if end - start < MIN_RUN_LEN {
        return;
    }
    // The run is pure printable ASCII, so this cannot fail
    let text = String::from_utf8_lossy(&segment.payload[start..end]).into_owned();
    out.push(ExtractedString {
        absolute_offset: segment
            .init_offset
            .map(|base| u64::from(base) + start as u64),
        text,
    });
}
