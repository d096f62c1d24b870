//! Sliding-window Shannon entropy scan.

use husk_format::DataSegment;

/// Window size in bytes.
pub const WINDOW_LEN: usize = 32;

/// Entropy flag threshold in bits. The comparison is strict, so a window
/// of exactly 16 distinct byte values appearing twice each (4.0 bits) is
/// not flagged.
pub const ENTROPY_THRESHOLD_BITS: f64 = 4.0;

/// Distinct-byte flag threshold. Strict comparison.
pub const DISTINCT_THRESHOLD: usize = 16;

/// A flagged high-entropy window.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyWindow {
    /// Placement in linear memory; `None` for windows seen only in
    /// passive segments.
    pub absolute_offset: Option<u64>,
    /// The window bytes.
    pub window_bytes: Vec<u8>,
    /// Shannon entropy of the window, in bits.
    pub entropy_bits: f64,
    /// Number of distinct byte values in the window.
    pub distinct_byte_count: usize,
}

impl EntropyWindow {
    /// Window bytes rendered as lowercase hex.
    pub fn hex(&self) -> String {
        hex::encode(&self.window_bytes)
    }
}

/// Compute the Shannon entropy of a byte slice, in bits.
///
/// Ranges from 0.0 (all bytes identical) to 8.0 (uniform over all 256
/// values).
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0usize; 256];
    for &b in data {
        freq[b as usize] += 1;
    }
    let len = data.len() as f64;
    let mut out = 0.0;
    for &c in freq.iter() {
        if c == 0 {
            continue;
        }
        let p = c as f64 / len;
        out -= p * p.log2();
    }
    out
}

fn distinct_bytes(data: &[u8]) -> usize {
    let mut seen = [false; 256];
    let mut count = 0;
    for &b in data {
        if !seen[b as usize] {
            seen[b as usize] = true;
            count += 1;
        }
    }
    count
}

/// Slide a 32-byte window over one segment, flagging key-like windows.
pub fn scan_into(segment: &DataSegment, out: &mut Vec<EntropyWindow>) {
    if segment.payload.len() < WINDOW_LEN {
        return;
    }

    for start in 0..=(segment.payload.len() - WINDOW_LEN) {
        let window = &segment.payload[start..start + WINDOW_LEN];
        let entropy_bits = shannon_entropy(window);
        if entropy_bits <= ENTROPY_THRESHOLD_BITS {
            continue;
        }
        let distinct_byte_count = distinct_bytes(window);
        if distinct_byte_count <= DISTINCT_THRESHOLD {
            continue;
        }
        out.push(EntropyWindow {
            absolute_offset: segment
                .init_offset
                .map(|base| u64::from(base) + start as u64),
            window_bytes: window.to_vec(),
            entropy_bits,
            distinct_byte_count,
        });
    }
}

/// Collapse byte-identical candidates to the lowest known offset and sort
/// by descending entropy.
pub fn dedup_and_rank(candidates: &mut Vec<EntropyWindow>) {
    let mut kept: Vec<EntropyWindow> = Vec::with_capacity(candidates.len());

    for candidate in candidates.drain(..) {
        match kept
            .iter_mut()
            .find(|k| k.window_bytes == candidate.window_bytes)
        {
            Some(existing) => {
                existing.absolute_offset =
                    match (existing.absolute_offset, candidate.absolute_offset) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (Some(a), None) => Some(a),
                        (None, b) => b,
                    };
            }
            None => kept.push(candidate),
        }
    }

    kept.sort_by(|a, b| {
        b.entropy_bits
            .partial_cmp(&a.entropy_bits)
            .unwrap_or(core::cmp::Ordering::Equal)
            .then(a.absolute_offset.cmp(&b.absolute_offset))
    });

    *candidates = kept;
}
