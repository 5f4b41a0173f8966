//! Write-batch compression selection.
//!
//! A write batch is treated as one contiguous source buffer and trial
//! compressed at 1 KiB, 2 KiB, and 4 KiB granularities; the selector picks
//! the granularity whose total size justifies its read amplification cost.
//! Coarser blocks compress tighter but force every read under them to fetch
//! the whole block, so they must win by a margin: 2 KiB must reach 80% of
//! the 1 KiB total, and 4 KiB must reach 50% of the 1/2 KiB winner.

use crate::mem::Packet;

/// Granularities the selector tries, in bytes.
pub const GRANULARITIES: [usize; 3] = [1024, 2048, 4096];

/// Block compressor abstraction.
///
/// `compress` returns the compressed size of `src`, or `None` when the
/// block cannot be encoded smaller than its input (incompressible).
pub trait BlockCompressor {
    /// Compresses one block; `None` means the block did not shrink.
    fn compress(&self, src: &[u8]) -> Option<usize>;
}

/// LZ4 block compressor.
#[derive(Debug, Default)]
pub struct Lz4Compressor;

impl BlockCompressor for Lz4Compressor {
    fn compress(&self, src: &[u8]) -> Option<usize> {
        let encoded = lz4_flex::block::compress(src);
        if encoded.len() >= src.len() {
            None
        } else {
            Some(encoded.len())
        }
    }
}

/// Concatenates the payloads of the first `threshold` queued writes into a
/// single source buffer, zero-padded to `threshold` cache lines.
pub fn gather_batch_source<'a, I>(writes: I, threshold: usize, line: usize) -> Vec<u8>
where
    I: Iterator<Item = &'a Packet>,
{
    let mut source = Vec::with_capacity(threshold * line);
    for pkt in writes.take(threshold) {
        source.extend_from_slice(&pkt.data);
    }
    source.resize(threshold * line, 0);
    source
}

/// Compresses `source` split into `granularity`-byte blocks.
///
/// Returns one size per block, or an empty vector when the source does not
/// divide into whole blocks or any block is incompressible at this
/// granularity.
pub fn dynamic_compression(
    compressor: &dyn BlockCompressor,
    source: &[u8],
    granularity: usize,
) -> Vec<u32> {
    if granularity == 0 || source.len() < granularity || source.len() % granularity != 0 {
        return Vec::new();
    }
    let mut sizes = Vec::with_capacity(source.len() / granularity);
    for block in source.chunks(granularity) {
        match compressor.compress(block) {
            Some(n) => sizes.push(n as u32),
            None => return Vec::new(),
        }
    }
    sizes
}

fn total(sizes: &[u32]) -> u64 {
    sizes.iter().map(|&s| s as u64).sum()
}

/// Picks the winning granularity's per-block sizes for `source`.
///
/// Between 1 KiB and 2 KiB, the coarser grain wins only if its total is at
/// most 80% of the finer one's; 4 KiB then wins only if its total is at
/// most 50% of that winner's. A granularity at which any block failed is
/// out of the running, and an empty result means the batch should issue
/// uncompressed.
pub fn selected_sizes(compressor: &dyn BlockCompressor, source: &[u8]) -> Vec<u32> {
    let one = dynamic_compression(compressor, source, GRANULARITIES[0]);
    let two = dynamic_compression(compressor, source, GRANULARITIES[1]);
    let four = dynamic_compression(compressor, source, GRANULARITIES[2]);

    let winner = match (one.is_empty(), two.is_empty()) {
        (false, false) => {
            if 5 * total(&two) <= 4 * total(&one) {
                two
            } else {
                one
            }
        }
        (false, true) => one,
        (true, false) => two,
        (true, true) => Vec::new(),
    };

    if !four.is_empty() && (winner.is_empty() || 2 * total(&four) <= total(&winner)) {
        return four;
    }
    winner
}
