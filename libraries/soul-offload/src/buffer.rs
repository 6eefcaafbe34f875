/// Transfer buffer sizing for compressed streams
use soul_core::ChannelMask;

/// Buffer size used before any negotiation
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const MIN_BUFFER_SIZE: usize = 2 * 1024;
pub const MAX_BUFFER_SIZE: usize = 128 * 1024;

/// Seconds of encoded audio one buffer should carry
pub const TRANSFER_INTERVAL_SECS: usize = 8;

/// Below this the reported bit rate is not trusted
const MIN_TRUSTED_BIT_RATE: u32 = 12_000;

/// Pick the transfer buffer size for a stream
///
/// With a usable bit rate the buffer holds [`TRANSFER_INTERVAL_SECS`] of audio.
/// Otherwise the size is a guess from sample rate and channel layout. The
/// result is clamped to `[MIN_BUFFER_SIZE, MAX_BUFFER_SIZE]` and rounded down
/// to a power of two.
pub fn offload_buffer_size(bit_rate: u32, sample_rate: u32, channel_mask: ChannelMask) -> usize {
    let size = if bit_rate >= MIN_TRUSTED_BIT_RATE {
        TRANSFER_INTERVAL_SECS * bit_rate as usize / 8
    } else if sample_rate <= 8_000 {
        // voice
        2 * 1024
    } else if channel_mask.is_mono() {
        4 * 1024
    } else if sample_rate <= 32_000 {
        16 * 1024
    } else if sample_rate <= 48_000 {
        32 * 1024
    } else {
        64 * 1024
    };

    floor_power_of_two(size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE))
}

fn floor_power_of_two(value: usize) -> usize {
    if value == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - value.leading_zeros())
    }
}
