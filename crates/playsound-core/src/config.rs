use std::time::Duration;

/// Playback tuning parameters shared by the decode, callback and lifecycle stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Device buffer size in frames requested from the output backend.
    pub buffer_frames: u32,
    /// Target size of one decoded chunk in bytes.
    pub decode_buffer_bytes: usize,
    /// How often the lifecycle thread checks the completion flag.
    pub poll_interval: Duration,
    /// Device-buffer periods to sleep after pausing, before teardown.
    ///
    /// There is no portable "wait for drain" primitive, so this is a heuristic; short
    /// buffers on some backends still clip the tail.
    pub drain_periods: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffer_frames: 4096,
            decode_buffer_bytes: 65_536,
            poll_interval: Duration::from_millis(10),
            drain_periods: 2,
        }
    }
}

/// Time to let the device play out what it already holds after the feed stops.
///
/// Computed in whole milliseconds: `periods * 1000 * buffer_frames / sample_rate`.
pub fn drain_duration(buffer_frames: u32, sample_rate: u32, periods: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let ms = u64::from(periods)
        .saturating_mul(1000)
        .saturating_mul(u64::from(buffer_frames))
        / u64::from(sample_rate);
    Duration::from_millis(ms)
}
