use std::time::Duration;

/// Output pacing: fixed-size chunks separated by a pause.
///
/// A speed limit of `n` bytes/sec becomes chunks of `n` bytes with one
/// pause (nominally a second) after each. A limit of 0 disables pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    speed_limit: u64,
    pause: Duration,
}

impl Throttle {
    pub fn new(speed_limit: u64, pause: Duration) -> Self {
        Self { speed_limit, pause }
    }

    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_limited(&self) -> bool {
        self.speed_limit > 0
    }

    /// Chunk size to use, falling back to `unlimited_chunk` when unpaced.
    pub fn chunk_size(&self, unlimited_chunk: usize) -> usize {
        if self.is_limited() {
            usize::try_from(self.speed_limit).unwrap_or(usize::MAX)
        } else {
            unlimited_chunk.max(1)
        }
    }

    /// Blocks the calling thread for one pacing interval.
    pub fn pause(&self) {
        if self.is_limited() && !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_chunk_equals_speed() {
        let throttle = Throttle::new(4096, Duration::from_secs(1));
        assert!(throttle.is_limited());
        assert_eq!(throttle.chunk_size(crate::DEFAULT_CHUNK_SIZE), 4096);
    }

    #[test]
    fn unlimited_uses_default_chunk() {
        let throttle = Throttle::unlimited();
        assert!(!throttle.is_limited());
        assert_eq!(
            throttle.chunk_size(crate::DEFAULT_CHUNK_SIZE),
            crate::DEFAULT_CHUNK_SIZE
        );
    }

    #[test]
    fn unlimited_pause_returns_immediately() {
        let start = std::time::Instant::now();
        Throttle::new(0, Duration::from_secs(5)).pause();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
