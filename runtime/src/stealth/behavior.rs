//! Human-like pacing between actions.

use rand::Rng;
use std::time::Duration;

/// `base` plus a random extra of up to `jitter_ms` milliseconds.
pub fn jittered(base: Duration, jitter_ms: u64) -> Duration {
    if jitter_ms == 0 {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0..=jitter_ms);
    base + Duration::from_millis(extra)
}

/// Sleep for `base` plus jitter.
pub async fn pause(base: Duration, jitter_ms: u64) {
    tokio::time::sleep(jittered(base, jitter_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(500);
        for _ in 0..100 {
            let d = jittered(base, 200);
            assert!(d >= base && d <= base + Duration::from_millis(200));
        }
        assert_eq!(jittered(base, 0), base);
    }
}
