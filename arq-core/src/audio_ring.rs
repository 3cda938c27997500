//! Thread-safe audio buffer, shared between the real-time soundcard callback and the
//! engine worker thread.

use std::sync::Mutex;

use crate::error::ArqError;

/// Default capacity: 256-sample callback period times 5000, around 160 s at 8 kHz.
pub const DEFAULT_CAPACITY: usize = 256 * 5000;

/// Bounded single-producer/single-consumer buffer of 16-bit PCM samples.
///
/// `push` and `pop` each take a short lock; acquisition order never matters because no
/// operation needs both the RX and TX buffer at once. A shift-on-pop buffer is used rather
/// than a true ring: at an 8 kHz sample rate and a consumer `n` of at most a few thousand,
/// the O(nbuffer) shift per pop is cheap and this stays simple to reason about.
pub struct AudioRing {
    inner: Mutex<Inner>,
}

struct Inner {
    buffer: Vec<i16>,
    capacity: usize,
}

impl AudioRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: Vec::with_capacity(capacity),
                capacity,
            }),
        }
    }

    /// Append samples to the end of the buffer.
    ///
    /// Fails with `ArqError::AudioOverflow` if there is not enough room. Should not occur in
    /// steady state; if it does, the consumer side has stalled.
    pub fn push(&self, samples: &[i16]) -> Result<(), ArqError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.buffer.len() + samples.len() > inner.capacity {
            return Err(ArqError::AudioOverflow);
        }
        inner.buffer.extend_from_slice(samples);
        Ok(())
    }

    /// Remove and return the oldest `n` samples.
    ///
    /// Panics if `n` exceeds the number of samples currently buffered; callers must check
    /// `available()` first.
    pub fn pop(&self, n: usize) -> Vec<i16> {
        let mut inner = self.inner.lock().unwrap();
        assert!(n <= inner.buffer.len(), "pop past end of audio ring");
        inner.buffer.drain(0..n).collect()
    }

    /// Drop every buffered sample, used to abort an in-flight transmission.
    pub fn drain(&self) {
        self.inner.lock().unwrap().buffer.clear();
    }

    /// Number of samples currently held, without removing them.
    pub fn available(&self) -> usize {
        self.inner.lock().unwrap().buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }
}

impl Default for AudioRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_roundtrip() {
        let ring = AudioRing::new(16);
        ring.push(&[1, 2, 3]).unwrap();
        ring.push(&[4, 5]).unwrap();
        assert_eq!(ring.available(), 5);
        assert_eq!(ring.pop(2), vec![1, 2]);
        assert_eq!(ring.available(), 3);
        assert_eq!(ring.pop(3), vec![3, 4, 5]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn overflow_is_reported() {
        let ring = AudioRing::new(4);
        ring.push(&[1, 2, 3]).unwrap();
        assert!(matches!(ring.push(&[4, 5]), Err(ArqError::AudioOverflow)));
    }

    #[test]
    fn drain_empties_buffer() {
        let ring = AudioRing::new(16);
        ring.push(&[1, 2, 3, 4]).unwrap();
        ring.drain();
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn arbitrary_push_pop_sequence_matches_model() {
        let ring = AudioRing::new(1000);
        let mut model: Vec<i16> = Vec::new();
        let pushes: &[&[i16]] = &[&[1, 2, 3], &[4], &[5, 6, 7, 8], &[], &[9]];
        for chunk in pushes {
            ring.push(chunk).unwrap();
            model.extend_from_slice(chunk);
        }
        let popped_1 = ring.pop(4);
        let removed: Vec<i16> = model.drain(0..4).collect();
        assert_eq!(popped_1, removed);
        assert_eq!(ring.available(), model.len());
        let popped_2 = ring.pop(model.len());
        assert_eq!(popped_2, model);
        assert_eq!(ring.available(), 0);
    }
}
