//! Channel mixing.
//!
//! Pitch estimation wants mono.  Microphones often only open in stereo, so
//! every backend chunk is averaged down to one channel before it goes
//! anywhere else.

use cpal::{FromSample, Sample};

// ---------------------------------------------------------------------------
// downmix_into
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono `f32` by averaging all
/// channels, writing into `out` (cleared first).
///
/// Reusing `out` keeps the audio callback free of per-chunk allocations once
/// the scratch vector has grown to the backend's chunk size.
///
/// * Integer formats are converted to `[-1.0, 1.0]` floats.
/// * A trailing partial frame is ignored.
/// * If `channels == 0`, `out` is left empty.
///
/// # Example
///
/// ```rust
/// use voice_paddle::audio::downmix_into;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mut mono = Vec::new();
/// downmix_into(&stereo, 2, &mut mono);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_into<T>(samples: &[T], channels: u16, out: &mut Vec<f32>)
where
    T: Sample,
    f32: FromSample<T>,
{
    out.clear();
    match channels {
        0 => {}
        1 => out.extend(samples.iter().map(|&s| s.to_sample::<f32>())),
        n => {
            let n = n as usize;
            out.extend(samples.chunks_exact(n).map(|frame| {
                frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / n as f32
            }));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
