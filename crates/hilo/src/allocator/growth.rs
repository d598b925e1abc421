use crate::{
    allocator::slot::NEVER,
    config::{DECAY_WINDOW_SECS, MAX_FACTOR, MIN_FACTOR},
};

/// Scale applied to the batch size when a key exhausts batches very rarely.
const MIN_SCALE: f64 = 0.1;

/// Scale applied when a key exhausts a batch immediately after reserving it.
const MAX_SCALE: f64 = 2.0;

/// Computes the batch size for the next reservation.
///
/// The factor is scaled by `max(0.1, 2 - elapsed / 300)`: a key that
/// exhausted its previous batch within seconds doubles it, one idle for five
/// minutes keeps it, and one idle for longer shrinks it. A slot that never
/// reserved keeps its current factor. The result is always within
/// `[MIN_FACTOR, MAX_FACTOR]`.
pub(crate) fn next_growth_factor(current: i32, last_reserved_at: i64, now: i64) -> i32 {
    if last_reserved_at == NEVER {
        return current.clamp(MIN_FACTOR, MAX_FACTOR);
    }

    // A clock that stepped backwards counts as no time passing.
    let elapsed = now.saturating_sub(last_reserved_at).max(0) as f64;
    let scale = (MAX_SCALE - elapsed / DECAY_WINDOW_SECS as f64).max(MIN_SCALE);
    // Float to int casts saturate.
    let scaled = (f64::from(current) * scale) as i32;
    scaled.clamp(MIN_FACTOR, MAX_FACTOR)
}

/// Inflates `factor` by the number of values handed out past the previous
/// threshold, so the next batch absorbs the backlog. Never exceeds
/// `MAX_FACTOR`.
pub(crate) fn batch_size(factor: i32, overshoot: i64) -> i32 {
    let batch = i64::from(factor).saturating_add(overshoot.max(0));
    i32::try_from(batch.min(i64::from(MAX_FACTOR))).unwrap_or(MAX_FACTOR)
}
