// Keystroke pacing for character-by-character input.
// CJK characters go through an IME on real keyboards, so they get extra time.
use rand::Rng;

/// Extra delay per CJK character, on top of the random inter-key delay.
pub const CJK_EXTRA_DELAY_MS: u64 = 60;

/// Returns true if `c` is a Chinese/Japanese/Korean character.
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
        || ('\u{3040}'..='\u{309f}').contains(&c)
        || ('\u{30a0}'..='\u{30ff}').contains(&c)
        || ('\u{ac00}'..='\u{d7af}').contains(&c)
}

/// Returns true if the text contains CJK characters.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Pair every character of `text` with the pause that follows it.
pub fn keystroke_plan<R: Rng + ?Sized>(
    text: &str,
    min_delay_ms: u64,
    max_delay_ms: u64,
    rng: &mut R,
) -> Vec<(char, u64)> {
    let (lo, hi) = if min_delay_ms <= max_delay_ms {
        (min_delay_ms, max_delay_ms)
    } else {
        (max_delay_ms, min_delay_ms)
    };
    text.chars()
        .map(|c| {
            let base = rng.random_range(lo..=hi);
            let extra = if is_cjk(c) { CJK_EXTRA_DELAY_MS } else { 0 };
            (c, base + extra)
        })
        .collect()
}
