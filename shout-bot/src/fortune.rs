use rand::seq::SliceRandom;
use rand::Rng;

const OPTION_SEPARATOR: &str = "or";

/// Answer `!decide <options>`.
///
/// Options are separated by the literal text "or". A single option is a yes/no
/// question; otherwise one option is picked uniformly at random.
pub fn decide<R: Rng + ?Sized>(options: &str, rng: &mut R) -> String {
    let mut pieces: Vec<&str> = options.split(OPTION_SEPARATOR).collect();
    while pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }

    if pieces.len() <= 1 {
        let answer = if rng.gen_bool(0.5) { "Yes" } else { "No" };
        return answer.to_string();
    }

    pieces
        .choose(rng)
        .map(|choice| choice.trim().to_string())
        .unwrap_or_default()
}
