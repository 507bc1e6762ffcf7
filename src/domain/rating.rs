/// Rating change sensitivity.
pub const K_FACTOR: f64 = 32.0;

pub const INITIAL_RATING: f64 = 1200.0;

fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// New `(winner, loser)` ratings after a decisive game.
pub fn elo_update(winner: f64, loser: f64) -> (f64, f64) {
    let winner_expected = expected_score(winner, loser);
    let loser_expected = expected_score(loser, winner);
    (
        winner + K_FACTOR * (1.0 - winner_expected),
        loser + K_FACTOR * (0.0 - loser_expected),
    )
}
