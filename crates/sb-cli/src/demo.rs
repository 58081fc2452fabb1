//! Built-in demo game
//!
//! Three reels, one line. Stands in for real game math so the runner can be
//! exercised end to end.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use sb_core::{Book, KernelError, SimulationKernel};

/// Game id the demo kernel is registered under
pub const DEMO_GAME_ID: &str = "demo";

const SYMBOLS: [&str; 6] = ["H1", "H2", "L1", "L2", "L3", "L4"];

/// Three-of-a-kind pays, in hundredths of the bet
const PAYS: [u64; 6] = [5000, 2000, 1000, 500, 300, 200];

const BONUS_MULTIPLIER: u64 = 3;

/// Demo kernel: every trial draws from its own RNG stream, so books depend
/// only on `(seed, trial)`
#[derive(Debug, Clone)]
pub struct DemoKernel {
    seed: u64,
    bonus: bool,
}

impl DemoKernel {
    /// Modes: `base`, `bonus`
    pub fn new(mode: &str, seed: u64) -> Result<Self, KernelError> {
        let bonus = match mode {
            "base" => false,
            "bonus" => true,
            other => {
                return Err(KernelError::Setup(format!(
                    "demo game has no mode '{other}'"
                )));
            }
        };
        Ok(Self { seed, bonus })
    }

    fn rng(&self, trial_index: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed ^ trial_index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl SimulationKernel for DemoKernel {
    fn simulate(&mut self, trial_index: u64) -> Result<Book, KernelError> {
        let mut rng = self.rng(trial_index);
        let board: [usize; 3] = std::array::from_fn(|_| rng.random_range(0..SYMBOLS.len()));

        let mut payout = if board.iter().all(|&s| s == board[0]) {
            PAYS[board[0]]
        } else {
            0
        };
        if self.bonus {
            payout *= BONUS_MULTIPLIER;
        }

        let game_type = if self.bonus { "freegame" } else { "basegame" };
        let criteria = if payout == 0 { "0" } else { game_type };
        let symbols: Vec<&str> = board.iter().map(|&s| SYMBOLS[s]).collect();

        Ok(Book::from_value(
            trial_index,
            json!({
                "payoutMultiplier": payout,
                "events": [
                    { "index": 0, "type": "reveal", "board": symbols, "gameType": game_type },
                ],
                "criteria": criteria,
                "baseGameWins": if self.bonus { 0.0 } else { payout as f64 / 100.0 },
                "freeGameWins": if self.bonus { payout as f64 / 100.0 } else { 0.0 },
            }),
        ))
    }
}
