use rand::Rng;
use tracing::warn;

/// Abstracts dice rolls behind a trait so tests can substitute a
/// fixed-sequence roller, the same adapter-trait idiom used elsewhere in
/// this codebase to keep rule content and randomness out of the engine's
/// control flow.
pub trait DiceRoller {
    /// Roll an `n`-sided die once, returning a value in `1..=n`.
    fn roll(&mut self, sides: u32) -> u32;

    fn roll_d20(&mut self) -> u32 {
        self.roll(20)
    }
}

/// The default roller, backed by the thread-local RNG.
#[derive(Default)]
pub struct ThreadRngDiceRoller;

impl DiceRoller for ThreadRngDiceRoller {
    fn roll(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            warn!("dice source asked for a zero-sided die, using fallback zero roll");
            return 0;
        }
        rand::rng().random_range(1..=sides)
    }
}

/// A roller that replays a fixed sequence, then falls back to zero and logs
/// — mirroring the "dice source error never panics" failure semantics.
pub struct ScriptedDiceRoller {
    rolls: Vec<u32>,
    next: usize,
}

impl ScriptedDiceRoller {
    pub fn new(rolls: Vec<u32>) -> Self {
        Self { rolls, next: 0 }
    }
}

impl DiceRoller for ScriptedDiceRoller {
    fn roll(&mut self, _sides: u32) -> u32 {
        match self.rolls.get(self.next) {
            Some(&value) => {
                self.next += 1;
                value
            }
            None => {
                warn!("scripted dice roller exhausted, using fallback zero roll");
                0
            }
        }
    }
}
