use crate::error::{HeuristicWarning, Result};
use crate::variant::Game;

/// What to do when a heuristic guard fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningPolicy {
    /// Fail the decode with [`crate::Error::Heuristic`].
    #[default]
    Abort,
    /// Log the warning and keep decoding.
    Continue,
}

/// Settings threaded through every decoder.
#[derive(Debug, Clone, Copy)]
pub struct DecodeConfig {
    pub game: Game,
    pub warnings: WarningPolicy,
}

impl DecodeConfig {
    pub fn new(game: Game) -> Self {
        Self {
            game,
            warnings: WarningPolicy::default(),
        }
    }

    pub fn with_warnings(mut self, warnings: WarningPolicy) -> Self {
        self.warnings = warnings;
        self
    }

    /// Apply the warning policy to a guard that fired.
    pub fn check(&self, warning: HeuristicWarning) -> Result<()> {
        match self.warnings {
            WarningPolicy::Abort => Err(warning.into()),
            WarningPolicy::Continue => {
                tracing::warn!("{warning}");
                Ok(())
            }
        }
    }
}
