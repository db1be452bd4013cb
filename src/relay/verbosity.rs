//! Process-wide verbosity level.

/// Highest accepted level.
pub const MAX_VERBOSITY: u8 = 3;

/// Which classes of events get relayed.
///
/// * 0: nothing mirrored
/// * 1: chat lines, emotes, kicks and bans
/// * 2: level 1 plus chat commands
/// * 3: level 2 plus join/part notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbosity(u8);

impl Verbosity {
    /// Create a controller, clamping an out-of-range start value.
    pub fn new(level: u8) -> Self {
        Self(level.min(MAX_VERBOSITY))
    }

    /// Current level.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Set a new level. Values outside `0..=3` are ignored.
    ///
    /// Returns whether the level was accepted.
    pub fn set(&mut self, level: u8) -> bool {
        if level > MAX_VERBOSITY {
            return false;
        }
        self.0 = level;
        true
    }

    /// Mirror chat lines.
    pub fn mirrors_chat(self) -> bool {
        self.0 >= 1
    }

    /// Run command handlers.
    pub fn runs_commands(self) -> bool {
        self.0 >= 2
    }

    /// Mirror join/part notices.
    pub fn mirrors_presence(self) -> bool {
        self.0 >= 3
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self(2)
    }
}
