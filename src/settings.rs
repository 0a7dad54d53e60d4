//! Game settings
//!
//! Owned by the session and passed down with the rest of the simulation
//! context; serializable so a surrounding application can persist them.

use serde::{Deserialize, Serialize};

use crate::fixed::Fx;

/// Mouse sensitivity steps (16.16 multipliers over raw mouse delta).
pub const MOUSE_SENS_OPTIONS: [Fx; 3] = [16000, 38000, 58000];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    /// Background music on/off.
    pub music: bool,
    /// Hard mode: smaller bullet pool, no zapper recharge or extra lives.
    pub hard: bool,
    /// Index into MOUSE_SENS_OPTIONS.
    pub mouse_sens_index: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            music: true,
            hard: false,
            mouse_sens_index: 1,
        }
    }
}

impl GameSettings {
    pub fn mouse_sens(&self) -> Fx {
        MOUSE_SENS_OPTIONS[self.mouse_sens_index.min(MOUSE_SENS_OPTIONS.len() - 1)]
    }

    pub fn cycle_mouse_sens(&mut self) {
        self.mouse_sens_index = (self.mouse_sens_index + 1) % MOUSE_SENS_OPTIONS.len();
    }
}
