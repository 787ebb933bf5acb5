//! Caller-owned session holding one controller per player.

use std::fmt;

use super::mic::MicController;
use super::ControllerError;
use crate::config::AppConfig;
use crate::normalize::NormalizedPosition;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Which paddle a microphone drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    Right,
    Left,
}

impl Player {
    pub fn label(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// PitchSession
// ---------------------------------------------------------------------------

/// The right player's controller plus an optional left one.
///
/// Dropping the session cleans up both controllers.
pub struct PitchSession {
    right: MicController,
    left: Option<MicController>,
}

impl PitchSession {
    /// Validate `config` and start the configured controllers.
    ///
    /// The right player's device is always opened.  The left player's is
    /// opened only when `session.left_device` is set; if that fails, the
    /// right controller is cleaned up before the error is returned.
    pub fn initialize(config: &AppConfig) -> Result<Self, ControllerError> {
        config
            .validate()
            .map_err(|e| ControllerError::Config(format!("{e:#}")))?;

        let right = MicController::new(
            Player::Right.label(),
            &config.controller_config(config.session.right_device.clone()),
        )?;

        let left = match &config.session.left_device {
            None => None,
            Some(device) => {
                match MicController::new(Player::Left.label(), &config.controller_config(device.clone())) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        let mut right = right;
                        right.cleanup();
                        return Err(e);
                    }
                }
            }
        };

        Ok(Self { right, left })
    }

    /// Latest position for `player`; absent when that player has no
    /// microphone.
    pub fn position(&self, player: Player) -> NormalizedPosition {
        self.controller(player)
            .map_or(NormalizedPosition::ABSENT, MicController::get_normalized_position)
    }

    pub fn controller(&self, player: Player) -> Option<&MicController> {
        match player {
            Player::Right => Some(&self.right),
            Player::Left => self.left.as_ref(),
        }
    }

    /// Players with a microphone, right first.
    pub fn players(&self) -> Vec<Player> {
        let mut players = vec![Player::Right];
        if self.left.is_some() {
            players.push(Player::Left);
        }
        players
    }

    /// Tear down every controller.  Idempotent.
    pub fn cleanup(&mut self) {
        if let Some(left) = &mut self.left {
            left.cleanup();
        }
        self.right.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
