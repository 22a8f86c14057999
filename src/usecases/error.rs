//! Controller Errors
//!
//! Only misuse of the lifecycle and startup failures reach the caller.
//! Everything else (feed hiccups, rejected orders) is reported on the
//! event bus.

use thiserror::Error;

use crate::domain::types::BotStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
  /// Lifecycle call not allowed from the current status. State is unchanged.
  #[error("invalid transition: cannot {action} while {from}")]
  InvalidTransition {
    from: BotStatus,
    action: &'static str,
  },

  #[error("cannot change strategy while bot is {status}")]
  BotRunning { status: BotStatus },

  /// Feed connection or subscription failed during `start()`.
  #[error("failed to start: {0}")]
  Startup(String),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages_name_current_state() {
    let err = BotError::InvalidTransition {
      from: BotStatus::Idle,
      action: "pause",
    };
    assert_eq!(err.to_string(), "invalid transition: cannot pause while IDLE");

    let err = BotError::BotRunning {
      status: BotStatus::Running,
    };
    assert_eq!(err.to_string(), "cannot change strategy while bot is RUNNING");
  }
}
