// Direct-control overlay - joystick frames to relative displacements
//
// The direction code is a bitmask: 1 right (+y), 2 left (-y), 4 back (-x),
// 8 forward (+x). The four diagonals are 5, 6, 9 and 10. Each held input
// moves the vehicle once: a direction fires on its onset and re-arms only
// after the code returns to 0. The up/down buttons latch the same way, each
// on its own.

use crate::packet::DirectFrame;

/// Button index that triggers the emergency land-and-stop
pub const EMERGENCY_BUTTON: usize = 0;
/// Button index that moves the vehicle down one step
pub const DOWN_BUTTON: usize = 1;
/// Button index that moves the vehicle up one step
pub const UP_BUTTON: usize = 2;

/// Action derived from one direct-control frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectAction {
    Move { dx: f32, dy: f32, dz: f32 },
    EmergencyLand,
}

/// Unit (x, y) direction for a code, `None` for neutral or invalid codes
pub fn direction(code: u8) -> Option<(f32, f32)> {
    match code {
        1 => Some((0.0, 1.0)),
        2 => Some((0.0, -1.0)),
        4 => Some((-1.0, 0.0)),
        8 => Some((1.0, 0.0)),
        5 => Some((-1.0, 1.0)),
        6 => Some((-1.0, -1.0)),
        9 => Some((1.0, 1.0)),
        10 => Some((1.0, -1.0)),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct DirectControlOverlay {
    step: f32,
    armed: bool,
    up_held: bool,
    down_held: bool,
}

impl DirectControlOverlay {
    pub fn new(step: f32) -> Self {
        Self {
            step,
            armed: true,
            up_held: false,
            down_held: false,
        }
    }

    /// Whether the next non-neutral direction code will fire
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Actions for one frame, in issue order
    pub fn interpret(&mut self, frame: &DirectFrame) -> Vec<DirectAction> {
        if frame.buttons.pressed(EMERGENCY_BUTTON) {
            return vec![DirectAction::EmergencyLand];
        }

        let mut actions = Vec::new();
        match (frame.code, direction(frame.code)) {
            (0, _) => self.armed = true,
            (_, Some((x, y))) => {
                if self.armed {
                    self.armed = false;
                    actions.push(DirectAction::Move {
                        dx: x * self.step,
                        dy: y * self.step,
                        dz: 0.0,
                    });
                }
            }
            (code, None) => {
                tracing::warn!("[FlightMachine] Ignoring invalid direction code {}", code);
            }
        }

        let up = frame.buttons.pressed(UP_BUTTON);
        if up && !self.up_held {
            actions.push(DirectAction::Move {
                dx: 0.0,
                dy: 0.0,
                dz: self.step,
            });
        }
        self.up_held = up;

        let down = frame.buttons.pressed(DOWN_BUTTON);
        if down && !self.down_held {
            actions.push(DirectAction::Move {
                dx: 0.0,
                dy: 0.0,
                dz: -self.step,
            });
        }
        self.down_held = down;

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ButtonState;

    fn frame(code: u8, buttons: [i8; 4]) -> DirectFrame {
        DirectFrame {
            code,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            buttons: ButtonState(buttons),
        }
    }

    #[test]
    fn test_held_direction_fires_once() {
        let mut overlay = DirectControlOverlay::new(0.1);
        let actions: Vec<_> = (0..5)
            .flat_map(|_| overlay.interpret(&frame(1, [0; 4])))
            .collect();
        assert_eq!(
            actions,
            vec![DirectAction::Move {
                dx: 0.0,
                dy: 0.1,
                dz: 0.0
            }]
        );
        assert!(!overlay.is_armed());
    }

    #[test]
    fn test_neutral_rearms() {
        let mut overlay = DirectControlOverlay::new(0.1);
        assert_eq!(overlay.interpret(&frame(8, [0; 4])).len(), 1);
        assert!(overlay.interpret(&frame(9, [0; 4])).is_empty());
        assert!(overlay.interpret(&frame(0, [0; 4])).is_empty());
        assert_eq!(
            overlay.interpret(&frame(6, [0; 4])),
            vec![DirectAction::Move {
                dx: -0.1,
                dy: -0.1,
                dz: 0.0
            }]
        );
    }

    #[test]
    fn test_invalid_code_is_ignored() {
        let mut overlay = DirectControlOverlay::new(0.1);
        assert!(overlay.interpret(&frame(3, [0; 4])).is_empty());
        assert!(overlay.is_armed());
        assert!(overlay.interpret(&frame(15, [0; 4])).is_empty());
        assert_eq!(overlay.interpret(&frame(2, [0; 4])).len(), 1);
    }

    #[test]
    fn test_vertical_buttons_latch_independently() {
        let mut overlay = DirectControlOverlay::new(0.2);
        let up = DirectAction::Move {
            dx: 0.0,
            dy: 0.0,
            dz: 0.2,
        };
        let down = DirectAction::Move {
            dx: 0.0,
            dy: 0.0,
            dz: -0.2,
        };
        assert_eq!(overlay.interpret(&frame(0, [0, 0, 1, 0])), vec![up]);
        assert!(overlay.interpret(&frame(0, [0, 0, 1, 0])).is_empty());
        assert_eq!(overlay.interpret(&frame(0, [0, 1, 1, 0])), vec![down]);
        assert!(overlay.interpret(&frame(0, [0, 1, 0, 0])).is_empty());
        assert_eq!(overlay.interpret(&frame(0, [0, 0, 1, 0])), vec![up]);
    }

    #[test]
    fn test_emergency_button_overrides_everything() {
        let mut overlay = DirectControlOverlay::new(0.1);
        assert_eq!(
            overlay.interpret(&frame(8, [1, 1, 1, 0])),
            vec![DirectAction::EmergencyLand]
        );
    }

    #[test]
    fn test_direction_table() {
        let valid: Vec<u8> = (0..=255).filter(|c| direction(*c).is_some()).collect();
        assert_eq!(valid, vec![1, 2, 4, 5, 6, 8, 9, 10]);
    }
}
