// Waypoint stack with a wraparound cursor
//
// Waypoints are appended by `wp_set` and removed from the top by `wp_del`.
// `wp_next` / `wp_back` walk the cursor modulo the stack length, so the
// cursor always lies in [0, len - 1] while the stack is non-empty.

use serde::{Deserialize, Serialize};

use crate::error::FlightError;
use crate::flight::actuation::Position;

/// Captured vehicle position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
}

impl From<Position> for Waypoint {
    /// Captured waypoints always face yaw 0
    fn from(position: Position) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaypointStack {
    points: Vec<Waypoint>,
    cursor: usize,
}

impl WaypointStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a waypoint and point the cursor at it
    pub fn push(&mut self, waypoint: Waypoint) {
        self.points.push(waypoint);
        self.cursor = self.points.len() - 1;
    }

    /// Remove the most recent waypoint
    pub fn pop(&mut self) -> Result<Waypoint, FlightError> {
        let waypoint = self
            .points
            .pop()
            .ok_or(FlightError::EmptyWaypointStack { operation: "wp_del" })?;
        self.cursor = self.cursor.min(self.points.len().saturating_sub(1));
        Ok(waypoint)
    }

    /// Move the cursor forward, wrapping to the first waypoint
    pub fn advance(&mut self) -> Result<Waypoint, FlightError> {
        let len = self.checked_len("wp_next")?;
        self.cursor = (self.cursor + 1) % len;
        Ok(self.points[self.cursor])
    }

    /// Move the cursor back, wrapping to the last waypoint
    pub fn retreat(&mut self) -> Result<Waypoint, FlightError> {
        let len = self.checked_len("wp_back")?;
        self.cursor = (self.cursor + len - 1) % len;
        Ok(self.points[self.cursor])
    }

    fn checked_len(&self, operation: &'static str) -> Result<usize, FlightError> {
        match self.points.len() {
            0 => Err(FlightError::EmptyWaypointStack { operation }),
            len => Ok(len),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Waypoint> {
        self.points.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Waypoint] {
        &self.points
    }
}
