use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum TickKind {
    /// Geometry update. Bodies settle on this tick.
    #[display("simulation")]
    Simulation,
    /// Scheduling tick. Decisions and sampling happen here.
    #[display("render")]
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub frame: u64,
    pub kind: TickKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockParams {
    /// Render frames per second; converts wall-clock pauses into frames.
    pub frame_rate: f32,
}

impl Default for ClockParams {
    fn default() -> Self {
        Self { frame_rate: 60.0 }
    }
}

impl ClockParams {
    /// Number of render frames covering `seconds`, rounded up.
    ///
    /// ```
    /// use spinefit_agent::ClockParams;
    ///
    /// let clock = ClockParams { frame_rate: 60.0 };
    /// assert_eq!(clock.frames_for(0.1), 6);
    /// assert_eq!(clock.frames_for(0.0), 0);
    /// ```
    #[must_use]
    pub fn frames_for(&self, seconds: f32) -> u32 {
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frames = (seconds * self.frame_rate - 1e-4).ceil().max(0.0) as u32;
        frames
    }

    #[must_use]
    pub fn seconds_per_frame(&self) -> f32 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            0.0
        }
    }
}

/// Endless stream of ticks: per frame, one simulation tick then one render tick.
///
/// ```
/// use spinefit_agent::{TickClock, TickKind};
///
/// let mut clock = TickClock::new();
/// let first = clock.next_tick();
/// let second = clock.next_tick();
/// assert_eq!((first.frame, first.kind), (0, TickKind::Simulation));
/// assert_eq!((second.frame, second.kind), (0, TickKind::Render));
/// assert_eq!(clock.next_tick().frame, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    frame: u64,
    render_due: bool,
}

impl TickClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame number of the next tick.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn next_tick(&mut self) -> Tick {
        if self.render_due {
            let tick = Tick {
                frame: self.frame,
                kind: TickKind::Render,
            };
            self.render_due = false;
            self.frame += 1;
            tick
        } else {
            self.render_due = true;
            Tick {
                frame: self.frame,
                kind: TickKind::Simulation,
            }
        }
    }
}

impl Iterator for TickClock {
    type Item = Tick;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_alternate_simulation_then_render() {
        let ticks: Vec<_> = TickClock::new().take(6).collect();
        let kinds: Vec<_> = ticks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TickKind::Simulation,
                TickKind::Render,
                TickKind::Simulation,
                TickKind::Render,
                TickKind::Simulation,
                TickKind::Render,
            ]
        );
        let frames: Vec<_> = ticks.iter().map(|t| t.frame).collect();
        assert_eq!(frames, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_frames_for_rounds_up() {
        let clock = ClockParams::default();
        assert_eq!(clock.frames_for(1.0), 60);
        assert_eq!(clock.frames_for(0.01), 1);
        assert_eq!(clock.frames_for(-3.0), 0);
        assert_eq!(clock.frames_for(f32::NAN), 0);
    }
}
