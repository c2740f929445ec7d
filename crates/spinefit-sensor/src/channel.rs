use serde::{Deserialize, Serialize};

/// One of the eight stretch-force channels.
///
/// Each channel is bound to the surface points carrying its colour tag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[display("red")]
    Red,
    #[display("green")]
    Green,
    #[display("blue")]
    Blue,
    #[display("purple")]
    Purple,
    #[display("orange")]
    Orange,
    #[display("cyan")]
    Cyan,
    #[display("black")]
    Black,
    #[display("pink")]
    Pink,
}

impl Channel {
    pub const LEN: usize = 8;

    pub const ALL: [Self; Self::LEN] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Purple,
        Self::Orange,
        Self::Cyan,
        Self::Black,
        Self::Pink,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The channel whose sagittal reflection defines this channel's point
    /// order, if any.
    ///
    /// Purple mirrors blue and pink mirrors black.
    #[must_use]
    pub const fn mirror_reference(self) -> Option<Self> {
        match self {
            Self::Purple => Some(Self::Blue),
            Self::Pink => Some(Self::Black),
            _ => None,
        }
    }

    /// Assigns an RGB colour tag to a channel.
    ///
    /// Returns `None` for untagged surface points.
    ///
    /// ```
    /// use spinefit_sensor::Channel;
    ///
    /// assert_eq!(Channel::classify([0.95, 0.02, 0.0]), Some(Channel::Red));
    /// assert_eq!(Channel::classify([0.6, 0.0, 0.8]), Some(Channel::Purple));
    /// assert_eq!(Channel::classify([1.0, 1.0, 1.0]), None);
    /// ```
    #[must_use]
    pub fn classify([r, g, b]: [f32; 3]) -> Option<Self> {
        let high = |c: f32| c > 0.9;
        let low = |c: f32| c < 0.1;
        let between = |c: f32, lo: f32, hi: f32| c > lo && c < hi;

        if high(r) && low(g) && low(b) {
            Some(Self::Red)
        } else if high(g) && low(r) && low(b) {
            Some(Self::Green)
        } else if high(b) && low(r) && low(g) {
            Some(Self::Blue)
        } else if between(r, 0.4, 0.9) && between(b, 0.4, 0.9) && low(g) {
            Some(Self::Purple)
        } else if high(r) && between(g, 0.4, 0.7) && low(b) {
            Some(Self::Orange)
        } else if low(r) && high(g) && high(b) {
            Some(Self::Cyan)
        } else if low(r) && low(g) && low(b) {
            Some(Self::Black)
        } else if high(r) && between(g, 0.6, 0.9) && between(b, 0.6, 0.9) {
            Some(Self::Pink)
        } else {
            None
        }
    }
}
