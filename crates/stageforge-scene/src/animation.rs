//! Transform animation tracks
//!
//! A collision group may carry a transform animation: six keyframe channels
//! (position X/Y/Z, rotation X/Y/Z), each ordered by time. Rotation keyframe
//! values are radians in the scene model; the exporter converts units on
//! write where a format requires it.

use serde::{Deserialize, Serialize};

/// Interpolation mode between a keyframe and the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    Smooth,
}

impl Easing {
    pub fn code(&self) -> u32 {
        match self {
            Easing::Linear => 0,
            Easing::Smooth => 1,
        }
    }
}

/// What the runtime does when the animation reaches its end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopType {
    Looping,
    PlayOnce,
}

/// A single keyframe on one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time in seconds from animation start
    pub time: f32,
    /// Channel value at `time` (units or radians depending on the channel)
    pub value: f32,
    #[serde(default = "Keyframe::default_easing")]
    pub easing: Easing,
}

impl Keyframe {
    fn default_easing() -> Easing {
        Easing::Linear
    }

    pub fn new(time: f32, value: f32, easing: Easing) -> Self {
        Self {
            time,
            value,
            easing,
        }
    }
}

/// Transform animation for one collision group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAnimation {
    pub loop_type: LoopType,
    /// Total loop duration in seconds
    #[serde(default)]
    pub loop_time: f32,
    #[serde(default)]
    pub pos_x: Vec<Keyframe>,
    #[serde(default)]
    pub pos_y: Vec<Keyframe>,
    #[serde(default)]
    pub pos_z: Vec<Keyframe>,
    #[serde(default)]
    pub rot_x: Vec<Keyframe>,
    #[serde(default)]
    pub rot_y: Vec<Keyframe>,
    #[serde(default)]
    pub rot_z: Vec<Keyframe>,
}

impl TransformAnimation {
    pub fn new(loop_type: LoopType, loop_time: f32) -> Self {
        Self {
            loop_type,
            loop_time,
            pos_x: Vec::new(),
            pos_y: Vec::new(),
            pos_z: Vec::new(),
            rot_x: Vec::new(),
            rot_y: Vec::new(),
            rot_z: Vec::new(),
        }
    }

    /// All six channels in position-then-rotation order
    pub fn channels(&self) -> [&Vec<Keyframe>; 6] {
        [
            &self.pos_x,
            &self.pos_y,
            &self.pos_z,
            &self.rot_x,
            &self.rot_y,
            &self.rot_z,
        ]
    }

    /// Sort every channel by keyframe time. Deserialized tracks may arrive in
    /// any order; serialization requires time order.
    pub fn sort_channels(&mut self) {
        for channel in [
            &mut self.pos_x,
            &mut self.pos_y,
            &mut self.pos_z,
            &mut self.rot_x,
            &mut self.rot_y,
            &mut self.rot_z,
        ] {
            channel.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
    }

    pub fn keyframe_count(&self) -> usize {
        self.channels().iter().map(|c| c.len()).sum()
    }
}
