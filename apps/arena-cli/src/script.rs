//! Scripted player input for headless runs.
//!
//! A script is a list of steps, each holding one input for a number of ticks:
//!
//! ```yaml
//! - ticks: 60
//!   forward: 1.0
//! - ticks: 20
//!   yaw_degrees: 90
//!   jump: true
//! - ticks: 1
//!   interact: true
//! ```

use anyhow::{Context, Result, bail};
use arena_common::PlayerInput;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest run a script may expand to: about 46 hours at 60 Hz.
pub const MAX_TICKS: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptStep {
    pub ticks: u64,
    /// Forward axis, -1 (back) to 1.
    pub forward: f32,
    /// Strafe axis, -1 (left) to 1.
    pub strafe: f32,
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
    pub jump: bool,
    /// Pressed on the first tick of the step only.
    pub interact: bool,
}

impl ScriptStep {
    fn input(&self, first: bool) -> PlayerInput {
        PlayerInput {
            move_axis: Vec2::new(self.strafe, self.forward),
            yaw: self.yaw_degrees.to_radians(),
            pitch: self.pitch_degrees.to_radians(),
            jump: self.jump,
            interact: self.interact && first,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let steps = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)?,
            Some("yaml" | "yml") => serde_yaml::from_str(&text)?,
            _ => bail!("unsupported script format: {}", path.display()),
        };
        Ok(Self { steps })
    }

    /// Total ticks covered by the script.
    pub fn total_ticks(&self) -> Result<u64> {
        self.steps
            .iter()
            .try_fold(0u64, |total, s| total.checked_add(s.ticks))
            .context("script tick count overflows")
    }

    /// One input per tick, padded with idle input (keeping the last view)
    /// up to `ticks`, or truncated to it.
    pub fn expand(&self, ticks: u64) -> Result<Vec<PlayerInput>> {
        if ticks > MAX_TICKS {
            bail!("{ticks} ticks requested, at most {MAX_TICKS} allowed");
        }
        let ticks = ticks as usize;
        let mut inputs = Vec::with_capacity(ticks);
        'steps: for step in &self.steps {
            for i in 0..step.ticks {
                if inputs.len() == ticks {
                    break 'steps;
                }
                inputs.push(step.input(i == 0));
            }
        }
        let rest = PlayerInput {
            yaw: inputs.last().map_or(0.0, |i| i.yaw),
            pitch: inputs.last().map_or(0.0, |i| i.pitch),
            ..PlayerInput::idle()
        };
        inputs.resize(ticks, rest);
        Ok(inputs)
    }
}
