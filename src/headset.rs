// src/headset.rs
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::error::HeadsetError;
use crate::types::MentalCommand;

/// Mental-command training notifications from the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingEvent {
    Started,
    Succeeded,
    Failed,
    Completed,
    Rejected,
    Reset,
    DataErased,
}

/// Training control codes understood by the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingControl {
    Start,
    Accept,
    Reject,
}

impl TrainingControl {
    pub fn code(&self) -> i32 {
        match self {
            TrainingControl::Start => 1,
            TrainingControl::Accept => 2,
            TrainingControl::Reject => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeadsetEvent {
    Connected,
    UserAdded(u32),
    UserRemoved(u32),
    /// A fresh classification of the user's current mental command.
    CommandUpdated { action: MentalCommand, power: f32 },
    Training(TrainingEvent),
}

/// Anything that can deliver mental-command events on demand.
///
/// The engine polls once per tick and drains whatever has queued up since
/// the last call; there are no callbacks.
pub trait CommandSource {
    /// Shown to the user, e.g. "Emotiv connected".
    fn name(&self) -> &'static str;
    fn poll(&mut self) -> Result<Vec<HeadsetEvent>, HeadsetError>;
    fn set_active_actions(&mut self, mask: u32) -> Result<(), HeadsetError>;
    fn set_training_action(&mut self, action: MentalCommand) -> Result<(), HeadsetError>;
    fn set_training_control(&mut self, control: TrainingControl) -> Result<(), HeadsetError>;
    fn save_profile(&mut self, path: &Path) -> Result<(), HeadsetError>;
    fn load_profile(&mut self, path: &Path) -> Result<(), HeadsetError>;

    /// What the operator is "thinking" right now. Only simulated sources use it.
    fn set_operator_intent(&mut self, _action: MentalCommand) {}
}

const SIM_USER_ID: u32 = 0;

#[derive(Serialize, Deserialize, Default)]
struct SimProfile {
    trained: Vec<MentalCommand>,
    active_actions: u32,
}

struct SimTraining {
    action: MentalCommand,
    ticks_left: u32,
    succeeded: bool,
}

/// Headset stand-in driven by an operator intent plus classification noise.
///
/// Only trained commands are recognised; anything else reads as neutral.
/// With probability `noise` a classification is replaced by a random
/// command from the recognisable set, which is what the debounce window is
/// there to absorb.
pub struct SimulatedHeadset {
    rng: StdRng,
    noise: f64,
    training_ticks: u32,
    intent: MentalCommand,
    trained: Vec<MentalCommand>,
    active_actions: u32,
    training_action: Option<MentalCommand>,
    training: Option<SimTraining>,
    pending: VecDeque<HeadsetEvent>,
}

impl SimulatedHeadset {
    pub fn new(noise: f64, training_ticks: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), noise, training_ticks)
    }

    #[cfg(test)]
    pub fn with_seed(seed: u64, noise: f64, training_ticks: u32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), noise, training_ticks)
    }

    fn with_rng(rng: StdRng, noise: f64, training_ticks: u32) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(HeadsetEvent::Connected);
        pending.push_back(HeadsetEvent::UserAdded(SIM_USER_ID));
        Self {
            rng,
            noise: noise.clamp(0.0, 1.0),
            training_ticks: training_ticks.max(1),
            intent: MentalCommand::Neutral,
            trained: Vec::new(),
            active_actions: 0,
            training_action: None,
            training: None,
            pending,
        }
    }

    pub fn is_trained(&self, action: MentalCommand) -> bool {
        action == MentalCommand::Neutral || self.trained.contains(&action)
    }

    fn classify(&mut self) -> MentalCommand {
        if self.rng.gen_bool(self.noise) {
            let pick = self.rng.gen_range(0..=self.trained.len());
            return if pick == self.trained.len() {
                MentalCommand::Neutral
            } else {
                self.trained[pick]
            };
        }
        if self.is_trained(self.intent) {
            self.intent
        } else {
            MentalCommand::Neutral
        }
    }

    fn advance_training(&mut self) {
        if let Some(t) = &mut self.training {
            if t.succeeded {
                return;
            }
            t.ticks_left = t.ticks_left.saturating_sub(1);
            if t.ticks_left == 0 {
                t.succeeded = true;
                self.pending
                    .push_back(HeadsetEvent::Training(TrainingEvent::Succeeded));
            }
        }
    }
}

impl CommandSource for SimulatedHeadset {
    fn name(&self) -> &'static str {
        "Simulated headset"
    }

    fn poll(&mut self) -> Result<Vec<HeadsetEvent>, HeadsetError> {
        self.advance_training();
        let action = self.classify();
        let power = if action == MentalCommand::Neutral {
            0.0
        } else {
            self.rng.gen_range(0.3..1.0)
        };
        self.pending
            .push_back(HeadsetEvent::CommandUpdated { action, power });
        Ok(self.pending.drain(..).collect())
    }

    fn set_active_actions(&mut self, mask: u32) -> Result<(), HeadsetError> {
        self.active_actions = mask;
        Ok(())
    }

    fn set_training_action(&mut self, action: MentalCommand) -> Result<(), HeadsetError> {
        self.training_action = Some(action);
        Ok(())
    }

    fn set_training_control(&mut self, control: TrainingControl) -> Result<(), HeadsetError> {
        match control {
            TrainingControl::Start => {
                let action = self.training_action.ok_or(HeadsetError::Sdk {
                    call: "IEE_MentalCommandSetTrainingControl",
                    code: 0x0300,
                })?;
                self.training = Some(SimTraining {
                    action,
                    ticks_left: self.training_ticks,
                    succeeded: false,
                });
                self.pending
                    .push_back(HeadsetEvent::Training(TrainingEvent::Started));
            }
            TrainingControl::Accept => match self.training.take() {
                Some(t) if t.succeeded => {
                    if t.action != MentalCommand::Neutral && !self.trained.contains(&t.action) {
                        self.trained.push(t.action);
                    }
                    self.pending
                        .push_back(HeadsetEvent::Training(TrainingEvent::Completed));
                }
                other => {
                    self.training = other;
                    return Err(HeadsetError::Sdk {
                        call: "IEE_MentalCommandSetTrainingControl",
                        code: 0x0302,
                    });
                }
            },
            TrainingControl::Reject => {
                self.training = None;
                self.pending
                    .push_back(HeadsetEvent::Training(TrainingEvent::Rejected));
            }
        }
        Ok(())
    }

    fn save_profile(&mut self, path: &Path) -> Result<(), HeadsetError> {
        let profile = SimProfile {
            trained: self.trained.clone(),
            active_actions: self.active_actions,
        };
        fs::write(path, serde_json::to_vec_pretty(&profile)?)?;
        Ok(())
    }

    fn load_profile(&mut self, path: &Path) -> Result<(), HeadsetError> {
        let bytes = fs::read(path)?;
        let profile: SimProfile = serde_json::from_slice(&bytes)?;
        self.trained = profile.trained;
        self.active_actions = profile.active_actions;
        Ok(())
    }

    fn set_operator_intent(&mut self, action: MentalCommand) {
        self.intent = action;
    }
}
