// src/types.rs
use serde::{Deserialize, Serialize};

use crate::bindings::CommandBindings;
use crate::debounce::FilterSnapshot;

/// Window label derived from one classification event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Label {
    #[default]
    None,
    Forward,
    Left,
    Right,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::None => "none",
            Label::Forward => "forward",
            Label::Left => "left",
            Label::Right => "right",
        }
    }
}

/// A movement direction the user can bind a mental command to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Forward, Direction::Left, Direction::Right];

    pub fn label(&self) -> Label {
        match self {
            Direction::Forward => Label::Forward,
            Direction::Left => Label::Left,
            Direction::Right => Label::Right,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Forward => "Forward",
            Direction::Left => "Left",
            Direction::Right => "Right",
        }
    }

    /// Dropdown text shown while nothing is bound.
    pub fn placeholder(&self) -> String {
        format!("Select {}", self.name())
    }
}

/// Mental command actions known to the EDK, with their SDK bit values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentalCommand {
    Neutral,
    Push,
    Pull,
    Lift,
    Drop,
    Left,
    Right,
    RotateLeft,
    RotateRight,
    RotateClockwise,
    RotateCounterClockwise,
    RotateForwards,
    RotateReverse,
    Disappear,
}

impl MentalCommand {
    /// Every command a user may bind, in menu order.
    pub const SELECTABLE: [MentalCommand; 13] = [
        MentalCommand::Push,
        MentalCommand::Pull,
        MentalCommand::Lift,
        MentalCommand::Drop,
        MentalCommand::Left,
        MentalCommand::Right,
        MentalCommand::RotateLeft,
        MentalCommand::RotateRight,
        MentalCommand::RotateClockwise,
        MentalCommand::RotateCounterClockwise,
        MentalCommand::RotateForwards,
        MentalCommand::RotateReverse,
        MentalCommand::Disappear,
    ];

    pub fn bits(&self) -> u32 {
        match self {
            MentalCommand::Neutral => 0x0001,
            MentalCommand::Push => 0x0002,
            MentalCommand::Pull => 0x0004,
            MentalCommand::Lift => 0x0008,
            MentalCommand::Drop => 0x0010,
            MentalCommand::Left => 0x0020,
            MentalCommand::Right => 0x0040,
            MentalCommand::RotateLeft => 0x0080,
            MentalCommand::RotateRight => 0x0100,
            MentalCommand::RotateClockwise => 0x0200,
            MentalCommand::RotateCounterClockwise => 0x0400,
            MentalCommand::RotateForwards => 0x0800,
            MentalCommand::RotateReverse => 0x1000,
            MentalCommand::Disappear => 0x2000,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        if bits == MentalCommand::Neutral.bits() {
            return Some(MentalCommand::Neutral);
        }
        Self::SELECTABLE.iter().copied().find(|c| c.bits() == bits)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MentalCommand::Neutral => "Neutral",
            MentalCommand::Push => "Push",
            MentalCommand::Pull => "Pull",
            MentalCommand::Lift => "Lift",
            MentalCommand::Drop => "Drop",
            MentalCommand::Left => "Left",
            MentalCommand::Right => "Right",
            MentalCommand::RotateLeft => "Rotate Left",
            MentalCommand::RotateRight => "Rotate Right",
            MentalCommand::RotateClockwise => "Rotate Clockwise",
            MentalCommand::RotateCounterClockwise => "Rotate Counter",
            MentalCommand::RotateForwards => "Rotate Forwards",
            MentalCommand::RotateReverse => "Rotate Reverse",
            MentalCommand::Disappear => "Disappear",
        }
    }
}

// Where classification events come from
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    Simulation,
    Headset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensitivityStep {
    Up,
    Down,
}

impl SensitivityStep {
    /// Threshold delta in window steps; more sensitive means a lower threshold.
    pub fn threshold_delta(&self) -> i32 {
        match self {
            SensitivityStep::Up => -1,
            SensitivityStep::Down => 1,
        }
    }
}

/// Where the training workflow currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrainingPhase {
    #[default]
    Idle,
    Running(MentalCommand),
    /// The SDK accepted the session; the user must keep or discard it.
    AwaitingAnswer(MentalCommand),
}

// Commands sent from the GUI to the engine thread
#[derive(Clone, Debug)]
pub enum GuiCommand {
    Connect(ConnectionMode),
    Disconnect,
    Bind(Direction, MentalCommand),
    Train(Direction),
    TrainNeutral,
    AnswerTraining(bool),
    SaveProfile,
    LoadProfile,
    AdjustSensitivity(Direction, SensitivityStep),
    // operator intent for the simulated headset
    SetSimIntent(Label),
    StartRecording(String),
    StopRecording,
    Shutdown,
}

// Messages sent from the engine thread to the GUI
#[derive(Clone, Debug)]
pub enum BciMessage {
    Log(String),
    /// Short user-facing message for the status line.
    Notice(String),
    Status(bool),
    Bindings(CommandBindings),
    Training(TrainingPhase),
    MovementEnabled(bool),
    Filter(FilterSnapshot),
    RecordingStatus(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bits_round_trip_through_lookup() {
        for cmd in MentalCommand::SELECTABLE {
            assert_eq!(MentalCommand::from_bits(cmd.bits()), Some(cmd));
        }
        assert_eq!(MentalCommand::from_bits(0x0001), Some(MentalCommand::Neutral));
        assert_eq!(MentalCommand::from_bits(0x0003), None);
        assert_eq!(MentalCommand::from_bits(0), None);
    }

    #[test]
    fn menu_names_match_dropdown_text() {
        assert_eq!(MentalCommand::RotateCounterClockwise.name(), "Rotate Counter");
        assert_eq!(Direction::Left.placeholder(), "Select Left");
    }

    #[test]
    fn sensitivity_up_lowers_threshold() {
        assert_eq!(SensitivityStep::Up.threshold_delta(), -1);
        assert_eq!(SensitivityStep::Down.threshold_delta(), 1);
    }
}
