// src/bindings.rs
use serde::{Deserialize, Serialize};

use crate::error::BindingError;
use crate::types::{Direction, Label, MentalCommand};

/// Which mental command drives each direction.
///
/// A command bound to one direction disappears from every menu, so no two
/// directions can share a command. `active_actions` accumulates the SDK
/// bitmask of every command that has been sent for training.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBindings {
    forward: Option<MentalCommand>,
    left: Option<MentalCommand>,
    right: Option<MentalCommand>,
    #[serde(default)]
    active_actions: u32,
}

impl CommandBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, direction: Direction) -> Option<MentalCommand> {
        match direction {
            Direction::Forward => self.forward,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut Option<MentalCommand> {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }

    pub fn is_bound(&self, direction: Direction) -> bool {
        self.get(direction).is_some()
    }

    pub fn direction_of(&self, command: MentalCommand) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.get(*d) == Some(command))
    }

    /// Bind `command` to `direction`, returning the command it replaced.
    /// The replaced command goes back into the menus.
    pub fn bind(
        &mut self,
        direction: Direction,
        command: MentalCommand,
    ) -> Result<Option<MentalCommand>, BindingError> {
        if command == MentalCommand::Neutral {
            return Err(BindingError::NeutralNotBindable);
        }
        if let Some(owner) = self.direction_of(command) {
            if owner == direction {
                return Ok(Some(command));
            }
            return Err(BindingError::AlreadyBound {
                command,
                direction: owner,
            });
        }
        Ok(self.slot_mut(direction).replace(command))
    }

    /// Commands not yet bound to any direction, in menu order.
    pub fn available(&self) -> Vec<MentalCommand> {
        MentalCommand::SELECTABLE
            .into_iter()
            .filter(|c| self.direction_of(*c).is_none())
            .collect()
    }

    /// Dropdown rows for `direction`: its binding (or placeholder) first.
    pub fn menu_options(&self, direction: Direction) -> Vec<String> {
        let head = match self.get(direction) {
            Some(cmd) => cmd.name().to_owned(),
            None => direction.placeholder(),
        };
        std::iter::once(head)
            .chain(self.available().iter().map(|c| c.name().to_owned()))
            .collect()
    }

    /// Window label for a classified action. Unbound actions count as none.
    pub fn label_for(&self, action: MentalCommand) -> Label {
        self.direction_of(action)
            .map(|d| d.label())
            .unwrap_or(Label::None)
    }

    pub fn training_target(&self, direction: Direction) -> Result<MentalCommand, BindingError> {
        self.get(direction).ok_or(BindingError::Unbound(direction))
    }

    /// Add `command` to the active set and return the new SDK bitmask.
    pub fn activate(&mut self, command: MentalCommand) -> u32 {
        self.active_actions |= command.bits();
        self.active_actions
    }
}
