// src/debounce.rs
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{Direction, Label};

pub const DEFAULT_CAPACITY: usize = 30;
pub const MIN_CAPACITY: usize = 10;
pub const MAX_CAPACITY: usize = 10_000;

/// How a right turn is weighed against a left turn when both counters are
/// over their thresholds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnTieBreak {
    /// Right must strictly outnumber left; an exact tie turns left.
    #[default]
    StrictRightLead,
    /// Right also wins an exact tie.
    RightOnTie,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub forward: usize,
    pub left: usize,
    pub right: usize,
}

impl LabelCounts {
    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::Forward => self.forward,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.forward + self.left + self.right
    }

    fn slot_mut(&mut self, label: Label) -> Option<&mut usize> {
        match label {
            Label::None => None,
            Label::Forward => Some(&mut self.forward),
            Label::Left => Some(&mut self.left),
            Label::Right => Some(&mut self.right),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub forward: usize,
    pub left: usize,
    pub right: usize,
}

impl Thresholds {
    pub fn uniform(value: usize) -> Self {
        Self {
            forward: value,
            left: value,
            right: value,
        }
    }

    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::Forward => self.forward,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut usize {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }
}

/// What the wheelchair should do this frame. At most one turn fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementDecision {
    pub forward: bool,
    /// `Direction::Left` or `Direction::Right`.
    pub turn: Option<Direction>,
}

impl MovementDecision {
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        !self.forward && self.turn.is_none()
    }
}

/// Read-only copy of the filter state handed to the GUI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterSnapshot {
    pub len: usize,
    pub capacity: usize,
    pub counts: LabelCounts,
    pub thresholds: Thresholds,
    pub decision: MovementDecision,
}

impl FilterSnapshot {
    pub fn sensitivity(&self, direction: Direction) -> usize {
        let step = (self.capacity / 10).max(1);
        self.capacity.saturating_sub(self.thresholds.get(direction)) / step
    }
}

/// Sliding window over the most recent classification labels.
///
/// Counters are maintained incrementally as labels enter and leave the
/// window, so every query is O(1). A direction fires once its counter is
/// strictly above its threshold. Thresholds move in steps of
/// `capacity / 10` and stay within `[step, 9 * step]`.
pub struct CommandWindow {
    labels: VecDeque<Label>,
    capacity: usize,
    counts: LabelCounts,
    thresholds: Thresholds,
    tie_break: TurnTieBreak,
}

impl Default for CommandWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CommandWindow {
    /// Capacities below 10 still work but get a step of 1. Capacity is
    /// capped at `MAX_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        let step = (capacity / 10).max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
            counts: LabelCounts::default(),
            thresholds: Thresholds::uniform(step),
            tie_break: TurnTieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TurnTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn counts(&self) -> LabelCounts {
        self.counts
    }

    #[cfg(test)]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    #[cfg(test)]
    pub fn tie_break(&self) -> TurnTieBreak {
        self.tie_break
    }

    pub fn step(&self) -> usize {
        (self.capacity / 10).max(1)
    }

    pub fn min_threshold(&self) -> usize {
        self.step()
    }

    pub fn max_threshold(&self) -> usize {
        9 * self.step()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// Occurrences of `label` in the window, `Label::None` included.
    #[cfg(test)]
    pub fn count(&self, label: Label) -> usize {
        match label {
            Label::None => self.labels.len() - self.counts.total(),
            Label::Forward => self.counts.forward,
            Label::Left => self.counts.left,
            Label::Right => self.counts.right,
        }
    }

    /// Push one classification into the window, evicting the oldest entry
    /// once the window is full.
    pub fn observe(&mut self, label: Label) {
        if self.labels.len() == self.capacity {
            if let Some(evicted) = self.labels.pop_front() {
                if let Some(slot) = self.counts.slot_mut(evicted) {
                    *slot -= 1;
                }
            }
        }
        self.labels.push_back(label);
        if let Some(slot) = self.counts.slot_mut(label) {
            *slot += 1;
        }
    }

    pub fn should_move_forward(&self) -> bool {
        self.counts.forward > self.thresholds.forward
    }

    pub fn should_move_right(&self) -> bool {
        let leads_left = match self.tie_break {
            TurnTieBreak::StrictRightLead => self.counts.right > self.counts.left,
            TurnTieBreak::RightOnTie => self.counts.right >= self.counts.left,
        };
        leads_left && self.counts.right > self.thresholds.right
    }

    /// Right is checked first; left only fires when right does not.
    pub fn should_move_left(&self) -> bool {
        !self.should_move_right() && self.counts.left > self.thresholds.left
    }

    pub fn decision(&self) -> MovementDecision {
        let turn = if self.should_move_right() {
            Some(Direction::Right)
        } else if self.should_move_left() {
            Some(Direction::Left)
        } else {
            None
        };
        MovementDecision {
            forward: self.should_move_forward(),
            turn,
        }
    }

    /// Move a threshold by `delta` steps, clamped to the allowed range.
    /// Returns the new threshold.
    pub fn adjust_threshold(&mut self, direction: Direction, delta: i32) -> usize {
        let step = self.step() as i64;
        let min = self.min_threshold() as i64;
        let max = self.max_threshold() as i64;
        let slot = self.thresholds.get_mut(direction);
        let next = (*slot as i64 + delta as i64 * step).clamp(min, max);
        *slot = next as usize;
        *slot
    }

    /// User-facing sensitivity level, 9 at the lowest threshold and 1 at the highest.
    pub fn sensitivity(&self, direction: Direction) -> usize {
        let threshold = self.thresholds.get(direction);
        self.capacity.saturating_sub(threshold) / self.step()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.counts = LabelCounts::default();
    }

    pub fn snapshot(&self) -> FilterSnapshot {
        FilterSnapshot {
            len: self.labels.len(),
            capacity: self.capacity,
            counts: self.counts,
            thresholds: self.thresholds,
            decision: self.decision(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const LABELS: [Label; 4] = [Label::None, Label::Forward, Label::Left, Label::Right];

    fn recount(window: &CommandWindow, label: Label) -> usize {
        window.iter().filter(|l| **l == label).count()
    }

    fn feed(window: &mut CommandWindow, label: Label, times: usize) {
        for _ in 0..times {
            window.observe(label);
        }
    }

    #[test]
    fn counters_track_window_contents_without_drift() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for capacity in [10, 30, 47] {
            let mut window = CommandWindow::new(capacity);
            let mut history = Vec::new();
            for _ in 0..2_000 {
                let label = LABELS[rng.gen_range(0..LABELS.len())];
                window.observe(label);
                history.push(label);

                assert!(window.len() <= capacity);
                let tail_start = history.len().saturating_sub(capacity);
                let tail = &history[tail_start..];
                assert_eq!(window.len(), tail.len());
                for l in LABELS {
                    let expected = tail.iter().filter(|x| **x == l).count();
                    assert_eq!(window.count(l), expected, "label {:?}", l);
                    assert_eq!(recount(&window, l), expected);
                }
                let c = window.counts();
                assert_eq!(c.total() + window.count(Label::None), window.len());
            }
        }
    }

    #[test]
    fn right_fires_after_four_observations_at_threshold_three() {
        let mut window = CommandWindow::new(30);
        assert_eq!(window.thresholds().right, 3);
        for i in 1..=4 {
            window.observe(Label::Right);
            assert_eq!(window.should_move_right(), i == 4, "after {} observations", i);
        }
        assert!(!window.should_move_left());
        assert!(!window.should_move_forward());
    }

    #[test]
    fn right_leading_left_wins_under_both_policies() {
        for policy in [TurnTieBreak::StrictRightLead, TurnTieBreak::RightOnTie] {
            let mut window = CommandWindow::new(30).with_tie_break(policy);
            feed(&mut window, Label::Left, 4);
            feed(&mut window, Label::Right, 5);
            assert!(window.should_move_right());
            assert!(!window.should_move_left());
            assert_eq!(window.decision().turn, Some(Direction::Right));
        }
    }

    #[test]
    fn exact_tie_turns_left_under_strict_policy() {
        let mut window = CommandWindow::new(30);
        feed(&mut window, Label::Right, 4);
        feed(&mut window, Label::Left, 4);
        assert!(!window.should_move_right());
        assert!(window.should_move_left());
        assert_eq!(window.decision().turn, Some(Direction::Left));
    }

    #[test]
    fn exact_tie_turns_right_when_configured() {
        let mut window = CommandWindow::new(30).with_tie_break(TurnTieBreak::RightOnTie);
        feed(&mut window, Label::Right, 4);
        feed(&mut window, Label::Left, 4);
        assert!(window.should_move_right());
        assert!(!window.should_move_left());
    }

    #[test]
    fn left_alone_fires_once_over_threshold() {
        let mut window = CommandWindow::new(30);
        feed(&mut window, Label::Left, 3);
        assert!(!window.should_move_left());
        window.observe(Label::Left);
        assert!(window.should_move_left());
    }

    #[test]
    fn forward_combines_with_a_turn() {
        let mut window = CommandWindow::new(30);
        feed(&mut window, Label::Forward, 5);
        feed(&mut window, Label::Right, 5);
        let decision = window.decision();
        assert!(decision.forward);
        assert_eq!(decision.turn, Some(Direction::Right));
    }

    #[test]
    fn counter_saturates_at_capacity() {
        let mut window = CommandWindow::new(30);
        feed(&mut window, Label::Forward, 31);
        assert_eq!(window.counts().forward, 30);
        assert_eq!(window.len(), 30);
    }

    #[test]
    fn oversized_capacity_is_capped() {
        let mut window = CommandWindow::new(usize::MAX);
        assert_eq!(window.capacity(), MAX_CAPACITY);
        window.observe(Label::Left);
        assert_eq!(window.counts().left, 1);
    }

    #[test]
    fn eviction_decrements_the_oldest_label() {
        let mut window = CommandWindow::new(10);
        window.observe(Label::Left);
        feed(&mut window, Label::None, 9);
        assert_eq!(window.counts().left, 1);
        window.observe(Label::Forward);
        assert_eq!(window.counts().left, 0);
        assert_eq!(window.counts().forward, 1);
        assert_eq!(window.count(Label::None), 9);
    }

    #[test]
    fn thresholds_stay_in_bounds() {
        let mut window = CommandWindow::new(30);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let dir = Direction::ALL[rng.gen_range(0..3)];
            let delta = rng.gen_range(-3..=3);
            let t = window.adjust_threshold(dir, delta);
            assert!((3..=27).contains(&t));
            assert_eq!(t % 3, 0);
        }
    }

    #[test]
    fn adjust_moves_one_step_and_clamps() {
        let mut window = CommandWindow::new(30);
        assert_eq!(window.adjust_threshold(Direction::Forward, -1), 3);
        assert_eq!(window.adjust_threshold(Direction::Forward, 1), 6);
        for _ in 0..20 {
            window.adjust_threshold(Direction::Forward, 1);
        }
        assert_eq!(window.thresholds().forward, 27);
        assert_eq!(window.thresholds().left, 3);
    }

    #[test]
    fn sensitivity_reports_inverse_threshold() {
        let mut window = CommandWindow::new(30);
        assert_eq!(window.sensitivity(Direction::Right), 9);
        window.adjust_threshold(Direction::Right, 8);
        assert_eq!(window.sensitivity(Direction::Right), 1);
    }

    #[test]
    fn raising_threshold_suppresses_firing() {
        let mut window = CommandWindow::new(30);
        feed(&mut window, Label::Forward, 5);
        assert!(window.should_move_forward());
        window.adjust_threshold(Direction::Forward, 1);
        assert!(!window.should_move_forward());
    }

    #[test]
    fn snapshot_matches_live_state() {
        let mut window = CommandWindow::new(20);
        feed(&mut window, Label::Right, 3);
        window.observe(Label::None);
        let snap = window.snapshot();
        assert_eq!(snap.len, 4);
        assert_eq!(snap.capacity, 20);
        assert_eq!(snap.counts.right, 3);
        assert_eq!(snap.thresholds.right, 2);
        assert_eq!(snap.decision.turn, Some(Direction::Right));
        assert_eq!(snap.sensitivity(Direction::Right), window.sensitivity(Direction::Right));
        window.clear();
        assert!(window.is_empty());
        assert!(window.decision().is_idle());
    }
}
