// src/engine.rs
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::bindings::CommandBindings;
use crate::config::AppConfig;
use crate::debounce::{CommandWindow, FilterSnapshot};
use crate::emotiv::EmotivHeadset;
use crate::error::HeadsetError;
use crate::headset::{CommandSource, HeadsetEvent, SimulatedHeadset, TrainingControl, TrainingEvent};
use crate::recorder::SessionRecorder;
use crate::types::*;

const MAX_COMMANDS_PER_TICK: usize = 16;

/// GUI-side end of the engine: command sender plus the thread to join.
///
/// Shutting down (explicitly or on drop) stops recording and releases the
/// headset before the process exits.
pub struct EngineHandle {
    tx_cmd: Sender<GuiCommand>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn spawn(tx: Sender<BciMessage>, config: AppConfig) -> Self {
        let (tx_cmd, rx_cmd) = channel();
        let thread = spawn_thread(tx, rx_cmd, config);
        Self {
            tx_cmd,
            thread: Some(thread),
        }
    }

    pub fn send(&self, cmd: GuiCommand) {
        self.tx_cmd.send(cmd).ok();
    }

    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.tx_cmd.send(GuiCommand::Shutdown).ok();
            if thread.join().is_err() {
                log::error!("engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn_thread(
    tx: Sender<BciMessage>,
    rx_cmd: Receiver<GuiCommand>,
    config: AppConfig,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let tick = config.tick();
        let mut engine = Engine::new(tx, config);
        engine.log("Control engine ready.");

        while engine.is_running() {
            for _ in 0..MAX_COMMANDS_PER_TICK {
                match rx_cmd.try_recv() {
                    Ok(cmd) => engine.handle_command(cmd),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        engine.handle_command(GuiCommand::Shutdown);
                        break;
                    }
                }
            }
            engine.tick(Instant::now());
            thread::sleep(tick);
        }
        log::info!("engine thread stopped");
    })
}

/// Owns the debounce window and the headset session.
///
/// Only this thread writes the window; the GUI sees it through
/// `BciMessage::Filter` snapshots.
pub struct Engine {
    tx: Sender<BciMessage>,
    config: AppConfig,
    window: CommandWindow,
    bindings: CommandBindings,
    source: Option<Box<dyn CommandSource>>,
    training: TrainingPhase,
    movement_enabled: bool,
    sim_intent: Label,
    recorder: SessionRecorder,
    profile_due: Option<Instant>,
    last_snapshot: Option<FilterSnapshot>,
    running: bool,
}

impl Engine {
    pub fn new(tx: Sender<BciMessage>, config: AppConfig) -> Self {
        let window =
            CommandWindow::new(config.window_capacity).with_tie_break(config.turn_tie_break);
        let recorder = SessionRecorder::new(config.recording_dir.clone());
        Self {
            tx,
            config,
            window,
            bindings: CommandBindings::new(),
            source: None,
            training: TrainingPhase::Idle,
            movement_enabled: true,
            sim_intent: Label::None,
            recorder,
            profile_due: None,
            last_snapshot: None,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }

    #[cfg(test)]
    pub fn window(&self) -> &CommandWindow {
        &self.window
    }

    fn send(&self, msg: BciMessage) {
        self.tx.send(msg).ok();
    }

    fn log(&self, msg: &str) {
        log::info!("{msg}");
        self.send(BciMessage::Log(msg.to_owned()));
    }

    fn notice(&self, msg: impl Into<String>) {
        let msg = msg.into();
        self.log(&msg);
        self.send(BciMessage::Notice(msg));
    }

    fn report_error(&self, what: &str, err: &HeadsetError) {
        log::warn!("{what}: {err}");
        self.send(BciMessage::Log(format!("{what}: {err}")));
    }

    fn set_movement_enabled(&mut self, enabled: bool) {
        self.movement_enabled = enabled;
        self.send(BciMessage::MovementEnabled(enabled));
    }

    fn set_training(&mut self, phase: TrainingPhase) {
        self.training = phase;
        self.send(BciMessage::Training(phase));
    }

    /// Take over a connected source and schedule the profile load.
    pub fn attach(&mut self, source: Box<dyn CommandSource>, now: Instant) {
        self.source = Some(source);
        self.profile_due = Some(now + self.config.profile_load_delay());
        self.apply_sim_intent();
        self.send(BciMessage::Status(true));
        self.send(BciMessage::Bindings(self.bindings.clone()));
    }

    fn open_source(&self, mode: ConnectionMode) -> Result<Box<dyn CommandSource>, HeadsetError> {
        match mode {
            ConnectionMode::Simulation => Ok(Box::new(SimulatedHeadset::new(
                self.config.sim_noise,
                self.config.sim_training_ticks,
            ))),
            ConnectionMode::Headset => Ok(Box::new(EmotivHeadset::connect()?)),
        }
    }

    fn disconnect(&mut self) {
        if self.source.take().is_some() {
            self.notice("Disconnected");
        }
        if self.recorder.is_recording() {
            self.recorder.stop();
            self.send(BciMessage::RecordingStatus(false));
        }
        self.window.clear();
        self.profile_due = None;
        if self.training != TrainingPhase::Idle {
            self.set_training(TrainingPhase::Idle);
        }
        if !self.movement_enabled {
            self.set_movement_enabled(true);
        }
        self.send(BciMessage::Status(false));
    }

    pub fn handle_command(&mut self, cmd: GuiCommand) {
        match cmd {
            GuiCommand::Connect(mode) => {
                if self.source.is_some() {
                    return;
                }
                match self.open_source(mode) {
                    Ok(source) => {
                        self.log(&format!("Connected ({:?})", mode));
                        self.attach(source, Instant::now());
                    }
                    Err(e) => {
                        self.report_error("connect failed", &e);
                        self.notice("Connection failed");
                        self.send(BciMessage::Status(false));
                    }
                }
            }
            GuiCommand::Disconnect => self.disconnect(),
            GuiCommand::Bind(direction, command) => match self.bindings.bind(direction, command) {
                Ok(_) => {
                    self.log(&format!("{} -> {}", direction.name(), command.name()));
                    self.send(BciMessage::Bindings(self.bindings.clone()));
                    self.apply_sim_intent();
                }
                Err(e) => self.notice(e.to_string()),
            },
            GuiCommand::Train(direction) => self.train(direction),
            GuiCommand::TrainNeutral => self.train_neutral(),
            GuiCommand::AnswerTraining(accept) => self.answer_training(accept),
            GuiCommand::SaveProfile => self.save_profile(),
            GuiCommand::LoadProfile => self.load_profile(),
            GuiCommand::AdjustSensitivity(direction, step) => {
                self.window
                    .adjust_threshold(direction, step.threshold_delta());
                self.notice(format!(
                    "{}-sensitivity: {}",
                    direction.name(),
                    self.window.sensitivity(direction)
                ));
                self.publish_snapshot();
            }
            GuiCommand::SetSimIntent(label) => {
                self.sim_intent = label;
                self.apply_sim_intent();
            }
            GuiCommand::StartRecording(label) => match self.recorder.start(&label) {
                Ok(path) => {
                    self.log(&format!("Recording to {}", path.display()));
                    self.send(BciMessage::RecordingStatus(true));
                }
                Err(e) => {
                    log::warn!("recording failed: {e}");
                    self.notice("Recording failed");
                }
            },
            GuiCommand::StopRecording => {
                self.recorder.stop();
                self.send(BciMessage::RecordingStatus(false));
            }
            GuiCommand::Shutdown => {
                self.disconnect();
                self.running = false;
            }
        }
    }

    fn apply_sim_intent(&mut self) {
        let action = match self.sim_intent {
            Label::None => MentalCommand::Neutral,
            Label::Forward => self.bound_or_neutral(Direction::Forward),
            Label::Left => self.bound_or_neutral(Direction::Left),
            Label::Right => self.bound_or_neutral(Direction::Right),
        };
        if let Some(source) = &mut self.source {
            source.set_operator_intent(action);
        }
    }

    fn bound_or_neutral(&self, direction: Direction) -> MentalCommand {
        self.bindings
            .get(direction)
            .unwrap_or(MentalCommand::Neutral)
    }

    fn start_training(&mut self, action: MentalCommand) -> Result<(), HeadsetError> {
        let source = self.source.as_mut().ok_or(HeadsetError::NotConnected)?;
        if action != MentalCommand::Neutral {
            let mask = self.bindings.activate(action);
            source.set_active_actions(mask)?;
        }
        source.set_training_action(action)?;
        source.set_training_control(TrainingControl::Start)?;
        Ok(())
    }

    fn train(&mut self, direction: Direction) {
        if self.source.is_none() {
            return;
        }
        let action = match self.bindings.training_target(direction) {
            Ok(action) => action,
            Err(e) => {
                self.notice(e.to_string());
                return;
            }
        };
        match self.start_training(action) {
            Ok(()) => self.set_training(TrainingPhase::Running(action)),
            Err(e) => {
                self.report_error("training failed to start", &e);
                self.notice("Training failed");
            }
        }
    }

    fn train_neutral(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.load_profile();
        match self.start_training(MentalCommand::Neutral) {
            Ok(()) => {
                self.set_training(TrainingPhase::Running(MentalCommand::Neutral));
                self.set_movement_enabled(false);
            }
            Err(e) => {
                self.report_error("neutral training failed to start", &e);
                self.notice("Training failed");
            }
        }
    }

    fn answer_training(&mut self, accept: bool) {
        let control = if accept {
            TrainingControl::Accept
        } else {
            TrainingControl::Reject
        };
        if let Some(source) = &mut self.source {
            if let Err(e) = source.set_training_control(control) {
                self.report_error("training answer rejected", &e);
            }
        }
        self.set_training(TrainingPhase::Idle);
        self.set_movement_enabled(true);
    }

    fn save_profile(&mut self) {
        let path = self.config.profile_path.clone();
        let result = match &mut self.source {
            Some(source) => source.save_profile(&path),
            None => Err(HeadsetError::NotConnected),
        };
        match result {
            Ok(()) => self.notice("Saved"),
            Err(e) => {
                self.report_error("profile save", &e);
                self.notice("Save failed");
            }
        }
    }

    fn load_profile(&mut self) {
        let path = self.config.profile_path.clone();
        let result = match &mut self.source {
            Some(source) => source.load_profile(&path),
            None => Err(HeadsetError::NotConnected),
        };
        match result {
            Ok(()) => self.notice("Loaded"),
            Err(e) => {
                self.report_error("profile load", &e);
                self.notice("Loading failed");
            }
        }
    }

    /// One engine step: deferred profile load, then drain the headset.
    pub fn tick(&mut self, now: Instant) {
        if let Some(due) = self.profile_due {
            if now >= due {
                self.profile_due = None;
                self.load_profile();
            }
        }

        let polled = match &mut self.source {
            Some(source) => source.poll(),
            None => return,
        };
        match polled {
            Ok(events) => {
                for event in events {
                    self.handle_event(event);
                }
            }
            Err(e) => {
                self.report_error("headset poll failed", &e);
                self.disconnect();
            }
        }
        self.publish_snapshot();
    }

    fn publish_snapshot(&mut self) {
        let snapshot = self.window.snapshot();
        if self.last_snapshot != Some(snapshot) {
            self.last_snapshot = Some(snapshot);
            self.send(BciMessage::Filter(snapshot));
        }
    }

    fn handle_event(&mut self, event: HeadsetEvent) {
        match event {
            HeadsetEvent::Connected => {
                let name = self.source.as_ref().map_or("Headset", |s| s.name());
                self.notice(format!("{name} connected"));
            }
            HeadsetEvent::UserAdded(id) => {
                log::debug!("user {id} added");
                self.notice("User added");
            }
            HeadsetEvent::UserRemoved(id) => {
                log::debug!("user {id} removed");
                self.notice("User removed");
            }
            HeadsetEvent::CommandUpdated { action, .. } => {
                let label = self.bindings.label_for(action);
                self.window.observe(label);
                self.recorder
                    .write_record(action, label, self.window.counts());
            }
            HeadsetEvent::Training(t) => self.handle_training(t),
        }
    }

    fn handle_training(&mut self, event: TrainingEvent) {
        match event {
            TrainingEvent::Started => {
                self.set_movement_enabled(false);
                self.notice("Training started");
            }
            TrainingEvent::Succeeded => {
                self.notice("Training succeeded");
                if let TrainingPhase::Running(action) = self.training {
                    self.set_training(TrainingPhase::AwaitingAnswer(action));
                }
            }
            TrainingEvent::Failed => {
                self.notice("Training failed");
                self.set_training(TrainingPhase::Idle);
                self.set_movement_enabled(true);
            }
            TrainingEvent::Completed => {
                self.notice("Training completed");
                self.save_profile();
            }
            TrainingEvent::Rejected => self.notice("Training rejected"),
            TrainingEvent::Reset => self.notice("Command reset"),
            TrainingEvent::DataErased => self.notice("Training data erased"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn test_config(tag: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.profile_path = std::env::temp_dir().join(format!(
            "mindchair_engine_{}_{}.json",
            tag,
            std::process::id()
        ));
        config.profile_load_delay_ms = 0;
        config
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mindchair_engine_{}_{}",
            tag,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn session_rows(dir: &Path, label: &str) -> Vec<String> {
        let prefix = format!("session_{label}_");
        let file = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .unwrap();
        std::fs::read_to_string(file.path())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn notices(rx: &Receiver<BciMessage>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|m| match m {
                BciMessage::Notice(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn connected(tag: &str, seed: u64) -> (Engine, Receiver<BciMessage>, AppConfig) {
        let (tx, rx) = channel();
        let config = test_config(tag);
        let mut engine = Engine::new(tx, config.clone());
        engine.attach(
            Box::new(SimulatedHeadset::with_seed(seed, 0.0, 2)),
            Instant::now(),
        );
        (engine, rx, config)
    }

    fn run_ticks(engine: &mut Engine, n: usize) {
        for _ in 0..n {
            engine.tick(Instant::now() + Duration::from_secs(1));
        }
    }

    #[test]
    fn train_accept_then_drive_forward() {
        let (mut engine, rx, config) = connected("drive", 11);
        engine.handle_command(GuiCommand::Bind(Direction::Forward, MentalCommand::Push));
        engine.handle_command(GuiCommand::Train(Direction::Forward));
        run_ticks(&mut engine, 3);

        let msgs: Vec<BciMessage> = rx.try_iter().collect();
        assert!(msgs
            .iter()
            .any(|m| matches!(m, BciMessage::MovementEnabled(false))));
        assert!(msgs.iter().any(|m| matches!(
            m,
            BciMessage::Training(TrainingPhase::AwaitingAnswer(MentalCommand::Push))
        )));

        engine.handle_command(GuiCommand::AnswerTraining(true));
        run_ticks(&mut engine, 1);
        let seen = notices(&rx);
        assert!(seen.contains(&"Training completed".to_owned()));
        assert!(seen.contains(&"Saved".to_owned()));
        assert!(config.profile_path.exists());

        engine.handle_command(GuiCommand::SetSimIntent(Label::Forward));
        run_ticks(&mut engine, 3);
        assert!(!engine.window().should_move_forward());
        run_ticks(&mut engine, 1);
        assert!(engine.window().should_move_forward());

        let last_filter = rx
            .try_iter()
            .filter_map(|m| match m {
                BciMessage::Filter(s) => Some(s),
                _ => None,
            })
            .last()
            .unwrap();
        assert!(last_filter.decision.forward);
        std::fs::remove_file(&config.profile_path).ok();
    }

    #[test]
    fn training_unbound_direction_asks_for_selection() {
        let (mut engine, rx, _) = connected("unbound", 12);
        engine.handle_command(GuiCommand::Train(Direction::Left));
        assert!(notices(&rx).contains(&"no mental command selected for Left".to_owned()));
    }

    #[test]
    fn neutral_training_disables_movement_until_answered() {
        let (mut engine, rx, _) = connected("neutral", 13);
        engine.handle_command(GuiCommand::TrainNeutral);
        let msgs: Vec<BciMessage> = rx.try_iter().collect();
        assert!(msgs
            .iter()
            .any(|m| matches!(m, BciMessage::MovementEnabled(false))));
        engine.handle_command(GuiCommand::AnswerTraining(false));
        let msgs: Vec<BciMessage> = rx.try_iter().collect();
        assert!(msgs
            .iter()
            .any(|m| matches!(m, BciMessage::MovementEnabled(true))));
    }

    #[test]
    fn sensitivity_change_is_announced() {
        let (mut engine, rx, _) = connected("sens", 14);
        engine.handle_command(GuiCommand::AdjustSensitivity(
            Direction::Right,
            SensitivityStep::Down,
        ));
        assert_eq!(engine.window().thresholds().right, 6);
        assert!(notices(&rx).contains(&"Right-sensitivity: 8".to_owned()));
    }

    #[test]
    fn profile_load_runs_once_after_connect() {
        let (mut engine, rx, _) = connected("autoload", 15);
        run_ticks(&mut engine, 2);
        let seen = notices(&rx);
        assert_eq!(
            seen.iter().filter(|s| s.as_str() == "Loading failed").count(),
            1
        );
        assert!(seen.contains(&"Simulated headset connected".to_owned()));
    }

    #[test]
    fn profile_load_waits_for_its_delay() {
        let (tx, rx) = channel();
        let mut config = test_config("delayed");
        config.profile_load_delay_ms = 250;
        let mut engine = Engine::new(tx, config);
        let t0 = Instant::now();
        engine.attach(Box::new(SimulatedHeadset::with_seed(17, 0.0, 2)), t0);

        engine.tick(t0 + Duration::from_millis(100));
        let early = notices(&rx);
        assert!(!early.iter().any(|s| s == "Loaded" || s == "Loading failed"));

        engine.tick(t0 + Duration::from_millis(300));
        engine.tick(t0 + Duration::from_millis(400));
        let late = notices(&rx);
        assert_eq!(late.iter().filter(|s| s.as_str() == "Loading failed").count(), 1);
    }

    #[test]
    fn recording_captures_each_observed_classification() {
        let dir = scratch_dir("rec");
        let (tx, rx) = channel();
        let mut config = test_config("rec");
        config.recording_dir = dir.clone();
        let mut engine = Engine::new(tx, config);
        engine.attach(
            Box::new(SimulatedHeadset::with_seed(18, 0.0, 2)),
            Instant::now(),
        );

        engine.handle_command(GuiCommand::StartRecording("engine".to_owned()));
        run_ticks(&mut engine, 5);
        engine.handle_command(GuiCommand::StopRecording);
        // stopped: later classifications are not written
        run_ticks(&mut engine, 2);

        let rows = session_rows(&dir, "engine");
        assert_eq!(rows[0], "Timestamp,Action,Label,Forward,Left,Right");
        assert_eq!(rows.len(), 6);
        assert!(rows[1..].iter().all(|r| r.ends_with(",Neutral,none,0,0,0")));
        let msgs: Vec<BciMessage> = rx.try_iter().collect();
        assert!(msgs
            .iter()
            .any(|m| matches!(m, BciMessage::RecordingStatus(true))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn handle_shutdown_joins_thread_and_flushes_recording() {
        let dir = scratch_dir("join");
        let (tx, rx) = channel();
        let mut config = test_config("join");
        config.recording_dir = dir.clone();
        config.tick_ms = 5;
        config.sim_noise = 0.0;

        let mut handle = EngineHandle::spawn(tx, config);
        handle.send(GuiCommand::Connect(ConnectionMode::Simulation));
        handle.send(GuiCommand::StartRecording("threaded".to_owned()));
        std::thread::sleep(Duration::from_millis(100));
        handle.shutdown();

        let rows = session_rows(&dir, "threaded");
        assert!(rows.len() > 1);
        let msgs: Vec<BciMessage> = rx.try_iter().collect();
        assert!(matches!(msgs.last(), Some(BciMessage::Status(false))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn disconnect_clears_window_and_reports_status() {
        let (mut engine, rx, _) = connected("disc", 16);
        run_ticks(&mut engine, 5);
        assert!(!engine.window().is_empty());
        engine.handle_command(GuiCommand::Disconnect);
        assert!(!engine.is_connected());
        assert!(engine.window().is_empty());
        let msgs: Vec<BciMessage> = rx.try_iter().collect();
        assert!(matches!(msgs.last(), Some(BciMessage::Status(false))));
    }

    #[test]
    fn shutdown_stops_engine() {
        let (tx, _rx) = channel();
        let mut engine = Engine::new(tx, test_config("shutdown"));
        engine.handle_command(GuiCommand::Shutdown);
        assert!(!engine.is_running());
    }
}
