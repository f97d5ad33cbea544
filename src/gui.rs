// src/gui.rs
use eframe::egui;
use egui::{Color32, Pos2, Rounding, Stroke, Vec2};
use egui_plot::{HLine, Legend, Line, Plot, PlotPoints};
use std::sync::mpsc::{channel, Receiver};

use crate::bindings::CommandBindings;
use crate::config::AppConfig;
use crate::debounce::{CommandWindow, FilterSnapshot};
use crate::engine::EngineHandle;
use crate::screens::{Screen, ScreenState, HELP_PAGES, LAST_HELP_PAGE};
use crate::status::StatusLine;
use crate::types::*;
use crate::world::{KeyAxes, World, WorldEvent, CHAIR_RADIUS, CONE_RADIUS};

const LOG_LINES: usize = 8;
const PLOT_POINTS: usize = 500;
const PIXELS_PER_UNIT: f32 = 6.0;

const FORWARD_COLOR: Color32 = Color32::from_rgb(0, 255, 255);
const LEFT_COLOR: Color32 = Color32::YELLOW;
const RIGHT_COLOR: Color32 = Color32::from_rgb(255, 0, 255);

fn direction_color(direction: Direction) -> Color32 {
    match direction {
        Direction::Forward => FORWARD_COLOR,
        Direction::Left => LEFT_COLOR,
        Direction::Right => RIGHT_COLOR,
    }
}

/// Keyboard state for one frame: manual driving axes plus the simulated intent.
#[derive(Debug, Default, PartialEq)]
struct Controls {
    keys: KeyAxes,
    intent: Label,
}

impl Controls {
    fn read(typing: bool, down: impl Fn(egui::Key) -> bool) -> Self {
        if typing {
            return Self::default();
        }
        let held = |a: egui::Key, b: egui::Key| down(a) || down(b);
        let mut keys = KeyAxes::default();
        if held(egui::Key::W, egui::Key::ArrowUp) {
            keys.vertical += 1.0;
        }
        if held(egui::Key::S, egui::Key::ArrowDown) {
            keys.vertical -= 1.0;
        }
        if held(egui::Key::D, egui::Key::ArrowRight) {
            keys.horizontal += 1.0;
        }
        if held(egui::Key::A, egui::Key::ArrowLeft) {
            keys.horizontal -= 1.0;
        }
        let intent = if held(egui::Key::I, egui::Key::Num1) {
            Label::Forward
        } else if held(egui::Key::J, egui::Key::Num2) {
            Label::Left
        } else if held(egui::Key::L, egui::Key::Num3) {
            Label::Right
        } else {
            Label::None
        };
        Self { keys, intent }
    }
}

pub struct MindchairApp {
    // engine state mirrored from messages
    is_connected: bool,
    is_recording: bool,
    movement_enabled: bool,
    connection_mode: ConnectionMode,
    bindings: CommandBindings,
    training: TrainingPhase,
    filter: FilterSnapshot,

    screens: ScreenState,
    world: World,
    status: StatusLine,
    show_info: bool,
    sim_intent: Label,
    record_label: String,

    // counter history for the plot
    time: f64,
    history: [Vec<[f64; 2]>; 3],

    log_messages: Vec<String>,

    rx: Receiver<BciMessage>,
    engine: EngineHandle,
}

impl MindchairApp {
    pub fn new(config: AppConfig) -> Self {
        let (tx, rx) = channel();

        let filter = CommandWindow::new(config.window_capacity)
            .with_tie_break(config.turn_tie_break)
            .snapshot();
        let world = World::slalom(config.chair_speed, config.rotation_speed);
        let connection_mode = config.connection_mode;

        let engine = EngineHandle::spawn(tx, config);

        Self {
            is_connected: false,
            is_recording: false,
            movement_enabled: true,
            connection_mode,
            bindings: CommandBindings::new(),
            training: TrainingPhase::Idle,
            filter,
            screens: ScreenState::default(),
            world,
            status: StatusLine::default(),
            show_info: false,
            sim_intent: Label::None,
            record_label: "session".to_owned(),
            time: 0.0,
            history: [Vec::new(), Vec::new(), Vec::new()],
            log_messages: vec!["Mindchair ready.".to_owned()],
            rx,
            engine,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn send(&self, cmd: GuiCommand) {
        self.engine.send(cmd);
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BciMessage::Log(s) => self.log(&s),
                BciMessage::Notice(s) => self.status.show(s),
                BciMessage::Status(b) => {
                    self.is_connected = b;
                    if !b {
                        self.sim_intent = Label::None;
                    }
                }
                BciMessage::Bindings(b) => self.bindings = b,
                BciMessage::Training(t) => self.training = t,
                BciMessage::MovementEnabled(b) => self.movement_enabled = b,
                BciMessage::Filter(f) => self.filter = f,
                BciMessage::RecordingStatus(b) => self.is_recording = b,
            }
        }
    }

    fn step_simulation(&mut self, ctx: &egui::Context, dt: f32) {
        // typing into a text field must not steer
        let typing = ctx.wants_keyboard_input();
        let controls = ctx.input(|i| Controls::read(typing, |k| i.key_down(k)));
        if self.is_connected && self.connection_mode == ConnectionMode::Simulation {
            let intent = controls.intent;
            if intent != self.sim_intent {
                self.sim_intent = intent;
                self.send(GuiCommand::SetSimIntent(intent));
            }
        }

        let keys = controls.keys;
        let events = self
            .world
            .step(dt, keys, self.filter.decision, self.movement_enabled);
        for event in events {
            match event {
                WorldEvent::ConeHit(n) => log::debug!("cone hit ({n})"),
                WorldEvent::TooManyCones => self.status.show("You hit too many cones!"),
                WorldEvent::OutOfBounds => self.log("Left the course, back to start."),
            }
        }

        self.time += dt as f64;
        for (i, direction) in Direction::ALL.into_iter().enumerate() {
            let buf = &mut self.history[i];
            buf.push([self.time, self.filter.counts.get(direction) as f64]);
            if buf.len() > PLOT_POINTS {
                buf.remove(0);
            }
        }

        if !typing && ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            self.show_info = !self.show_info;
        }
        if !typing && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.screens.return_to_menu();
        }
    }

    fn draw_world(&self, ui: &mut egui::Ui) {
        let size = ui.available_size();
        let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
        let rect = response.rect;
        painter.rect_filled(rect, Rounding::same(0.0), Color32::from_rgb(20, 28, 20));

        let pose = self.world.chair.pose;
        let centre = rect.center();
        // -z is up on screen, +x to the left so right turns look right
        let to_screen = |x: f32, z: f32| -> Pos2 {
            centre + Vec2::new(-(x - pose.x), z - pose.z) * PIXELS_PER_UNIT
        };

        let b = self.world.bounds;
        let bounds_rect = egui::Rect::from_two_pos(
            to_screen(b.min_x, b.min_z),
            to_screen(b.max_x, b.max_z),
        );
        painter.rect_stroke(bounds_rect, Rounding::same(0.0), Stroke::new(2.0, Color32::GRAY));

        for cone in &self.world.cones {
            let p = to_screen(cone.x, cone.z);
            if rect.contains(p) {
                painter.circle_filled(p, CONE_RADIUS * PIXELS_PER_UNIT, Color32::from_rgb(255, 140, 0));
            }
        }

        let chair = to_screen(pose.x, pose.z);
        let (fx, fz) = pose.forward();
        let nose = to_screen(pose.x + fx * CHAIR_RADIUS * 2.0, pose.z + fz * CHAIR_RADIUS * 2.0);
        let chair_color = if self.movement_enabled {
            Color32::from_rgb(90, 160, 255)
        } else {
            Color32::DARK_GRAY
        };
        painter.circle_filled(chair, CHAIR_RADIUS * PIXELS_PER_UNIT, chair_color);
        painter.line_segment([chair, nose], Stroke::new(3.0, Color32::WHITE));

        let d = self.filter.decision;
        let arrows = [
            (d.forward, "FWD", Direction::Forward),
            (d.turn == Some(Direction::Left), "LEFT", Direction::Left),
            (d.turn == Some(Direction::Right), "RIGHT", Direction::Right),
        ];
        let mut y = rect.top() + 10.0;
        for (active, text, direction) in arrows {
            let color = if active { direction_color(direction) } else { Color32::from_rgb(60, 60, 60) };
            painter.text(
                Pos2::new(rect.right() - 10.0, y),
                egui::Align2::RIGHT_TOP,
                text,
                egui::FontId::proportional(16.0),
                color,
            );
            y += 20.0;
        }

        if self.show_info {
            let info = format!(
                "Position: {:.1}, {:.1}\nHeading: {:.0}\u{b0}\nCones hit: {}\nWindow: {}/{}\nMovement: {}",
                pose.x,
                pose.z,
                pose.heading_deg,
                self.world.cones_hit(),
                self.filter.len,
                self.filter.capacity,
                if self.movement_enabled { "enabled" } else { "paused" },
            );
            painter.text(
                rect.left_top() + Vec2::new(10.0, 10.0),
                egui::Align2::LEFT_TOP,
                info,
                egui::FontId::monospace(13.0),
                Color32::WHITE,
            );
        }

        let status = self.status.text();
        if !status.is_empty() {
            painter.text(
                Pos2::new(centre.x, rect.bottom() - 20.0),
                egui::Align2::CENTER_BOTTOM,
                status,
                egui::FontId::proportional(20.0),
                Color32::YELLOW,
            );
        }
    }

    fn draw_counter_plot(&self, ui: &mut egui::Ui) {
        let thresholds = self.filter.thresholds;
        Plot::new("counter_plot")
            .height(160.0)
            .include_y(0.0)
            .include_y(self.filter.capacity as f64)
            .auto_bounds_x()
            .legend(Legend::default())
            .show(ui, |plot_ui| {
                for (i, direction) in Direction::ALL.into_iter().enumerate() {
                    let color = direction_color(direction);
                    if !self.history[i].is_empty() {
                        plot_ui.line(
                            Line::new(PlotPoints::new(self.history[i].clone()))
                                .name(direction.name())
                                .color(color),
                        );
                    }
                    plot_ui.hline(
                        HLine::new(thresholds.get(direction) as f64)
                            .color(color.gamma_multiply(0.5))
                            .style(egui_plot::LineStyle::dashed_loose()),
                    );
                }
            });
    }

    fn setup_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(10.0);
        ui.heading("Mindchair");
        ui.label("Brain-controlled wheelchair");
        ui.separator();

        ui.add_enabled_ui(!self.is_connected, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
                ui.selectable_value(&mut self.connection_mode, ConnectionMode::Headset, "EMOTIV");
            });
        });
        let btn_txt = if self.is_connected { "DISCONNECT" } else { "CONNECT" };
        if ui.button(btn_txt).clicked() {
            if self.is_connected {
                self.send(GuiCommand::Disconnect);
            } else {
                self.send(GuiCommand::Connect(self.connection_mode));
            }
        }

        ui.add_space(10.0);
        ui.label("COMMANDS");
        let idle = self.is_connected && self.training == TrainingPhase::Idle;
        for direction in Direction::ALL {
            ui.horizontal(|ui| {
                let options = self.bindings.menu_options(direction);
                let selected = options.first().cloned().unwrap_or_default();
                egui::ComboBox::from_id_source(direction.name())
                    .width(150.0)
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for command in self.bindings.available() {
                            if ui.selectable_label(false, command.name()).clicked() {
                                self.send(GuiCommand::Bind(direction, command));
                            }
                        }
                    });
                let can_train = idle && self.bindings.is_bound(direction);
                if ui
                    .add_enabled(can_train, egui::Button::new(format!("TRAIN {}", direction.name().to_uppercase())))
                    .clicked()
                {
                    self.send(GuiCommand::Train(direction));
                }
            });
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!(
                        "Sensitivity {}",
                        self.filter.sensitivity(direction)
                    ))
                    .color(direction_color(direction)),
                );
                if ui.small_button("-").clicked() {
                    self.send(GuiCommand::AdjustSensitivity(direction, SensitivityStep::Down));
                }
                if ui.small_button("+").clicked() {
                    self.send(GuiCommand::AdjustSensitivity(direction, SensitivityStep::Up));
                }
            });
        }
        if ui.add_enabled(idle, egui::Button::new("TRAIN NEUTRAL")).clicked() {
            self.send(GuiCommand::TrainNeutral);
        }
        if let TrainingPhase::Running(command) = self.training {
            ui.label(
                egui::RichText::new(format!("Training {}...", command.name()))
                    .color(Color32::YELLOW)
                    .small(),
            );
        }

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            if ui.add_enabled(self.is_connected, egui::Button::new("SAVE PROFILE")).clicked() {
                self.send(GuiCommand::SaveProfile);
            }
            if ui.add_enabled(self.is_connected, egui::Button::new("LOAD PROFILE")).clicked() {
                self.send(GuiCommand::LoadProfile);
            }
        });

        ui.add_space(10.0);
        ui.separator();
        ui.label("SESSION RECORDING");
        ui.text_edit_singleline(&mut self.record_label);
        let rec_btn_text = if self.is_recording { "STOP" } else { "RECORD" };
        let rec_btn_col = if self.is_recording { Color32::RED } else { Color32::DARK_GRAY };
        if ui
            .add_enabled(
                self.is_connected,
                egui::Button::new(egui::RichText::new(rec_btn_text).color(Color32::WHITE)).fill(rec_btn_col),
            )
            .clicked()
        {
            if self.is_recording {
                self.send(GuiCommand::StopRecording);
            } else {
                self.send(GuiCommand::StartRecording(self.record_label.clone()));
            }
        }

        ui.add_space(10.0);
        ui.checkbox(&mut self.show_info, "Show info (F1)");
        if self.is_connected && self.connection_mode == ConnectionMode::Simulation {
            ui.label(egui::RichText::new("Think keys: I / J / L").small().color(Color32::YELLOW));
        }
        if ui.button("MAIN MENU").clicked() {
            self.screens.return_to_menu();
        }

        ui.add_space(10.0);
        egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
            for m in &self.log_messages {
                ui.monospace(m);
            }
        });
    }

    fn training_answer_window(&mut self, ctx: &egui::Context) {
        if let TrainingPhase::AwaitingAnswer(command) = self.training {
            egui::Window::new("Training succeeded")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(format!("Keep this {} training session?", command.name()));
                    ui.horizontal(|ui| {
                        if ui.button("ACCEPT").clicked() {
                            self.send(GuiCommand::AnswerTraining(true));
                            self.training = TrainingPhase::Idle;
                        }
                        if ui.button("REJECT").clicked() {
                            self.send(GuiCommand::AnswerTraining(false));
                            self.training = TrainingPhase::Idle;
                        }
                    });
                });
        }
    }

    fn main_menu(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(120.0);
                ui.heading(egui::RichText::new("MINDCHAIR").size(48.0));
                ui.add_space(40.0);
                let size = Vec2::new(220.0, 40.0);
                if ui.add_sized(size, egui::Button::new("START")).clicked() {
                    self.screens.start_simulation();
                }
                if ui.add_sized(size, egui::Button::new("HELP")).clicked() {
                    self.screens.help();
                }
                if ui.add_sized(size, egui::Button::new("CREDITS")).clicked() {
                    self.screens.credits();
                }
                if ui.add_sized(size, egui::Button::new("QUIT")).clicked() {
                    self.screens.quit();
                }
            });
        });
    }

    fn loading(&mut self, ctx: &egui::Context, progress: f32) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(200.0);
                ui.label("Loading...");
                ui.add(egui::ProgressBar::new(progress).desired_width(400.0).show_percentage());
            });
        });
    }

    fn help(&mut self, ctx: &egui::Context, page: usize) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(120.0);
                ui.heading(format!("Help {}/{}", page + 1, HELP_PAGES.len()));
                ui.add_space(20.0);
                ui.label(egui::RichText::new(HELP_PAGES[page]).size(18.0));
                ui.add_space(30.0);
                ui.horizontal(|ui| {
                    if page == LAST_HELP_PAGE {
                        if ui.button("BACK").clicked() {
                            self.screens.help_jump_back();
                        }
                        if ui.button("MENU").clicked() {
                            self.screens.return_to_menu();
                        }
                    } else {
                        if ui.button("BACK").clicked() {
                            self.screens.help_back();
                        }
                        if ui.button("NEXT").clicked() {
                            self.screens.help_next();
                        }
                        if page == 0 && ui.button("No BCI").clicked() {
                            self.screens.help_jump();
                        }
                    }
                });
            });
        });
    }

    fn credits(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(160.0);
                ui.heading("Credits");
                ui.add_space(20.0);
                ui.label("Mindchair: steer a wheelchair with mental commands.");
                ui.label("Built with egui and the Emotiv EDK.");
                ui.add_space(30.0);
                if ui.button("BACK").clicked() {
                    self.screens.return_to_menu();
                }
            });
        });
    }
}

impl eframe::App for MindchairApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();

        let dt = ctx.input(|i| i.stable_dt).min(0.1);
        self.status.tick(dt);
        self.screens.tick(dt);

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        match self.screens.current() {
            Screen::MainMenu => self.main_menu(ctx),
            Screen::Loading { progress } => self.loading(ctx, progress),
            Screen::Help { page } => self.help(ctx, page),
            Screen::Credits => self.credits(ctx),
            Screen::Simulation => {
                self.step_simulation(ctx, dt);
                egui::SidePanel::left("setup").min_width(300.0).show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| self.setup_panel(ui));
                });
                egui::TopBottomPanel::bottom("counters").show(ctx, |ui| {
                    self.draw_counter_plot(ui);
                });
                egui::CentralPanel::default().show(ctx, |ui| self.draw_world(ui));
                self.training_answer_window(ctx);
            }
        }

        if self.screens.quit_requested() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.engine.shutdown();
    }
}
