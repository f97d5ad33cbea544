// src/screens.rs

pub const LAST_HELP_PAGE: usize = HELP_PAGES.len() - 1;
const LOADING_SECONDS: f32 = 0.6;

pub const HELP_PAGES: [&str; 8] = [
    "Do you have a BCI headset? If not, press \"No BCI\" to skip to keyboard controls.",
    "Put on the headset and press CONNECT. The status line reports when the engine and the user are ready.",
    "For each direction, press its TRAIN button and pick the mental command you want to use from the menu.",
    "Press TRAIN again and hold that thought for the whole training session.",
    "When training succeeds, choose whether to keep the session. Kept sessions are saved to your profile.",
    "Train NEUTRAL while relaxed so the headset can tell rest apart from commands.",
    "If the chair reacts too slowly or too eagerly, use the + and - sensitivity buttons for each direction.",
    "Keyboard: W/S or Up/Down drive, A/D or Left/Right turn. Hitting seven cones sends you back to the start.",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Screen {
    MainMenu,
    Loading { progress: f32 },
    Help { page: usize },
    Credits,
    Simulation,
}

/// Title-screen navigation: menu, loading bar, help pages, credits.
#[derive(Debug)]
pub struct ScreenState {
    screen: Screen,
    no_bci: bool,
    quit_requested: bool,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            screen: Screen::MainMenu,
            no_bci: false,
            quit_requested: false,
        }
    }
}

impl ScreenState {
    pub fn current(&self) -> Screen {
        self.screen
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn start_simulation(&mut self) {
        self.screen = Screen::Loading { progress: 0.0 };
    }

    /// Advances the loading bar; switches to the simulation once full.
    pub fn tick(&mut self, dt: f32) {
        if let Screen::Loading { progress } = self.screen {
            let next = (progress + dt / LOADING_SECONDS).clamp(0.0, 1.0);
            self.screen = if next >= 1.0 {
                Screen::Simulation
            } else {
                Screen::Loading { progress: next }
            };
        }
    }

    pub fn help(&mut self) {
        self.no_bci = false;
        self.screen = Screen::Help { page: 0 };
    }

    pub fn help_next(&mut self) {
        if let Screen::Help { page } = self.screen {
            self.screen = Screen::Help {
                page: (page + 1).min(LAST_HELP_PAGE),
            };
        }
    }

    pub fn help_back(&mut self) {
        if let Screen::Help { page } = self.screen {
            self.screen = match page.checked_sub(1) {
                Some(prev) => Screen::Help { page: prev },
                None => Screen::MainMenu,
            };
        }
    }

    /// The user has no headset: jump straight to the keyboard page.
    pub fn help_jump(&mut self) {
        self.no_bci = true;
        self.screen = Screen::Help {
            page: LAST_HELP_PAGE,
        };
    }

    pub fn help_jump_back(&mut self) {
        if self.no_bci {
            self.no_bci = false;
            self.screen = Screen::Help { page: 0 };
        } else {
            self.help_back();
        }
    }

    pub fn credits(&mut self) {
        self.screen = Screen::Credits;
    }

    pub fn return_to_menu(&mut self) {
        self.screen = Screen::MainMenu;
    }

    pub fn quit(&mut self) {
        self.quit_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_completes_into_simulation() {
        let mut s = ScreenState::default();
        s.start_simulation();
        s.tick(0.3);
        match s.current() {
            Screen::Loading { progress } => assert!((progress - 0.5).abs() < 1e-4),
            other => panic!("unexpected {:?}", other),
        }
        s.tick(0.4);
        assert_eq!(s.current(), Screen::Simulation);
        s.tick(1.0);
        assert_eq!(s.current(), Screen::Simulation);
    }

    #[test]
    fn help_pages_are_bounded() {
        let mut s = ScreenState::default();
        s.help();
        for _ in 0..20 {
            s.help_next();
        }
        assert_eq!(s.current(), Screen::Help { page: LAST_HELP_PAGE });
        s.help_back();
        assert_eq!(s.current(), Screen::Help { page: LAST_HELP_PAGE - 1 });
    }

    #[test]
    fn back_from_first_page_returns_to_menu() {
        let mut s = ScreenState::default();
        s.help();
        s.help_back();
        assert_eq!(s.current(), Screen::MainMenu);
    }

    #[test]
    fn no_bci_jump_and_back() {
        let mut s = ScreenState::default();
        s.help();
        s.help_jump();
        assert_eq!(s.current(), Screen::Help { page: LAST_HELP_PAGE });
        s.help_jump_back();
        assert_eq!(s.current(), Screen::Help { page: 0 });

        // reached the last page normally: jump-back only steps one page
        for _ in 0..LAST_HELP_PAGE {
            s.help_next();
        }
        s.help_jump_back();
        assert_eq!(s.current(), Screen::Help { page: LAST_HELP_PAGE - 1 });
    }

    #[test]
    fn credits_and_quit() {
        let mut s = ScreenState::default();
        s.credits();
        assert_eq!(s.current(), Screen::Credits);
        s.return_to_menu();
        assert_eq!(s.current(), Screen::MainMenu);
        assert!(!s.quit_requested());
        s.quit();
        assert!(s.quit_requested());
    }
}
