pub const DISPLAY_SECONDS: f32 = 5.0;

/// One-line message that clears itself after a few seconds.
#[derive(Debug, Default)]
pub struct StatusLine {
    text: String,
    remaining: f32,
}

impl StatusLine {
    pub fn show(&mut self, message: impl Into<String>) {
        self.text = message.into();
        self.remaining = DISPLAY_SECONDS;
    }

    pub fn tick(&mut self, dt: f32) {
        self.remaining -= dt;
        if self.remaining < 0.0 {
            self.text.clear();
            self.remaining = 0.0;
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_expires_after_display_time() {
        let mut line = StatusLine::default();
        line.show("Training started");
        line.tick(4.9);
        assert_eq!(line.text(), "Training started");
        line.tick(0.2);
        assert_eq!(line.text(), "");
    }

    #[test]
    fn new_message_restarts_timer() {
        let mut line = StatusLine::default();
        line.show("Saved");
        line.tick(4.0);
        line.show("Loaded");
        line.tick(4.0);
        assert_eq!(line.text(), "Loaded");
    }
}
