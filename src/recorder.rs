use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::debounce::LabelCounts;
use crate::types::{Label, MentalCommand};

/// CSV log of every classification seen while recording, for tuning
/// thresholds offline.
pub struct SessionRecorder {
    dir: PathBuf,
    writer: Option<BufWriter<File>>,
    started: Instant,
    rows: usize,
}

impl SessionRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writer: None,
            started: Instant::now(),
            rows: 0,
        }
    }

    /// Opens `session_<label>_<unix_ts>.csv` and writes the header.
    pub fn start(&mut self, label: &str) -> io::Result<PathBuf> {
        self.stop();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let path = self.dir.join(format!("session_{}_{}.csv", safe, timestamp));
        let mut w = BufWriter::new(File::create(&path)?);
        writeln!(w, "Timestamp,Action,Label,Forward,Left,Right")?;
        self.writer = Some(w);
        self.started = Instant::now();
        self.rows = 0;
        log::info!("recording started: {}", path.display());
        Ok(path)
    }

    pub fn stop(&mut self) {
        if let Some(mut w) = self.writer.take() {
            w.flush().ok();
            log::info!("recording saved ({} rows)", self.rows);
        }
    }

    pub fn write_record(&mut self, action: MentalCommand, label: Label, counts: LabelCounts) {
        if let Some(w) = &mut self.writer {
            let t = self.started.elapsed().as_secs_f64();
            let written = writeln!(
                w,
                "{:.4},{},{},{},{},{}",
                t,
                action.name(),
                label.as_str(),
                counts.forward,
                counts.left,
                counts.right
            );
            if written.is_ok() {
                self.rows += 1;
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}
