//! Progress reporting with indicatif

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use romflash_core::progress::{Phase, TransferProgress, TransferStats};
use std::time::Duration;

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} bytes ({{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Progress reporter using indicatif progress bars
///
/// Every phase gets its own bar; the previous one is finished when the next
/// phase starts, so operator prompts never share a line with a live bar.
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    phase: Option<Phase>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            phase: None,
        }
    }

    fn create_bar(&mut self, total: u64, label: &str) {
        let pb = self.multi.add(
            create_progress_bar_with_phase(total, label)
                .unwrap_or_else(|_| ProgressBar::new(total)),
        );
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            let message = match self.phase {
                Some(Phase::AwaitReady) => "Controller ready".to_string(),
                Some(phase) => format!("{} complete", phase),
                None => String::new(),
            };
            pb.finish_with_message(message);
        }
    }

    fn label(&self) -> &'static str {
        match self.phase {
            Some(Phase::ReadBefore) => "Reading (before)",
            Some(Phase::ReadAfter) => "Reading (after)",
            Some(Phase::Write) => "Writing",
            _ => "",
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress for IndicatifProgress {
    fn phase(&mut self, phase: Phase) {
        self.finish();
        self.phase = Some(phase);
        if phase == Phase::AwaitReady {
            self.create_spinner("Waiting for controller...".to_string());
        }
    }

    fn reading(&mut self, expected_bytes: usize) {
        self.create_bar(expected_bytes as u64, self.label());
    }

    fn read_progress(&mut self, bytes_read: usize) {
        let done = match &self.current_bar {
            Some(pb) => {
                pb.set_position(bytes_read as u64);
                pb.length() == Some(bytes_read as u64)
            }
            None => false,
        };
        if done {
            self.finish();
        }
    }

    fn writing(&mut self, total_bytes: usize) {
        self.create_bar(total_bytes as u64, self.label());
    }

    fn write_progress(&mut self, bytes_written: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(bytes_written as u64);
        }
    }

    fn complete(&mut self, stats: &TransferStats) {
        self.finish();

        if stats.bytes_written > 0 {
            println!(
                "Wrote {} bytes in {} chunk(s) ({:.2?})",
                stats.bytes_written, stats.chunks_sent, stats.write_time
            );
        }
        println!(
            "Read {} bytes before and {} bytes after programming; session took {:.2?}",
            stats.bytes_read_before, stats.bytes_read_after, stats.total_time
        );
    }
}
