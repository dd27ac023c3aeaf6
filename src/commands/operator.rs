//! Console operator: voltage prompts and dump files

use romflash_core::image::ProgramImage;
use romflash_core::progress::Phase;
use romflash_serial::{Operator, OperatorStep};
use std::io::BufRead;
use std::path::PathBuf;

/// Operator that prompts on the terminal and stores dumps to files
pub struct ConsoleOperator<R> {
    input: R,
    assume_yes: bool,
    before: Option<PathBuf>,
    after: Option<PathBuf>,
}

impl ConsoleOperator<std::io::StdinLock<'static>> {
    /// Prompt on stdin
    pub fn stdin(assume_yes: bool) -> Self {
        Self::new(std::io::stdin().lock(), assume_yes)
    }
}

impl<R: BufRead> ConsoleOperator<R> {
    pub fn new(input: R, assume_yes: bool) -> Self {
        Self {
            input,
            assume_yes,
            before: None,
            after: None,
        }
    }

    /// Store the dump taken before programming to `path`
    pub fn with_before(mut self, path: PathBuf) -> Self {
        self.before = Some(path);
        self
    }

    /// Store the dump taken after programming to `path`
    pub fn with_after(mut self, path: PathBuf) -> Self {
        self.after = Some(path);
        self
    }
}

impl<R: BufRead> Operator for ConsoleOperator<R> {
    fn confirm(&mut self, step: OperatorStep) -> bool {
        if self.assume_yes {
            log::info!("{} (assumed done)", step);
            return true;
        }

        eprint!("{} and press Enter to continue, or q to abort: ", step);
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => !line.trim().eq_ignore_ascii_case("q"),
        }
    }

    fn store(&mut self, phase: Phase, image: &ProgramImage) -> romflash_serial::Result<()> {
        let path = match phase {
            Phase::ReadAfter => self.after.as_ref(),
            _ => self.before.as_ref(),
        };
        if let Some(path) = path {
            image.to_file(path)?;
            println!("Saved {} bytes to {}", image.len(), path.display());
        }
        Ok(())
    }
}
