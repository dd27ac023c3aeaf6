//! Verify command implementation

use std::path::Path;

use romflash_core::progress::{Phase, TransferProgress};
use romflash_core::verify;
use romflash_serial::TransferSession;

use super::progress::IndicatifProgress;
use super::{load_image, report_verification};
use crate::config::Settings;
use crate::link::open_link;

/// Run the verify command: read the chip and compare it with an image
pub fn run_verify(
    settings: &Settings,
    input: &Path,
    dump: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = load_image(input)?;
    let region = settings.memory.region();
    region.check_fits(image.len())?;

    let transport = open_link(&settings.device, settings.memory, &settings.session)?;
    let mut session = TransferSession::new(transport, region, settings.session.clone())?;
    let mut progress = IndicatifProgress::new();

    session.await_ready(&mut progress)?;
    let actual = session.read_memory(Phase::ReadAfter, &mut progress)?;
    if let Some(path) = dump {
        actual.to_file(path)?;
        println!("Saved {} bytes to {}", actual.len(), path.display());
    }

    progress.phase(Phase::Verify);
    let report = verify::compare(image.as_bytes(), actual.as_bytes())?;
    session.finish(&mut progress);
    report_verification(report)
}
