//! Read command implementation

use std::path::Path;

use romflash_core::progress::Phase;
use romflash_serial::TransferSession;

use super::progress::IndicatifProgress;
use crate::config::Settings;
use crate::link::open_link;

/// Run the read command
pub fn run_read(settings: &Settings, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let region = settings.memory.region();
    println!(
        "Target: {} ({} bytes)",
        settings.memory,
        region.capacity()
    );

    let transport = open_link(&settings.device, settings.memory, &settings.session)?;
    let mut session = TransferSession::new(transport, region, settings.session.clone())?;
    let mut progress = IndicatifProgress::new();

    session.await_ready(&mut progress)?;
    let image = session.read_memory(Phase::ReadBefore, &mut progress)?;
    session.finish(&mut progress);

    image.to_file(output)?;
    println!("Saved {} bytes to {}", image.len(), output.display());
    Ok(())
}
