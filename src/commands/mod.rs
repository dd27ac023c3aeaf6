//! CLI command implementations
//!
//! Every command opens the link, drives a
//! [`TransferSession`](romflash_serial::TransferSession) through the phases
//! it needs and reports on the terminal. Progress goes through indicatif,
//! the voltage prompts through [`operator::ConsoleOperator`].

mod list;
pub mod operator;
pub mod program;
pub mod progress;
pub mod read;
pub mod verify;

pub use list::list_chips;

use std::path::Path;

use romflash_core::image::ProgramImage;
use romflash_core::verify::VerificationReport;

/// Load a program image file
fn load_image(path: &Path) -> Result<ProgramImage, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;
    let image = ProgramImage::from_binary_text(&content)
        .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;
    println!("Read {} bytes from {}", image.len(), path.display());
    Ok(image)
}

/// Print the outcome of a verification; a mismatch becomes an error
fn report_verification(report: VerificationReport) -> Result<(), Box<dyn std::error::Error>> {
    if report.is_success() {
        println!("Verification passed! ({} bytes)", report.compared());
        return Ok(());
    }

    let differing = report.mismatches().len();
    println!(
        "Verification FAILED: {} of {} bytes differ",
        differing,
        report.compared()
    );
    for m in report.mismatches().iter().take(8) {
        println!(
            "  0x{:04X}: expected {:08b}, read {:08b}",
            m.address, m.expected, m.actual
        );
    }
    print!("{}", report.render());
    Err(romflash_core::Error::VerificationMismatch { differing }.into())
}
