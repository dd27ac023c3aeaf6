//! Program command implementation

use std::path::Path;

use romflash_core::image::ProgramImage;
use romflash_serial::TransferSession;

use super::operator::ConsoleOperator;
use super::progress::IndicatifProgress;
use super::{load_image, report_verification};
use crate::config::Settings;
use crate::link::open_link;

/// Where the read dumps of a programming session go
pub struct Artifacts<'a> {
    pub before: &'a Path,
    pub after: &'a Path,
}

/// Run the program command: read, write, read back and verify
pub fn run_program(
    settings: &Settings,
    input: &Path,
    artifacts: Artifacts<'_>,
    assume_yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let image: ProgramImage = load_image(input)?;
    let region = settings.memory.region();

    // Refuse before touching the link
    region.check_fits(image.len())?;
    println!(
        "Target: {} ({} bytes), image uses {} bytes",
        settings.memory,
        region.capacity(),
        image.len()
    );

    let transport = open_link(&settings.device, settings.memory, &settings.session)?;
    let session = TransferSession::new(transport, region, settings.session.clone())?;

    let mut operator = ConsoleOperator::stdin(assume_yes)
        .with_before(artifacts.before.to_path_buf())
        .with_after(artifacts.after.to_path_buf());
    let mut progress = IndicatifProgress::new();

    let outcome = session.run(Some(&image), &mut operator, &mut progress)?;
    match outcome.report {
        Some(report) => report_verification(report),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::DUMMY;
    use romflash_core::memory::MemoryType;
    use romflash_serial::SessionConfig;

    fn settings(device: &str, chunk_size: usize) -> Settings {
        Settings {
            device: device.to_string(),
            memory: MemoryType::M2716,
            session: SessionConfig {
                chunk_size,
                ..SessionConfig::default()
            },
        }
    }

    #[test]
    fn test_program_dummy_stores_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("machineCode.txt");
        std::fs::write(&input, "00000001\n11111111\n00000000\n01010101\n10101010\n").unwrap();
        let before = dir.path().join("eprom_before.txt");
        let after = dir.path().join("eprom_after.txt");

        // 5 bytes in chunks of 2 leaves a one-byte tail
        run_program(
            &settings(DUMMY, 2),
            &input,
            Artifacts {
                before: &before,
                after: &after,
            },
            true,
        )
        .unwrap();

        let before = ProgramImage::from_file(&before).unwrap();
        assert_eq!(before.len(), 2048);
        assert!(before.as_bytes().iter().all(|&b| b == 0xFF));

        let after = ProgramImage::from_file(&after).unwrap();
        assert_eq!(after.len(), 2048);
        assert_eq!(&after.as_bytes()[..5], &[0x01, 0xFF, 0x00, 0x55, 0xAA]);
        assert!(after.as_bytes()[5..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_oversized_image_fails_before_opening_link() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("big.txt");
        std::fs::write(&input, "00000000\n".repeat(2049)).unwrap();
        let before = dir.path().join("eprom_before.txt");
        let after = dir.path().join("eprom_after.txt");

        // Opening this device would fail with TransportUnavailable
        let err = run_program(
            &settings("dev=/nonexistent/romflash-port", 16),
            &input,
            Artifacts {
                before: &before,
                after: &after,
            },
            true,
        )
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<romflash_core::Error>(),
            Some(&romflash_core::Error::ImageTooLarge {
                len: 2049,
                capacity: 2048
            })
        );
        assert!(!before.exists());
        assert!(!after.exists());
    }
}
