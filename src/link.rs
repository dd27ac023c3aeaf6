//! Opening the controller link

use romflash_core::memory::MemoryType;
use romflash_dummy::{DummyConfig, DummyController};
use romflash_serial::{Result, SessionConfig, Transport};

/// Device name selecting the emulated controller
pub const DUMMY: &str = "dummy";

/// Open the link named by `device`
///
/// `dummy` starts an emulated controller with a blank chip of the given
/// type, speaking the same ready code and chunk size as `session`; anything
/// else is a connection string for a real controller.
pub fn open_link(
    device: &str,
    memory: MemoryType,
    session: &SessionConfig,
) -> Result<Box<dyn Transport>> {
    if device == DUMMY {
        log::info!("Using emulated controller with a blank {}", memory);
        let config = DummyConfig {
            memory,
            ready_code: session.ready_code.clone(),
            chunk_size: session.chunk_size,
            ..DummyConfig::default()
        };
        return Ok(Box::new(DummyController::new(config)));
    }

    romflash_serial::open_transport(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use romflash_serial::LinkError;

    #[test]
    fn test_open_dummy() {
        let mut link = open_link(DUMMY, MemoryType::M2716, &SessionConfig::default()).unwrap();
        let mut buf = [0u8; 7];
        link.read(&mut buf).unwrap();
        assert_eq!(&buf, b"<READY>");
    }

    #[test]
    fn test_open_missing_port() {
        assert!(matches!(
            open_link(
                "dev=/nonexistent/romflash-port",
                MemoryType::M2716,
                &SessionConfig::default()
            ),
            Err(LinkError::TransportUnavailable(_))
        ));
    }
}
