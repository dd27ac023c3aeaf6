//! romflash-serial - Framed serial link to an EPROM programming controller
//!
//! This crate talks to a microcontroller that drives the EPROM's address,
//! data and control lines. The host side is layered:
//!
//! - [`transport`] - duplex byte stream (serial port or TCP bridge)
//! - [`framer`] - `<payload>` message framing on top of the stream
//! - [`handshake`] - blocking waits for exact control codes
//! - [`session`] - the read / write / read / verify state machine
//!
//! # Protocol Overview
//!
//! ```text
//! controller -> <READY>
//! host       -> <32|R4096>
//! controller -> <255\r\n255\r\n...> ... <DONE>
//! host       -> <32|W3>
//! controller -> <WRITE-READY>
//! host       -> raw chunk, controller -> <CONTINUE>, ... last chunk
//! controller -> <DONE>
//! host       -> <32|R4096> ... (read-after)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use romflash_core::image::ProgramImage;
//! use romflash_core::memory::MemoryType;
//! use romflash_core::progress::NoProgress;
//! use romflash_serial::{AutoConfirm, SerialTransport, SessionConfig, TransferSession};
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", None)?;
//! let image = ProgramImage::from_file("machineCode.txt")?;
//! let session = TransferSession::new(transport, MemoryType::M2732.region(), SessionConfig::default())?;
//!
//! let outcome = session.run(Some(&image), &mut AutoConfirm, &mut NoProgress)?;
//! if let Some(report) = &outcome.report {
//!     print!("{}", report.render());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod framer;
pub mod handshake;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports
pub use error::{LinkError, Result};
pub use framer::{Framer, Message, WaitPolicy, DEFAULT_WAIT};
pub use handshake::Handshake;
pub use protocol::{codes, Request, RequestKind};
pub use session::{
    AutoConfirm, Operator, OperatorStep, SessionConfig, SessionOutcome, TransferSession,
};
pub use transport::serial::SerialTransport;
pub use transport::tcp::TcpTransport;
pub use transport::Transport;

/// Where the controller is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// Serial port connection
    Serial {
        /// Device path (e.g., "/dev/ttyUSB0" or "COM3")
        device: String,
        /// Baud rate (None for the controller's fixed rate)
        baud: Option<u32>,
    },
    /// TCP serial bridge
    Tcp {
        /// Hostname or IP address
        host: String,
        /// Port number
        port: u16,
    },
}

impl Connection {
    /// Parse a connection string
    ///
    /// Formats:
    /// - `dev=/dev/ttyUSB0` - Serial at 115200 baud
    /// - `dev=/dev/ttyUSB0:57600` - Serial with specified baud (digits only)
    /// - `ip=host:port` - TCP serial bridge
    /// - `/dev/ttyUSB0` - Bare device name, serial at 115200 baud
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        if let Some(dev) = s.strip_prefix("dev=") {
            // Device paths may contain ':' themselves (/dev/serial/by-path/...),
            // so only an all-digit suffix is a baud rate
            match dev.rsplit_once(':') {
                Some((device, baud_str))
                    if !baud_str.is_empty() && baud_str.bytes().all(|b| b.is_ascii_digit()) =>
                {
                    let baud = baud_str
                        .parse()
                        .map_err(|_| format!("Invalid baud rate: {}", baud_str))?;
                    Ok(Connection::Serial {
                        device: device.to_string(),
                        baud: Some(baud),
                    })
                }
                _ => Ok(Connection::Serial {
                    device: dev.to_string(),
                    baud: None,
                }),
            }
        } else if let Some(ip) = s.strip_prefix("ip=") {
            let (host, port_str) = ip
                .rsplit_once(':')
                .ok_or_else(|| "Missing port in ip= parameter".to_string())?;
            let port = port_str
                .parse()
                .map_err(|_| format!("Invalid port: {}", port_str))?;
            Ok(Connection::Tcp {
                host: host.to_string(),
                port,
            })
        } else if s.is_empty() || s.contains('=') {
            Err(format!(
                "Invalid connection string: {}. Use dev=..., ip=... or a device name",
                s
            ))
        } else {
            Ok(Connection::Serial {
                device: s.to_string(),
                baud: None,
            })
        }
    }

    /// Open the link described by this connection
    pub fn open(&self) -> Result<Box<dyn Transport>> {
        match self {
            Connection::Serial { device, baud } => {
                Ok(Box::new(SerialTransport::open(device, *baud)?))
            }
            Connection::Tcp { host, port } => Ok(Box::new(TcpTransport::connect(host, *port)?)),
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Serial { device, baud: None } => write!(f, "dev={}", device),
            Connection::Serial {
                device,
                baud: Some(baud),
            } => write!(f, "dev={}:{}", device, baud),
            Connection::Tcp { host, port } => write!(f, "ip={}:{}", host, port),
        }
    }
}

/// Parse a connection string and open the link
pub fn open_transport(options: &str) -> Result<Box<dyn Transport>> {
    let conn = Connection::parse(options).map_err(LinkError::InvalidParameter)?;
    conn.open()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial() {
        assert_eq!(
            Connection::parse("dev=/dev/ttyUSB0").unwrap(),
            Connection::Serial {
                device: "/dev/ttyUSB0".into(),
                baud: None
            }
        );
        assert_eq!(
            Connection::parse("dev=/dev/ttyACM0:57600").unwrap(),
            Connection::Serial {
                device: "/dev/ttyACM0".into(),
                baud: Some(57600)
            }
        );
        assert_eq!(
            Connection::parse("COM3").unwrap(),
            Connection::Serial {
                device: "COM3".into(),
                baud: None
            }
        );
        // Out of range for u32
        assert!(Connection::parse("dev=/dev/ttyUSB0:99999999999").is_err());
    }

    #[test]
    fn test_parse_serial_path_with_colons() {
        let path = "/dev/serial/by-path/pci-0000:00:14.0-usb-0:1:1.0-port0";
        assert_eq!(
            Connection::parse(&format!("dev={}", path)).unwrap(),
            Connection::Serial {
                device: path.into(),
                baud: None
            }
        );
        assert_eq!(
            Connection::parse(&format!("dev={}:9600", path)).unwrap(),
            Connection::Serial {
                device: path.into(),
                baud: Some(9600)
            }
        );
        assert_eq!(
            Connection::parse("dev=/dev/ttyUSB0:fast").unwrap(),
            Connection::Serial {
                device: "/dev/ttyUSB0:fast".into(),
                baud: None
            }
        );
    }

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            Connection::parse("ip=192.168.1.10:2000").unwrap(),
            Connection::Tcp {
                host: "192.168.1.10".into(),
                port: 2000
            }
        );
        assert!(Connection::parse("ip=localhost").is_err());
        assert!(Connection::parse("foo=bar").is_err());
        assert!(Connection::parse("").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for s in ["dev=/dev/ttyUSB0", "dev=/dev/ttyUSB0:9600", "ip=bridge:4000"] {
            assert_eq!(Connection::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_open_missing_device() {
        assert!(matches!(
            open_transport("dev=/nonexistent/romflash-port"),
            Err(LinkError::TransportUnavailable(_))
        ));
        assert!(matches!(
            open_transport("bogus=1"),
            Err(LinkError::InvalidParameter(_))
        ));
    }
}
