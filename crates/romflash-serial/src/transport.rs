//! Transport layer abstraction for controller communication
//!
//! This module provides a unified interface for serial and TCP transports.
//! The link is a plain duplex byte stream; nothing here knows about device
//! naming conventions beyond handing the name to the OS.

use crate::error::{LinkError, Result};

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write bytes to the transport
    ///
    /// Blocks until every byte has been written.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read bytes from the transport
    ///
    /// Reads exactly `buf.len()` bytes into the buffer, blocking without a
    /// bound until they arrive.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Read with timeout
    ///
    /// Reads up to `buf.len()` bytes, waiting up to `timeout_ms` milliseconds.
    /// Returns the number of bytes read, or 0 if timeout.
    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        (**self).read_nonblock(buf, timeout_ms)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        (**self).read_nonblock(buf, timeout_ms)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

/// Fill `buf` from `reader`, retrying reads that time out
///
/// The OS handles carry a poll timeout, but the protocol has none: an
/// expired poll just starts the next one.
fn read_unbounded<R: std::io::Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(LinkError::Io("connection closed by peer".into())),
            Ok(n) => filled += n,
            Err(e) if is_timeout(&e) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LinkError::from(e)),
        }
    }
    Ok(())
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::protocol::DEFAULT_BAUD;
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};
    use std::time::Duration;

    /// Poll interval of the underlying port
    const POLL_TIMEOUT: Duration = Duration::from_millis(500);

    /// Serial port transport
    ///
    /// The port is closed exactly once, when the transport is dropped.
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
        device: String,
    }

    impl SerialTransport {
        /// Open a serial port with the specified baud rate
        ///
        /// If baud is `None`, uses the controller's fixed rate of 115200.
        pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
            let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(POLL_TIMEOUT)
                .open()
                .map_err(|e| LinkError::TransportUnavailable(format!("{}: {}", device, e)))?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self {
                port,
                device: device.to_string(),
            })
        }
    }

    impl Drop for SerialTransport {
        fn drop(&mut self) {
            log::debug!("Closing serial port {}", self.device);
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            read_unbounded(&mut self.port, buf)
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            // Set temporary timeout
            let old_timeout = self.port.timeout();
            self.port
                .set_timeout(Duration::from_millis(timeout_ms as u64))?;

            let result = match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if is_timeout(&e) => Ok(0),
                Err(e) => Err(LinkError::from(e)),
            };

            // Restore timeout
            self.port.set_timeout(old_timeout)?;
            result
        }

        fn flush(&mut self) -> Result<()> {
            self.port.flush()?;
            Ok(())
        }
    }
}

pub mod tcp {
    //! TCP socket transport implementation
    //!
    //! Useful when the controller's serial port is exported over the network
    //! (ser2net and similar bridges).

    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    /// Poll interval of the socket
    const POLL_TIMEOUT: Duration = Duration::from_millis(500);

    /// TCP socket transport
    pub struct TcpTransport {
        stream: TcpStream,
    }

    impl TcpTransport {
        /// Connect to a serial bridge at the specified host and port
        pub fn connect(host: &str, port: u16) -> Result<Self> {
            let addr = format!("{}:{}", host, port);
            log::info!("Connecting to serial bridge at {}", addr);

            let stream = TcpStream::connect(&addr)
                .map_err(|e| LinkError::TransportUnavailable(format!("{}: {}", addr, e)))?;

            // Set TCP_NODELAY to reduce latency
            stream.set_nodelay(true).map_err(|e| {
                LinkError::TransportUnavailable(format!("Failed to set TCP_NODELAY: {}", e))
            })?;

            stream.set_read_timeout(Some(POLL_TIMEOUT)).map_err(|e| {
                LinkError::TransportUnavailable(format!("Failed to set read timeout: {}", e))
            })?;

            log::info!("Connected to serial bridge at {}", addr);

            Ok(Self { stream })
        }
    }

    impl Transport for TcpTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.stream.write_all(data)?;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            read_unbounded(&mut self.stream, buf)
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            // Set temporary timeout; a zero duration is rejected by the OS
            let timeout = Duration::from_millis(u64::from(timeout_ms.max(1)));
            self.stream.set_read_timeout(Some(timeout))?;

            let result = match self.stream.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if is_timeout(&e) => Ok(0),
                Err(e) => Err(LinkError::from(e)),
            };

            // Restore default timeout
            self.stream.set_read_timeout(Some(POLL_TIMEOUT))?;
            result
        }

        fn flush(&mut self) -> Result<()> {
            self.stream.flush()?;
            Ok(())
        }
    }
}
