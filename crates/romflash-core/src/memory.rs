//! Memory type catalogue and target region sizing
//!
//! The controller identifies a device by its type code, which is the size of
//! the part in Kbit (the digits after the `27` family prefix). One unit of
//! type code corresponds to 128 bytes of storage.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};

/// Number of bytes per type-code unit (1 Kbit)
pub const BYTES_PER_TYPE_UNIT: usize = 128;

/// Supported UV-erasable EPROM parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// 2716, 2 KiB
    M2716,
    /// 2732, 4 KiB
    M2732,
    /// 2764, 8 KiB
    M2764,
    /// 27128, 16 KiB
    M27128,
    /// 27256, 32 KiB
    M27256,
    /// 27512, 64 KiB
    M27512,
}

impl MemoryType {
    /// Every memory type the controller understands, smallest first
    pub const ALL: [MemoryType; 6] = [
        MemoryType::M2716,
        MemoryType::M2732,
        MemoryType::M2764,
        MemoryType::M27128,
        MemoryType::M27256,
        MemoryType::M27512,
    ];

    /// Type code sent to the controller in read and write requests
    pub const fn type_code(self) -> u16 {
        match self {
            MemoryType::M2716 => 16,
            MemoryType::M2732 => 32,
            MemoryType::M2764 => 64,
            MemoryType::M27128 => 128,
            MemoryType::M27256 => 256,
            MemoryType::M27512 => 512,
        }
    }

    /// Look up a memory type by its type code
    pub fn from_type_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.type_code() == code)
    }

    /// Part number as printed on the package
    pub const fn part_name(self) -> &'static str {
        match self {
            MemoryType::M2716 => "2716",
            MemoryType::M2732 => "2732",
            MemoryType::M2764 => "2764",
            MemoryType::M27128 => "27128",
            MemoryType::M27256 => "27256",
            MemoryType::M27512 => "27512",
        }
    }

    /// Storage capacity in bytes
    pub const fn capacity(self) -> usize {
        self.type_code() as usize * BYTES_PER_TYPE_UNIT
    }

    /// Region covering the whole device
    pub const fn region(self) -> MemoryRegion {
        MemoryRegion::new(self)
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part_name())
    }
}

impl FromStr for MemoryType {
    type Err = Error;

    /// Accepts a part number (`2732`, `27C32`) or a bare type code (`32`)
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = match s.strip_prefix("27") {
            Some(rest) if !rest.is_empty() => rest
                .strip_prefix('C')
                .or_else(|| rest.strip_prefix('c'))
                .unwrap_or(rest),
            _ => s,
        };
        let code: u16 = digits.parse().map_err(|_| Error::UnknownMemoryType)?;
        Self::from_type_code(code).ok_or(Error::UnknownMemoryType)
    }
}

/// The addressed device being read or written during one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    memory_type: MemoryType,
}

impl MemoryRegion {
    /// Create a region spanning the whole device
    pub const fn new(memory_type: MemoryType) -> Self {
        Self { memory_type }
    }

    /// Device type of this region
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Type code of the device
    pub fn type_code(&self) -> u16 {
        self.memory_type.type_code()
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.memory_type.capacity()
    }

    /// Check that `len` bytes fit into this region
    pub fn check_fits(&self, len: usize) -> Result<()> {
        let capacity = self.capacity();
        if len > capacity {
            return Err(Error::ImageTooLarge { len, capacity });
        }
        Ok(())
    }
}

impl From<MemoryType> for MemoryRegion {
    fn from(memory_type: MemoryType) -> Self {
        Self::new(memory_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_type_code() {
        assert_eq!(MemoryType::M2716.capacity(), 2048);
        assert_eq!(MemoryType::M2732.capacity(), 32 * 128);
        assert_eq!(MemoryType::M2732.capacity(), 4096);
        assert_eq!(MemoryType::M27512.capacity(), 65536);
    }

    #[test]
    fn test_parse_memory_type() {
        assert_eq!("2732".parse::<MemoryType>().unwrap(), MemoryType::M2732);
        assert_eq!("27C256".parse::<MemoryType>().unwrap(), MemoryType::M27256);
        assert_eq!("27c64".parse::<MemoryType>().unwrap(), MemoryType::M2764);
        assert_eq!("32".parse::<MemoryType>().unwrap(), MemoryType::M2732);
        assert_eq!(" 512 ".parse::<MemoryType>().unwrap(), MemoryType::M27512);
        assert_eq!("2748".parse::<MemoryType>(), Err(Error::UnknownMemoryType));
        assert_eq!("27".parse::<MemoryType>(), Err(Error::UnknownMemoryType));
        assert_eq!("".parse::<MemoryType>(), Err(Error::UnknownMemoryType));
    }

    #[test]
    fn test_type_code_lookup() {
        for memory in MemoryType::ALL {
            assert_eq!(MemoryType::from_type_code(memory.type_code()), Some(memory));
        }
        assert_eq!(MemoryType::from_type_code(48), None);
    }

    #[test]
    fn test_region_rejects_oversized_image() {
        let region = MemoryType::M2732.region();
        assert!(region.check_fits(4096).is_ok());
        assert_eq!(
            region.check_fits(4097),
            Err(Error::ImageTooLarge {
                len: 4097,
                capacity: 4096
            })
        );
    }
}
