use crate::{crc8, Command, DeviceSearch, Driver, Error, IoWire, OpCode};
use byteorder::{ByteOrder, LittleEndian};
use core::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::Deref,
    str::FromStr,
};
use embedded_hal::delay::DelayNs;

/// 64 bit device ROM: family code, 48 bit serial number and a CRC-8 over both,
/// in the order they travel over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Address {
    raw: [u8; Self::BYTES as usize],
}

impl Default for Address {
    fn default() -> Self {
        Self::from([0; Self::BYTES as usize])
    }
}

impl From<[u8; Self::BYTES as usize]> for Address {
    fn from(raw: [u8; Self::BYTES as usize]) -> Self {
        Address { raw }
    }
}

impl From<Address> for [u8; Address::BYTES as usize] {
    fn from(addr: Address) -> [u8; Address::BYTES as usize] {
        addr.raw
    }
}

/// The family code ends up in the least significant byte, the CRC in the most
/// significant one.
impl From<u64> for Address {
    fn from(value: u64) -> Self {
        let mut raw = [0; Self::BYTES as usize];
        LittleEndian::write_u64(&mut raw, value);
        Address { raw }
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> u64 {
        LittleEndian::read_u64(&addr.raw)
    }
}

impl Deref for Address {
    type Target = [u8; Self::BYTES as usize];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.deref() as _
    }
}

impl Address {
    /// The length of device address in bytes
    pub const BYTES: u8 = 8;

    /// The length of device address in bits
    pub const BITS: u8 = Self::BYTES * 8;

    pub fn family_code(&self) -> u8 {
        self[0]
    }

    /// The 48 bit serial number
    pub fn serial(&self) -> &[u8] {
        &self[1..7]
    }

    pub fn crc8(&self) -> u8 {
        self[7]
    }

    /// Whether the last byte is the CRC-8 of the first seven
    pub fn is_valid(&self) -> bool {
        crc8(&self[..7]) == self.crc8()
    }

    pub fn ensure_valid<E: Debug>(&self) -> Result<(), Error<E>> {
        let computed = crc8(&self[..7]);
        if computed != self.crc8() {
            Err(Error::CrcMismatch(computed, self.crc8()))
        } else {
            Ok(())
        }
    }

    pub fn ensure_family<E: Debug>(&self, family_code: u8) -> Result<(), Error<E>> {
        if self.family_code() != family_code {
            Err(Error::FamilyCodeMismatch(family_code, self.family_code()))
        } else {
            Ok(())
        }
    }
}

/// Error type
#[derive(Debug, PartialEq, Eq)]
pub enum AddressError {
    NotEnough,
    Invalid,
}

fn hex_to_u8(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = [0_u8; Self::BYTES as usize];
        let mut chars = s.chars().filter(|c| !c.is_whitespace() && *c != ':');

        for byte in raw.iter_mut() {
            match (chars.next(), chars.next()) {
                (Some(h), Some(l)) => match (hex_to_u8(h), hex_to_u8(l)) {
                    (Some(h), Some(l)) => {
                        *byte = (h << 4) | l;
                    }
                    _ => return Err(AddressError::Invalid),
                },
                _ => return Err(AddressError::NotEnough),
            }
        }
        if chars.next().is_some() {
            return Err(AddressError::Invalid);
        }

        Ok(Address::from(raw))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}

impl Address {
    /// Reads the ROM of the only device on the bus. With several devices
    /// the result is the wired-and of their ROMs and fails the CRC check.
    pub fn get_single<W: IoWire>(
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Self, Error<W::Error>> {
        let mut raw = [0_u8; Self::BYTES as usize];
        driver.reset_write_read(delay, &[Command::ReadRom.op_code()], &mut raw)?;
        let address = Address::from(raw);
        address.ensure_valid::<W::Error>()?;
        Ok(address)
    }

    /// Looks for the first device of the given family. The search is seeded
    /// with the family code, other families can still come up and are skipped.
    pub fn search_first<W: IoWire>(
        driver: &mut Driver<W>,
        delay: &mut impl DelayNs,
        family_code: u8,
    ) -> Result<Option<Self>, Error<W::Error>> {
        let mut search = DeviceSearch::new_for_family(family_code);
        while let Some(address) = driver.search_next(&mut search, delay)? {
            if family_code == address.family_code() {
                return Ok(Some(address));
            }
        }
        Ok(None)
    }
}
