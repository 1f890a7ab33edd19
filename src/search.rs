use crate::{Address, Command, Driver, Error, IoWire};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// State of a ROM search, owned by the caller and handed to
/// [`Driver::search_next`] once per device.
///
/// Bit positions are counted from 1 (least significant bit of the family code)
/// to 64 (most significant bit of the CRC), 0 meaning none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSearch {
    address: [u8; Address::BYTES as usize],
    last_discrepancy: u8,
    last_device_found: bool,
}

impl DeviceSearch {
    pub fn new() -> DeviceSearch {
        DeviceSearch::default()
    }

    /// Biases the first walk toward devices of the given family. Devices of
    /// other families may still be returned, check the family code.
    pub fn new_for_family(family: u8) -> DeviceSearch {
        let mut search = DeviceSearch::new();
        search.address[0] = family;
        search.last_discrepancy = Address::BITS;
        search
    }

    /// Starts over with an empty state
    pub fn restart(&mut self) {
        *self = DeviceSearch::default();
    }

    /// Whether the last device has been returned already
    pub fn is_exhausted(&self) -> bool {
        self.last_device_found
    }

    /// Position of the last branch where the zero path was taken, 0 if there is none
    pub fn last_discrepancy(&self) -> u8 {
        self.last_discrepancy
    }

    fn is_bit_set_in_address(&self, bit: u8) -> bool {
        DeviceSearch::is_bit_set(&self.address, bit)
    }

    fn write_bit_in_address(&mut self, bit: u8, value: bool) {
        if value {
            DeviceSearch::set_bit(&mut self.address, bit);
        } else {
            DeviceSearch::reset_bit(&mut self.address, bit);
        }
    }

    fn is_bit_set(array: &[u8], bit: u8) -> bool {
        let index = bit / 8;
        let offset = bit % 8;
        array[index as usize] & (0x01 << offset) != 0x00
    }

    fn set_bit(array: &mut [u8], bit: u8) {
        let index = bit / 8;
        let offset = bit % 8;
        array[index as usize] |= 0x01 << offset
    }

    fn reset_bit(array: &mut [u8], bit: u8) {
        let index = bit / 8;
        let offset = bit % 8;
        array[index as usize] &= !(0x01 << offset)
    }

    pub fn into_iter<'a, W: IoWire, Delay: DelayNs>(
        self,
        wire: &'a mut Driver<W>,
        delay: &'a mut Delay,
    ) -> DeviceSearchIter<'a, W, Delay> {
        DeviceSearchIter {
            search: Some(self),
            wire,
            delay,
        }
    }
}

/// Yields every device on the bus once, stops after the last one or the first error.
/// The search state is dropped on error, start a new search to retry.
pub struct DeviceSearchIter<'a, W: IoWire, Delay: DelayNs> {
    search: Option<DeviceSearch>,
    wire: &'a mut Driver<W>,
    delay: &'a mut Delay,
}

impl<'a, W: IoWire, Delay: DelayNs> Iterator for DeviceSearchIter<'a, W, Delay> {
    type Item = Result<Address, Error<W::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut search = self.search.take()?;
        let result = self
            .wire
            .search_next(&mut search, &mut *self.delay)
            .transpose()?;
        if result.is_ok() {
            self.search = Some(search);
        }
        Some(result)
    }
}

impl<E: Debug, W: IoWire<Error = E>> Driver<W> {
    /// Walks the ROM search tree once and returns the next device, or `None`
    /// when there is none left, the bus is empty or every device dropped out
    /// during the walk. In the latter two cases the search state is reset.
    ///
    /// Based on the search algorithm of Maxim Application Note 187.
    pub fn search_next(
        &mut self,
        search: &mut DeviceSearch,
        delay: &mut impl DelayNs,
    ) -> Result<Option<Address>, Error<E>> {
        if search.last_device_found {
            return Ok(None);
        }

        if !self.reset(delay)? {
            log::debug!("search: no presence pulse");
            search.restart();
            return Ok(None);
        }

        self.write_command(delay, Command::SearchRom)?;

        let mut last_zero = 0;
        for id_bit_number in 1..=Address::BITS {
            let bit = id_bit_number - 1;
            let id_bit = self.read_bit(delay)?;
            let cmp_id_bit = self.read_bit(delay)?;

            if id_bit && cmp_id_bit {
                log::debug!("search: no device responded at bit {}", id_bit_number);
                search.restart();
                return Ok(None);
            }

            let direction = if id_bit != cmp_id_bit {
                // every remaining device agrees
                id_bit
            } else {
                let direction = if id_bit_number < search.last_discrepancy {
                    search.is_bit_set_in_address(bit)
                } else {
                    id_bit_number == search.last_discrepancy
                };
                if !direction {
                    last_zero = id_bit_number;
                }
                direction
            };

            search.write_bit_in_address(bit, direction);
            self.write_bit(delay, direction)?;
        }

        search.last_discrepancy = last_zero;
        search.last_device_found = last_zero == 0;

        let address = Address::from(search.address);
        if address.family_code() == 0 {
            log::debug!("search: ignoring {}", address);
            search.restart();
            return Ok(None);
        }
        if !address.is_valid() {
            log::warn!("search: {} has an invalid crc", address);
        }
        log::debug!("search: found {}", address);
        Ok(Some(address))
    }

    /// Checks whether the device with the given ROM is on the bus, using a
    /// single search walk that follows its bits.
    pub fn verify(
        &mut self,
        delay: &mut impl DelayNs,
        address: &Address,
    ) -> Result<bool, Error<E>> {
        let mut search = DeviceSearch {
            address: **address,
            last_discrepancy: Address::BITS,
            last_device_found: false,
        };
        Ok(self.search_next(&mut search, delay)? == Some(*address))
    }
}
