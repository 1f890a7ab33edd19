use crate::{Address, Command, Error, IoWire, OpCode, StrongPullup};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

// standard speed slot timings in microseconds
pub(crate) const WRITE_ONE_LOW_US: u32 = 6;
pub(crate) const WRITE_ONE_RELEASE_US: u32 = 64;
pub(crate) const WRITE_ZERO_LOW_US: u32 = 60;
pub(crate) const WRITE_ZERO_RELEASE_US: u32 = 10;
pub(crate) const WRITE_SLOT_US: u32 = 70;

pub(crate) const READ_INIT_US: u32 = 3;
pub(crate) const READ_SAMPLE_US: u32 = 7;
pub(crate) const READ_RECOVERY_US: u32 = 56;
pub(crate) const READ_SLOT_US: u32 = 66;

pub(crate) const RESET_LOW_US: u32 = 480;
pub(crate) const PRESENCE_SAMPLE_US: u32 = 70;
pub(crate) const RESET_RECOVERY_US: u32 = 410;
pub(crate) const IDLE_RETRIES: u32 = 125;
pub(crate) const IDLE_POLL_US: u32 = 2;

const _: () = assert!(WRITE_ONE_LOW_US + WRITE_ONE_RELEASE_US == WRITE_SLOT_US);
const _: () = assert!(WRITE_ZERO_LOW_US + WRITE_ZERO_RELEASE_US == WRITE_SLOT_US);
const _: () = assert!(READ_INIT_US + READ_SAMPLE_US + READ_RECOVERY_US == READ_SLOT_US);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetStatus {
    Presence,
    Empty,
    WireFault,
}

pub struct Driver<W: IoWire> {
    io_wire: W,
}

impl<E: Debug, W: IoWire<Error = E>> Driver<W> {
    pub fn new(io_wire: W) -> Self {
        Driver { io_wire }
    }

    /// Gives back the wire
    pub fn into_inner(self) -> W {
        self.io_wire
    }

    pub fn reset_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_read_only(
        &mut self,
        delay: &mut impl DelayNs,
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    pub fn reset_select_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        addr: &Address,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.select(delay, addr)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_select_read_only(
        &mut self,
        delay: &mut impl DelayNs,
        addr: &Address,
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.select(delay, addr)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_select_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        addr: &Address,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.select(delay, addr)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    pub fn reset_skip_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.skip_rom(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_read_only(
        &mut self,
        delay: &mut impl DelayNs,
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.skip_rom(delay)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.ensure_presence(delay)?;
        self.skip_rom(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    /// Addresses every device at once. Only meaningful with a single device on
    /// the bus, or for commands all devices interpret identically.
    pub fn skip_rom(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.write_command(delay, Command::SkipRom)
    }

    /// Addresses the device with the given ROM, byte 0 (family code) goes first.
    pub fn select(&mut self, delay: &mut impl DelayNs, addr: &Address) -> Result<(), E> {
        self.write_command(delay, Command::MatchRom)?;
        self.write_bytes(delay, addr.as_ref())
    }

    /// Performs a reset and listens for a presence pulse.
    ///
    /// Returns `Ok(true)` if at least one device answered. `Ok(false)` covers
    /// both an empty bus and a wire that never went high (shorted or missing
    /// pull-up), use [`ensure_presence`](Driver::ensure_presence) to tell them apart.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        Ok(self.reset_pulse(delay)? == ResetStatus::Presence)
    }

    /// Performs a reset, failing with [`Error::WireFault`] if the wire seems to
    /// be shortened or [`Error::NoPresence`] if no device answered.
    pub fn ensure_presence(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        match self.reset_pulse(delay)? {
            ResetStatus::Presence => Ok(()),
            ResetStatus::Empty => Err(Error::NoPresence),
            ResetStatus::WireFault => Err(Error::WireFault),
        }
    }

    fn reset_pulse(&mut self, delay: &mut impl DelayNs) -> Result<ResetStatus, E> {
        self.set_high()?;

        if !self.ensure_wire_high(delay)? {
            log::warn!("1-wire line stays low, bus shorted?");
            return Ok(ResetStatus::WireFault);
        }
        self.set_low()?;
        delay.delay_us(RESET_LOW_US);

        let presence = critical_section::with(|_| {
            self.set_high()?;
            delay.delay_us(PRESENCE_SAMPLE_US);
            self.is_low()
        })?;
        delay.delay_us(RESET_RECOVERY_US);

        log::trace!("1-wire reset, presence: {}", presence);
        Ok(if presence {
            ResetStatus::Presence
        } else {
            ResetStatus::Empty
        })
    }

    fn ensure_wire_high(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        // an idle line passes on the first sample, the wait stays bounded by 125 polls of 2µs
        for _ in 0..IDLE_RETRIES {
            if self.is_high()? {
                return Ok(true);
            }
            delay.delay_us(IDLE_POLL_US);
        }
        Ok(false)
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Reads eight bits, least significant first
    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit(delay)? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    /// Generates a read slot and samples the line 10µs after its start.
    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        let val = critical_section::with(|_| {
            self.set_low()?;
            delay.delay_us(READ_INIT_US);
            self.set_high()?;
            delay.delay_us(READ_SAMPLE_US);
            self.is_high()
        })?;
        delay.delay_us(READ_RECOVERY_US);
        Ok(val)
    }

    pub fn write_command(&mut self, delay: &mut impl DelayNs, cmd: impl OpCode) -> Result<(), E> {
        self.write_byte(delay, cmd.op_code())
    }

    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(delay, *b)?;
        }
        Ok(())
    }

    /// Writes eight bits, least significant first. The line is left released,
    /// call [`power`](Driver::power) afterwards if the device needs strong power.
    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), E> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(delay, (byte & 0x01) == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    /// Generates a write slot. Both values take the same time.
    pub fn write_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<(), E> {
        let (low_us, release_us) = if high {
            (WRITE_ONE_LOW_US, WRITE_ONE_RELEASE_US)
        } else {
            (WRITE_ZERO_LOW_US, WRITE_ZERO_RELEASE_US)
        };
        critical_section::with(|_| {
            self.set_low()?;
            delay.delay_us(low_us);
            self.set_high()
        })?;
        delay.delay_us(release_us);
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn set_high(&mut self) -> Result<(), E> {
        self.io_wire.set_high()
    }

    #[inline(always)]
    pub(crate) fn set_low(&mut self) -> Result<(), E> {
        self.io_wire.set_low()
    }

    #[inline(always)]
    pub(crate) fn is_high(&mut self) -> Result<bool, E> {
        self.io_wire.is_high()
    }

    #[inline(always)]
    pub(crate) fn is_low(&mut self) -> Result<bool, E> {
        self.io_wire.is_low()
    }
}

impl<E: Debug, W: StrongPullup<Error = E>> Driver<W> {
    /// Actively drives the line high, e.g. to power a parasitic device through
    /// a temperature conversion. Call [`depower`](Driver::depower) or
    /// [`reset`](Driver::reset) to let the line float again.
    pub fn power(&mut self) -> Result<(), E> {
        self.set_high()?;
        self.io_wire.set_strong_pullup(true)
    }

    /// Returns the line to open-drain idle
    pub fn depower(&mut self) -> Result<(), E> {
        self.io_wire.set_strong_pullup(false)
    }
}
