//! Simulated bus with a set of devices answering reset, ROM commands and
//! search walks. The line and the delay share one clock so the devices see the
//! slot timing the master generates.

extern crate std;

use crate::Driver;
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use std::{cell::RefCell, rc::Rc, vec::Vec};

// a low pulse shorter than this starts a write-one or a read slot
const SHORT_SLOT_NS: u64 = 15_000;
const RESET_MIN_NS: u64 = 480_000;
const PRESENCE_FROM_NS: u64 = 15_000;
const PRESENCE_UNTIL_NS: u64 = 240_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Id,
    Complement,
    Direction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DeviceState {
    Idle,
    RomCommand { byte: u8, bits: u8 },
    Search { bit: u8, phase: Phase },
    Match { bit: u8 },
    ReadRom { bit: u8 },
    Selected,
}

struct Device {
    rom: [u8; 8],
    state: DeviceState,
}

impl Device {
    fn rom_bit(&self, bit: u8) -> bool {
        self.rom[usize::from(bit / 8)] & (1 << (bit % 8)) != 0
    }

    fn on_write(&mut self, value: bool) {
        self.state = match self.state {
            DeviceState::RomCommand { byte, bits } => {
                let byte = byte | (u8::from(value) << bits);
                if bits < 7 {
                    DeviceState::RomCommand {
                        byte,
                        bits: bits + 1,
                    }
                } else {
                    match byte {
                        0xF0 => DeviceState::Search {
                            bit: 0,
                            phase: Phase::Id,
                        },
                        0x55 => DeviceState::Match { bit: 0 },
                        0x33 => DeviceState::ReadRom { bit: 0 },
                        0xCC => DeviceState::Selected,
                        _ => DeviceState::Idle,
                    }
                }
            }
            DeviceState::Search {
                bit,
                phase: Phase::Direction,
            } => {
                if value != self.rom_bit(bit) {
                    DeviceState::Idle
                } else if bit == 63 {
                    DeviceState::Selected
                } else {
                    DeviceState::Search {
                        bit: bit + 1,
                        phase: Phase::Id,
                    }
                }
            }
            DeviceState::Search { .. } => DeviceState::Idle,
            DeviceState::Match { bit } => {
                if value != self.rom_bit(bit) {
                    DeviceState::Idle
                } else if bit == 63 {
                    DeviceState::Selected
                } else {
                    DeviceState::Match { bit: bit + 1 }
                }
            }
            state => state,
        };
    }

    /// Level this device leaves on the line during a read slot
    fn on_read(&mut self) -> bool {
        match self.state {
            DeviceState::Search {
                bit,
                phase: Phase::Id,
            } => {
                self.state = DeviceState::Search {
                    bit,
                    phase: Phase::Complement,
                };
                self.rom_bit(bit)
            }
            DeviceState::Search {
                bit,
                phase: Phase::Complement,
            } => {
                self.state = DeviceState::Search {
                    bit,
                    phase: Phase::Direction,
                };
                !self.rom_bit(bit)
            }
            DeviceState::ReadRom { bit } => {
                self.state = if bit == 63 {
                    DeviceState::Selected
                } else {
                    DeviceState::ReadRom { bit: bit + 1 }
                };
                self.rom_bit(bit)
            }
            _ => true,
        }
    }
}

struct Bus {
    now_ns: u64,
    shorted: bool,
    devices: Vec<Device>,
    driven_low_since: Option<u64>,
    short_slot_since: Option<u64>,
    released_from_reset: Option<u64>,
    resets: usize,
    written: Vec<u8>,
    write_byte: u8,
    write_bits: u8,
}

impl Bus {
    fn master_write(&mut self, value: bool) {
        self.write_byte |= u8::from(value) << self.write_bits;
        self.write_bits += 1;
        if self.write_bits == 8 {
            self.written.push(self.write_byte);
            self.write_byte = 0;
            self.write_bits = 0;
        }
        for device in self.devices.iter_mut() {
            device.on_write(value);
        }
    }

    fn master_read(&mut self) -> bool {
        // wired-and, any device holding a zero wins
        self.devices
            .iter_mut()
            .fold(true, |line, device| device.on_read() & line)
    }

    /// A short slot nobody sampled in time was a write-one
    fn settle_short_slot(&mut self) {
        if let Some(start) = self.short_slot_since {
            if self.now_ns - start >= SHORT_SLOT_NS {
                self.short_slot_since = None;
                self.master_write(true);
            }
        }
    }

    fn drive_low(&mut self) {
        if self.short_slot_since.take().is_some() {
            self.master_write(true);
        }
        self.released_from_reset = None;
        self.driven_low_since = Some(self.now_ns);
    }

    fn release(&mut self) {
        let Some(start) = self.driven_low_since.take() else {
            return;
        };
        let low = self.now_ns - start;
        if low >= RESET_MIN_NS {
            self.resets += 1;
            self.write_byte = 0;
            self.write_bits = 0;
            self.released_from_reset = Some(self.now_ns);
            for device in self.devices.iter_mut() {
                device.state = DeviceState::RomCommand { byte: 0, bits: 0 };
            }
        } else if low >= SHORT_SLOT_NS {
            self.master_write(false);
        } else {
            self.short_slot_since = Some(start);
        }
    }

    fn level(&mut self) -> bool {
        if self.shorted || self.driven_low_since.is_some() {
            return false;
        }
        if let Some(start) = self.short_slot_since {
            if self.now_ns - start < SHORT_SLOT_NS {
                self.short_slot_since = None;
                return self.master_read();
            }
        }
        self.settle_short_slot();
        if let Some(released) = self.released_from_reset {
            let since = self.now_ns - released;
            if !self.devices.is_empty() && (PRESENCE_FROM_NS..=PRESENCE_UNTIL_NS).contains(&since)
            {
                return false;
            }
        }
        true
    }
}

/// Handle on a simulated bus, hands out the pin and the delay sharing its clock.
pub(crate) struct Sim(Rc<RefCell<Bus>>);

pub(crate) struct SimPin(Rc<RefCell<Bus>>);

pub(crate) struct SimDelay(Rc<RefCell<Bus>>);

impl Sim {
    pub(crate) fn new(roms: &[[u8; 8]]) -> Self {
        Sim(Rc::new(RefCell::new(Bus {
            now_ns: 0,
            shorted: false,
            devices: roms
                .iter()
                .map(|rom| Device {
                    rom: *rom,
                    state: DeviceState::Idle,
                })
                .collect(),
            driven_low_since: None,
            short_slot_since: None,
            released_from_reset: None,
            resets: 0,
            written: Vec::new(),
            write_byte: 0,
            write_bits: 0,
        })))
    }

    /// A bus held low permanently
    pub(crate) fn shorted() -> Self {
        let sim = Sim::new(&[]);
        sim.0.borrow_mut().shorted = true;
        sim
    }

    pub(crate) fn driver(&self) -> Driver<(SimPin,)> {
        Driver::new((SimPin(self.0.clone()),))
    }

    pub(crate) fn delay(&self) -> SimDelay {
        SimDelay(self.0.clone())
    }

    pub(crate) fn now_us(&self) -> u64 {
        self.0.borrow().now_ns / 1_000
    }

    /// Number of reset pulses the devices have seen
    pub(crate) fn resets(&self) -> usize {
        self.0.borrow().resets
    }

    /// Every complete byte the master has written so far
    pub(crate) fn written(&self) -> Vec<u8> {
        let mut bus = self.0.borrow_mut();
        bus.settle_short_slot();
        bus.written.clone()
    }

    /// Which devices are currently addressed
    pub(crate) fn selected(&self) -> Vec<bool> {
        let mut bus = self.0.borrow_mut();
        bus.settle_short_slot();
        bus.devices
            .iter()
            .map(|device| device.state == DeviceState::Selected)
            .collect()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.borrow_mut().level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow_mut().level())
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().drive_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().release();
        Ok(())
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().now_ns += u64::from(ns);
    }
}
