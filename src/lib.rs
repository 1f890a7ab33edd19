#![no_std]
#![doc = include_str!("../README.md")]

mod address;
mod command;
mod crc;
mod driver;
mod iowire;
mod result;
mod search;
#[cfg(test)]
mod sim;

pub use address::{Address, AddressError};
pub use command::{Command, OpCode};
pub use crc::{
    check_crc16, compute_partial_crc8, crc16, crc8, crc8_bitwise, crc8_lookup, CRC8_TABLE,
};
pub use driver::Driver;
pub use iowire::{Inverted, IoWire, StrongPullup};
pub use result::Error;
pub use search::{DeviceSearch, DeviceSearchIter};
