pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM function commands, sent right after a reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Address one device by the 64 bit ROM that follows
    MatchRom = 0x55,
    /// Start a search walk
    SearchRom = 0xF0,
    /// Address every device on the bus
    SkipRom = 0xCC,
    /// Read the ROM of the only device on the bus
    ReadRom = 0x33,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

impl OpCode for u8 {
    fn op_code(&self) -> u8 {
        *self
    }
}
