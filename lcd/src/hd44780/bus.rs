use crate::{BitMode, LcdError, LcdResult, Transport};
use log::trace;

/// Shadow copy of the controller's address counter.
///
/// The hardware register cannot be read back over a write-only wiring, so
/// every command that moves it is mirrored here. Run-contiguity decisions
/// in the renderer are made from this shadow alone.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum AddressState {
    /// Power-on, or mid-synchronization: nothing can be assumed.
    Unknown,
    /// Somewhere in character generator RAM.
    Cgram,
    /// At this display data RAM address.
    Ddram(u8),
}

/// Byte-level access to the controller, on top of a word-level transport.
///
/// Splits commands and data bursts into nibble pairs in 4-bit mode and
/// keeps the [AddressState] shadow current.
#[derive(Debug)]
pub(crate) struct Bus<'a> {
    transport: &'a mut dyn Transport,
    bit_mode: BitMode,
    address: AddressState,
}

impl<'a> Bus<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport) -> Self {
        let bit_mode = transport.bit_mode();
        Bus {
            transport,
            bit_mode,
            address: AddressState::Unknown,
        }
    }

    pub(crate) fn bit_mode(&self) -> BitMode {
        self.bit_mode
    }

    pub(crate) fn address(&self) -> AddressState {
        self.address
    }

    /// Sends raw bus words for the interface-width synchronization
    /// preamble. Until that preamble is done the controller does not yet
    /// know how many transfers make up one command, so these bypass the
    /// usual byte packing.
    pub(crate) fn sync(&mut self, words: &[u8]) -> LcdResult<()> {
        trace!("sync {:x?}", words);
        self.address = AddressState::Unknown;
        self.transport.command(words)
    }

    fn command(&mut self, byte: u8) -> LcdResult<()> {
        trace!("command {:#04x}", byte);
        match self.bit_mode {
            BitMode::Four => self.transport.command(&[byte >> 4, byte & 0x0f]),
            BitMode::Eight => self.transport.command(&[byte]),
        }
    }

    /// Sets the interface width and line count.
    pub(crate) fn function_set(&mut self, eight_bit: bool, two_lines: bool) -> LcdResult<()> {
        let mut command = 0b00100000;
        if eight_bit {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        self.command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    pub(crate) fn display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.command(command)
    }

    /// Sets how the address counter moves after each data transfer.
    pub(crate) fn entry_mode(&mut self, increment: bool, shift: bool) -> LcdResult<()> {
        let mut command = 0b00000100;
        if increment {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.command(command)
    }

    /// Clears the display and returns the address counter to zero.
    pub(crate) fn clear(&mut self) -> LcdResult<()> {
        self.command(0b00000001)?;
        self.address = AddressState::Ddram(0);
        Ok(())
    }

    /// Sets the DDRAM address.
    pub(crate) fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b01111111 {
            return Err(LcdError::InvalidArgument);
        }
        self.command(0b10000000 | address)?;
        self.address = AddressState::Ddram(address);
        Ok(())
    }

    /// Sets the CGRAM address.
    pub(crate) fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b00111111 {
            return Err(LcdError::InvalidArgument);
        }
        self.command(0b01000000 | address)?;
        self.address = AddressState::Cgram;
        Ok(())
    }

    /// Sends a data burst to the currently addressed RAM region.
    pub(crate) fn write_data(&mut self, bytes: &[u8]) -> LcdResult<()> {
        trace!("data burst of {} bytes", bytes.len());
        match self.bit_mode {
            BitMode::Four => {
                let nibbles: Vec<u8> = bytes.iter().flat_map(|&b| [b >> 4, b & 0x0f]).collect();
                self.transport.data(&nibbles)?;
            }
            BitMode::Eight => self.transport.data(bytes)?,
        }
        self.address = match self.address {
            AddressState::Ddram(base) => base
                .checked_add(bytes.len() as u8)
                .filter(|&a| a <= 0x7f)
                .map(AddressState::Ddram)
                .unwrap_or(AddressState::Unknown),
            other => other,
        };
        Ok(())
    }
}
