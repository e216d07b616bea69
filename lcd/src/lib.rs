pub mod bitmap;
pub mod font;
pub mod geometry;
pub mod hd44780;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("unsupported display mode: {columns}x{rows}")]
    DisplayMode { columns: u32, rows: u32 },
    #[error("this interface does not support a backlight")]
    UnsupportedPlatform,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for LcdError {
    fn from(err: std::io::Error) -> Self {
        LcdError::Io(err.kind())
    }
}

pub type LcdResult<T> = Result<T, LcdError>;

/// Interface width of the controller's parallel bus.
///
/// In 4-bit mode every byte crosses the wire as two nibble transfers,
/// high nibble first. The width is a property of the wiring, so it is
/// declared by the transport and fixed for the lifetime of a device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BitMode {
    Four,
    Eight,
}

/// A write channel to an HD44780-family controller.
///
/// The protocol is fire-and-forget: there is no acknowledgment and no
/// read-back, so implementations only fail on transport-level I/O errors.
/// One `command` call carries exactly one controller command, already
/// split into bus words by the caller — nibbles in 4-bit mode, a single
/// byte in 8-bit mode. `data` carries a burst to whichever RAM region the
/// last address-set command selected.
pub trait Transport: Debug {
    /// The transfer width this adapter is wired for.
    fn bit_mode(&self) -> BitMode;

    /// Sends one command as raw bus words.
    fn command(&mut self, words: &[u8]) -> LcdResult<()>;

    /// Sends a data burst as raw bus words.
    fn data(&mut self, words: &[u8]) -> LcdResult<()>;

    /// Gets whether the adapter can switch a backlight, like the I2C
    /// backpacks that spend one expander line on it.
    fn supports_backlight(&self) -> bool {
        false
    }

    /// Maps a backlight pin to its bit in the backlight register.
    fn backlight_mask(&self, pin: u8) -> u8 {
        1 << pin
    }

    /// Sets the backlight register.
    ///
    /// # Errors
    /// - `LcdError::NotSupported` if the adapter has no backlight control.
    fn set_backlight(&mut self, _mask: u8) -> LcdResult<()> {
        Err(LcdError::NotSupported)
    }
}
