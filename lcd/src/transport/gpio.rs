//! Parallel GPIO transport using the character-device interface.

use crate::{BitMode, LcdResult, Transport};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;

/// Width of the enable strobe.
const ENABLE_PULSE: Duration = Duration::from_micros(1);
/// Hold time after the strobe, long enough for every instruction except
/// clear, which the initialization path pads on its own.
const SETTLE: Duration = Duration::from_micros(50);

enum DataBus {
    Four(gpiod::Lines<gpiod::Output>),
    Eight(gpiod::Lines<gpiod::Output>),
}

/// Direct wiring to the controller's parallel bus: RS and E control lines
/// plus a 4- or 8-line data bus, all requested from a gpiod chip.
///
/// The RW line is expected to be tied low — this transport only writes,
/// which is all the protocol model needs. There is no backlight control
/// here; a bare parallel header has no line to spend on one, so the
/// default [Transport] backlight behavior (unsupported) applies.
pub struct ParallelGpio {
    pin_rs: gpiod::Lines<gpiod::Output>,
    pin_e: gpiod::Lines<gpiod::Output>,
    data: DataBus,
}

impl Debug for ParallelGpio {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let width = match self.data {
            DataBus::Four(_) => 4,
            DataBus::Eight(_) => 8,
        };
        write!(f, "ParallelGpio[{}-bit]", width)
    }
}

impl ParallelGpio {
    /// Requests RS, E and four data lines (D4..D7 on the module, least
    /// significant first).
    pub fn new_4bit(chip: &gpiod::Chip, rs: u32, e: u32, data: [u32; 4]) -> LcdResult<Self> {
        Ok(ParallelGpio {
            pin_rs: request_output(chip, &[rs])?,
            pin_e: request_output(chip, &[e])?,
            data: DataBus::Four(request_output(chip, &data)?),
        })
    }

    /// Requests RS, E and all eight data lines, least significant first.
    pub fn new_8bit(chip: &gpiod::Chip, rs: u32, e: u32, data: [u32; 8]) -> LcdResult<Self> {
        Ok(ParallelGpio {
            pin_rs: request_output(chip, &[rs])?,
            pin_e: request_output(chip, &[e])?,
            data: DataBus::Eight(request_output(chip, &data)?),
        })
    }

    fn put(&self, word: u8) -> LcdResult<()> {
        match &self.data {
            DataBus::Four(lines) => {
                let mut values = [false; 4];
                for (i, value) in values.iter_mut().enumerate() {
                    *value = word & (1 << i) != 0;
                }
                lines.set_values(values)?;
            }
            DataBus::Eight(lines) => {
                let mut values = [false; 8];
                for (i, value) in values.iter_mut().enumerate() {
                    *value = word & (1 << i) != 0;
                }
                lines.set_values(values)?;
            }
        }
        self.pulse_enable()
    }

    fn pulse_enable(&self) -> LcdResult<()> {
        self.pin_e.set_values([true])?;
        sleep(ENABLE_PULSE);
        self.pin_e.set_values([false])?;
        sleep(SETTLE);
        Ok(())
    }
}

fn request_output(chip: &gpiod::Chip, pins: &[u32]) -> LcdResult<gpiod::Lines<gpiod::Output>> {
    Ok(chip.request_lines(
        gpiod::Options::output(pins.to_vec()).consumer(env!("CARGO_PKG_NAME")),
    )?)
}

impl Transport for ParallelGpio {
    fn bit_mode(&self) -> BitMode {
        match self.data {
            DataBus::Four(_) => BitMode::Four,
            DataBus::Eight(_) => BitMode::Eight,
        }
    }

    fn command(&mut self, words: &[u8]) -> LcdResult<()> {
        trace!("command words {:x?}", words);
        self.pin_rs.set_values([false])?;
        for &word in words {
            self.put(word)?;
        }
        Ok(())
    }

    fn data(&mut self, words: &[u8]) -> LcdResult<()> {
        trace!("data words {:x?}", words);
        self.pin_rs.set_values([true])?;
        for &word in words {
            self.put(word)?;
        }
        Ok(())
    }
}
