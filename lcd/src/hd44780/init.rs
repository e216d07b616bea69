use super::bus::Bus;
use crate::geometry::Geometry;
use crate::{BitMode, LcdResult};
use log::debug;
use std::thread::sleep;
use std::time::Duration;

/// Delay between the early function-set retries, while the controller may
/// still be busy with its power-on reset.
const SYNC_DELAY: Duration = Duration::from_micros(4500);
/// The clear command takes an order of magnitude longer than ordinary
/// instructions.
const CLEAR_DELAY: Duration = Duration::from_millis(2);

/// Drives the controller from an arbitrary power-on state into a known
/// one: correct interface width, display on, cursor off, increment entry
/// mode, RAM blanked.
///
/// Write-only protocol — there is no acknowledgment to check, so the only
/// failures are transport I/O errors, propagated unchanged.
pub(crate) fn initialize(bus: &mut Bus<'_>, geometry: &Geometry) -> LcdResult<()> {
    debug!(
        "initializing {}x{} display over a {:?}-bit interface",
        geometry.columns,
        geometry.rows,
        bus.bit_mode()
    );

    match bus.bit_mode() {
        BitMode::Four => {
            // The controller may wake up in 8-bit mode or half-way through
            // a 4-bit transfer. Repeating the 0x3 nibble forces every
            // interpretation back into the 8-bit state; single nibbles
            // here, since the controller has not yet been told how many
            // transfers make up one command.
            for _ in 0..3 {
                bus.sync(&[0x03])?;
                sleep(SYNC_DELAY);
                bus.sync(&[0x03])?;
                sleep(SYNC_DELAY);
                bus.sync(&[0x03, 0x03])?;
            }
            // Drop to the 4-bit interface. The trailing 0x2 nibble is the
            // upper half of a function-set with the data-length bit clear.
            bus.sync(&[0x03])?;
            bus.sync(&[0x03])?;
            bus.sync(&[0x03, 0x02])?;
        }
        BitMode::Eight => {
            for _ in 0..3 {
                bus.sync(&[0x30])?;
                sleep(SYNC_DELAY);
            }
        }
    }

    bus.function_set(bus.bit_mode() == BitMode::Eight, geometry.rows >= 2)?;
    bus.display_control(false, false, false)?;
    bus.entry_mode(true, false)?;
    bus.display_control(true, false, false)?;
    // Visit both DDRAM bank bases once so the address counter is exercised
    // across the whole character RAM before the clear.
    bus.set_ddram_address(0x00)?;
    bus.set_ddram_address(0x40)?;
    bus.clear()?;
    sleep(CLEAR_DELAY);
    // Clear only guarantees the visible window; pad one row's worth of
    // spaces into each bank so stale RAM cannot scroll into view.
    for _ in 0..2 {
        bus.write_data(&vec![0x20; geometry.columns as usize])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{nibbles, Call, RecordingTransport};

    #[test]
    fn four_bit_sequence() {
        let mut serial = RecordingTransport::new(BitMode::Four);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        initialize(&mut bus, &Geometry::new(16, 2)).unwrap();

        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.push(Call::Command(vec![0x03]));
            expected.push(Call::Command(vec![0x03]));
            expected.push(Call::Command(vec![0x03, 0x03]));
        }
        expected.push(Call::Command(vec![0x03]));
        expected.push(Call::Command(vec![0x03]));
        expected.push(Call::Command(vec![0x03, 0x02]));
        for byte in [0x28, 0x08, 0x06, 0x0c, 0x80, 0xc0, 0x01] {
            expected.push(Call::Command(nibbles(&[byte])));
        }
        expected.push(Call::Data(nibbles(&[0x20; 16])));
        expected.push(Call::Data(nibbles(&[0x20; 16])));

        assert_eq!(log.borrow().as_slice(), expected.as_slice());
    }

    #[test]
    fn eight_bit_sequence() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        initialize(&mut bus, &Geometry::new(16, 2)).unwrap();

        let mut expected = vec![Call::Command(vec![0x30]); 3];
        for byte in [0x38, 0x08, 0x06, 0x0c, 0x80, 0xc0, 0x01] {
            expected.push(Call::Command(vec![byte]));
        }
        expected.push(Call::Data(vec![0x20; 16]));
        expected.push(Call::Data(vec![0x20; 16]));

        assert_eq!(log.borrow().as_slice(), expected.as_slice());
    }

    #[test]
    fn single_row_modules_stay_in_one_line_mode() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        initialize(&mut bus, &Geometry::new(8, 1)).unwrap();
        // the function-set after the sync preamble keeps the two-line bit
        // clear, and the blanking bursts shrink to the row length
        assert_eq!(log.borrow()[3], Call::Command(vec![0x20]));
        assert_eq!(log.borrow()[10], Call::Data(vec![0x20; 8]));
        assert_eq!(log.borrow()[11], Call::Data(vec![0x20; 8]));
    }
}
