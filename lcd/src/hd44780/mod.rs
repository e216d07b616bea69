//! HD44780 character LCD device.
//!
//! The device takes whole frames: [HD44780::display] partitions a
//! monochrome [Bitmap] into 5x8 character cells, sends cells that match a
//! font glyph as plain ASCII, and synthesizes the rest through the
//! eight-slot CGRAM glyph cache.

mod bus;
mod cgram;
mod init;
mod render;

use crate::bitmap::Bitmap;
use crate::font::Font;
use crate::geometry::{Geometry, CELL_HEIGHT, CELL_WIDTH};
use crate::{LcdError, LcdResult, Transport};
use log::debug;

/// Construction parameters for [HD44780].
///
/// The interface width is not part of the config: the transport declares
/// it, and the wiring cannot be second-guessed from software.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub geometry: Geometry,
    /// Backlight line on adapters that route one, e.g. I2C backpacks.
    pub backlight_pin: Option<u8>,
    /// Index of the built-in font to classify against, see
    /// [Font::by_index].
    pub font: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            geometry: Geometry::new(16, 2),
            backlight_pin: None,
            font: 0,
        }
    }
}

/// Driver for an HD44780-family controller behind a [Transport].
///
/// All operations are synchronous blocking writes; the device performs no
/// locking, so concurrent use has to be serialized by the caller.
#[derive(Debug)]
pub struct HD44780<'a> {
    bus: bus::Bus<'a>,
    geometry: Geometry,
    font: &'static Font,
    renderer: render::Renderer,
}

impl<'a> HD44780<'a> {
    /// Validates the configuration, sets up the backlight if one was
    /// requested, and runs the controller's power-on initialization.
    ///
    /// # Errors
    /// - [LcdError::DisplayMode] if the geometry is not a supported mode.
    /// - [LcdError::InvalidArgument] if the font index is out of range.
    /// - [LcdError::UnsupportedPlatform] if a backlight pin was requested
    ///   on a transport without backlight control. No command reaches the
    ///   controller in any of these cases.
    pub fn new(transport: &'a mut dyn Transport, config: DeviceConfig) -> LcdResult<Self> {
        let geometry = config.geometry;
        if !geometry.is_supported() {
            return Err(LcdError::DisplayMode {
                columns: geometry.columns,
                rows: geometry.rows,
            });
        }
        let font = Font::by_index(config.font).ok_or(LcdError::InvalidArgument)?;

        if let Some(pin) = config.backlight_pin {
            if !transport.supports_backlight() {
                return Err(LcdError::UnsupportedPlatform);
            }
            let mask = transport.backlight_mask(pin);
            transport.set_backlight(mask)?;
        }

        let mut bus = bus::Bus::new(transport);
        init::initialize(&mut bus, &geometry)?;
        let renderer = render::Renderer::new(font, &geometry);
        debug!("{}x{} display ready, font {}", geometry.columns, geometry.rows, font.name());

        Ok(HD44780 {
            bus,
            geometry,
            font,
            renderer,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The font frames are classified against.
    pub fn font(&self) -> &'static Font {
        self.font
    }

    /// Gets one of the built-in fonts by index.
    pub fn get_font(&self, index: usize) -> LcdResult<&'static Font> {
        Font::by_index(index).ok_or(LcdError::InvalidArgument)
    }

    /// Accepted and ignored: the controller family has no contrast
    /// register (contrast is a voltage divider on the module), and other
    /// display drivers expose this call, so it must not fail.
    pub fn contrast(&mut self, _value: u8) -> LcdResult<()> {
        Ok(())
    }

    /// Shows a frame. The bitmap must match the display's pixel
    /// dimensions exactly.
    pub fn display(&mut self, frame: &Bitmap) -> LcdResult<()> {
        if frame.width() != self.geometry.pixel_width()
            || frame.height() != self.geometry.pixel_height()
        {
            return Err(LcdError::InvalidArgument);
        }
        let cells = partition(frame, &self.geometry);
        self.renderer.render(&mut self.bus, &self.geometry, cells)
    }
}

/// Cuts a frame into row-major 5x8 cell patterns, bit 4 leftmost.
fn partition(frame: &Bitmap, geometry: &Geometry) -> Vec<[u8; 8]> {
    let mut cells = Vec::with_capacity(geometry.cells());
    for row in 0..geometry.rows {
        for col in 0..geometry.columns {
            let mut pattern = [0u8; 8];
            for (dy, bits) in pattern.iter_mut().enumerate() {
                for dx in 0..CELL_WIDTH {
                    if frame.get(col * CELL_WIDTH + dx, row * CELL_HEIGHT + dy as u32) {
                        *bits |= 1 << (CELL_WIDTH - 1 - dx);
                    }
                }
            }
            cells.push(pattern);
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{nibbles, Call, RecordingTransport};
    use crate::BitMode;

    fn device<'a>(serial: &'a mut RecordingTransport) -> HD44780<'a> {
        HD44780::new(serial, DeviceConfig::default()).unwrap()
    }

    #[test]
    fn construction_runs_the_four_bit_init_sequence() {
        let mut serial = RecordingTransport::new(BitMode::Four);
        let log = serial.log();
        device(&mut serial);

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
    fn construction_runs_the_eight_bit_init_sequence() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        device(&mut serial);

        let mut expected = vec![Call::Command(vec![0x30]); 3];
        for byte in [0x38, 0x08, 0x06, 0x0c, 0x80, 0xc0, 0x01] {
            expected.push(Call::Command(vec![byte]));
        }
        expected.push(Call::Data(vec![0x20; 16]));
        expected.push(Call::Data(vec![0x20; 16]));
        assert_eq!(log.borrow().as_slice(), expected.as_slice());
    }

    #[test]
    fn unsupported_mode_names_the_dimensions() {
        let mut serial = RecordingTransport::new(BitMode::Four);
        let log = serial.log();
        let config = DeviceConfig {
            geometry: Geometry::new(12, 3),
            ..Default::default()
        };
        let err = HD44780::new(&mut serial, config).unwrap_err();
        assert_eq!(
            err,
            LcdError::DisplayMode {
                columns: 12,
                rows: 3
            }
        );
        assert_eq!(err.to_string(), "unsupported display mode: 12x3");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn backlight_pin_without_support_fails_before_any_command() {
        let mut serial = RecordingTransport::new(BitMode::Four);
        let log = serial.log();
        let config = DeviceConfig {
            backlight_pin: Some(3),
            ..Default::default()
        };
        let err = HD44780::new(&mut serial, config).unwrap_err();
        assert_eq!(err, LcdError::UnsupportedPlatform);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn backlight_register_gets_the_pin_mask() {
        let mut serial = RecordingTransport::with_backlight(BitMode::Four);
        let config = DeviceConfig {
            backlight_pin: Some(3),
            ..Default::default()
        };
        HD44780::new(&mut serial, config).unwrap();
        assert_eq!(serial.backlight, 1 << 3);
    }

    #[test]
    fn contrast_is_accepted_and_ignored() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut device = device(&mut serial);
        log.borrow_mut().clear();
        device.contrast(100).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn get_font_selects_from_the_fixed_set() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let device = device(&mut serial);
        assert_eq!(device.get_font(0).unwrap().name(), "A00");
        assert_eq!(device.get_font(1).unwrap().name(), "A02");
        assert_eq!(device.get_font(7).unwrap_err(), LcdError::InvalidArgument);
    }

    #[test]
    fn display_rejects_mismatched_frames() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let mut device = device(&mut serial);
        let frame = Bitmap::new(10, 8);
        assert_eq!(device.display(&frame), Err(LcdError::InvalidArgument));
    }

    /// A line of text plus a scrollbar-like graphic: the text row goes out
    /// as one ASCII burst, the graphic row synthesizes three custom glyphs
    /// and references them as cell data.
    #[test]
    fn display_mixes_ascii_and_custom_glyphs() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut device = device(&mut serial);
        log.borrow_mut().clear();

        let font = device.font();
        let mut frame = Bitmap::new(80, 16);
        // 14 characters, centered: x = (80 - 70) / 2
        frame.draw_text(font, 5, 0, "This is a test");
        // outlined bar with the left half filled
        frame.fill_rect(10, 10, 60, 5, true);
        frame.fill_rect(11, 11, 58, 3, false);
        frame.fill_rect(10, 10, 40, 5, true);
        device.display(&frame).unwrap();

        let solid = [0x00, 0x00, 0x1f, 0x1f, 0x1f, 0x1f, 0x1f, 0x00];
        let hollow = [0x00, 0x00, 0x1f, 0x00, 0x00, 0x00, 0x1f, 0x00];
        let cap = [0x00, 0x00, 0x1f, 0x01, 0x01, 0x01, 0x1f, 0x00];
        assert_eq!(
            log.borrow().as_slice(),
            &[
                // text row, trimmed to the cells that changed
                Call::Command(vec![0x81]),
                Call::Data(b"This is a test".to_vec()),
                // solid segment: upload, then cells 2..=9 of row 1
                Call::Command(vec![0x40]),
                Call::Data(solid.to_vec()),
                Call::Command(vec![0xc2]),
                Call::Data(vec![0x00; 8]),
                // hollow segment
                Call::Command(vec![0x48]),
                Call::Data(hollow.to_vec()),
                Call::Command(vec![0xca]),
                Call::Data(vec![0x01; 3]),
                // right end cap
                Call::Command(vec![0x50]),
                Call::Data(cap.to_vec()),
                Call::Command(vec![0xcd]),
                Call::Data(vec![0x02]),
            ]
        );
    }

    #[test]
    fn identical_frames_are_not_resent() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut device = device(&mut serial);

        let mut frame = Bitmap::new(80, 16);
        frame.draw_text(device.font(), 0, 0, "hello");
        frame.fill_rect(0, 12, 30, 3, true);
        device.display(&frame).unwrap();

        log.borrow_mut().clear();
        device.display(&frame).unwrap();
        assert!(log.borrow().is_empty());
    }

    /// Eight distinct glyphs fill the cache; a ninth reuses the least
    /// recently used hardware slot instead of failing.
    #[test]
    fn cache_exhaustion_recycles_a_slot() {
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut device = device(&mut serial);

        let mut frame = Bitmap::new(80, 16);
        for i in 0..8u32 {
            frame.fill_rect(i * 5, 0, 5, i + 1, true);
        }
        device.display(&frame).unwrap();
        log.borrow_mut().clear();

        // one more unique pattern, on the last cell of the second row
        frame.fill_rect(76, 8, 4, 8, true);
        device.display(&frame).unwrap();

        assert_eq!(
            log.borrow().as_slice(),
            &[
                // slot 0 held the oldest glyph
                Call::Command(vec![0x40]),
                Call::Data(vec![0x0f; 8]),
                Call::Command(vec![0xcf]),
                Call::Data(vec![0x00]),
            ]
        );
    }
}
