use super::bus::{AddressState, Bus};
use super::cgram::GlyphCache;
use crate::font::Font;
use crate::geometry::Geometry;
use crate::LcdResult;
use std::collections::HashMap;

/// Turns a frame's cell patterns into the fewest controller writes: one
/// DDRAM position command per contiguous run of cells, one data burst per
/// run, CGRAM uploads interleaved where a cell needs a custom glyph.
#[derive(Debug)]
pub(crate) struct Renderer {
    /// Exact pixel pattern -> ASCII code, precomputed from the active
    /// font. Cells that miss here go through the glyph cache instead.
    classifier: HashMap<[u8; 8], u8>,
    cache: GlyphCache,
    /// Cell patterns as of the last render. The controller is blanked
    /// during initialization, so this starts out all spaces.
    prev: Vec<[u8; 8]>,
}

impl Renderer {
    pub(crate) fn new(font: &Font, geometry: &Geometry) -> Self {
        let mut classifier = HashMap::new();
        for code in 0x20..=0x7eu8 {
            if let Some(pattern) = font.glyph(code as char) {
                classifier.entry(pattern).or_insert(code);
            }
        }
        Renderer {
            classifier,
            cache: GlyphCache::new(),
            prev: vec![[0u8; 8]; geometry.cells()],
        }
    }

    /// Writes the parts of `cells` that differ from the previous frame.
    ///
    /// Works row by row: unchanged rows are skipped outright; in a
    /// changed row, unchanged leading and trailing cells are trimmed off
    /// and unchanged cells in the middle are re-sent, since splitting the
    /// run there would cost an extra position command. A cell whose glyph
    /// is not resident yet forces a flush — the CGRAM upload moves the
    /// address register off DDRAM — after which the run restarts at that
    /// cell.
    pub(crate) fn render(
        &mut self,
        bus: &mut Bus<'_>,
        geometry: &Geometry,
        cells: Vec<[u8; 8]>,
    ) -> LcdResult<()> {
        debug_assert_eq!(cells.len(), geometry.cells());
        let columns = geometry.columns as usize;

        for row in 0..geometry.rows {
            let start = row as usize * columns;
            let line = &cells[start..start + columns];
            let prev = &self.prev[start..start + columns];

            let Some(first) = (0..columns).find(|&c| line[c] != prev[c]) else {
                continue;
            };
            let last = (first..columns)
                .rfind(|&c| line[c] != prev[c])
                .unwrap_or(first);

            let base = geometry.row_address(row);
            let mut run_start = base + first as u8;
            let mut run: Vec<u8> = Vec::with_capacity(last - first + 1);

            for col in first..=last {
                let pattern = line[col];
                let byte = match self.classifier.get(&pattern) {
                    Some(&code) => code,
                    None => {
                        if !self.cache.contains(&pattern) {
                            flush(bus, run_start, &run)?;
                            run.clear();
                            run_start = base + col as u8;
                        }
                        self.cache.resolve(bus, pattern)?
                    }
                };
                run.push(byte);
            }
            flush(bus, run_start, &run)?;
        }

        self.prev = cells;
        Ok(())
    }
}

fn flush(bus: &mut Bus<'_>, start: u8, run: &[u8]) -> LcdResult<()> {
    if run.is_empty() {
        return Ok(());
    }
    // the shadow may already sit at the run's start, e.g. right after a
    // burst that ended there
    if bus.address() != AddressState::Ddram(start) {
        bus.set_ddram_address(start)?;
    }
    bus.write_data(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FONT_A00;
    use crate::testing::{Call, RecordingTransport};
    use crate::BitMode;

    fn renderer(geometry: &Geometry) -> Renderer {
        Renderer::new(&FONT_A00, geometry)
    }

    fn blank(geometry: &Geometry) -> Vec<[u8; 8]> {
        vec![[0u8; 8]; geometry.cells()]
    }

    #[test]
    fn blank_frame_over_blank_screen_writes_nothing() {
        let geometry = Geometry::new(16, 2);
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        renderer(&geometry)
            .render(&mut bus, &geometry, blank(&geometry))
            .unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn ascii_cells_are_sent_as_their_codes() {
        let geometry = Geometry::new(16, 2);
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);

        let mut cells = blank(&geometry);
        cells[3] = FONT_A00.glyph('H').unwrap();
        cells[4] = FONT_A00.glyph('i').unwrap();
        renderer(&geometry).render(&mut bus, &geometry, cells).unwrap();

        assert_eq!(
            log.borrow().as_slice(),
            &[
                Call::Command(vec![0x83]),
                Call::Data(vec![b'H', b'i']),
            ]
        );
    }

    #[test]
    fn unchanged_interior_cells_ride_along_in_the_run() {
        let geometry = Geometry::new(16, 1);
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        let mut renderer = renderer(&geometry);

        let mut cells = blank(&geometry);
        cells[2] = FONT_A00.glyph('a').unwrap();
        cells[6] = FONT_A00.glyph('b').unwrap();
        renderer.render(&mut bus, &geometry, cells).unwrap();

        // one position command, blanks between the two letters re-sent
        assert_eq!(
            log.borrow().as_slice(),
            &[
                Call::Command(vec![0x82]),
                Call::Data(vec![b'a', 0x20, 0x20, 0x20, b'b']),
            ]
        );
    }

    #[test]
    fn custom_glyph_upload_breaks_the_run() {
        let geometry = Geometry::new(16, 1);
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        let mut renderer = renderer(&geometry);

        let box_top = [0x1f, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11];
        let mut cells = blank(&geometry);
        cells[0] = FONT_A00.glyph('x').unwrap();
        cells[1] = box_top;
        cells[2] = box_top;
        renderer.render(&mut bus, &geometry, cells).unwrap();

        assert_eq!(
            log.borrow().as_slice(),
            &[
                // run flushed before the upload
                Call::Command(vec![0x80]),
                Call::Data(vec![b'x']),
                // upload to slot 0
                Call::Command(vec![0x40]),
                Call::Data(box_top.to_vec()),
                // remainder of the row, both cells referencing the slot
                Call::Command(vec![0x81]),
                Call::Data(vec![0x00, 0x00]),
            ]
        );
    }

    #[test]
    fn rendering_the_same_frame_twice_is_silent() {
        let geometry = Geometry::new(16, 2);
        let mut serial = RecordingTransport::new(BitMode::Eight);
        let log = serial.log();
        let mut bus = Bus::new(&mut serial);
        let mut renderer = renderer(&geometry);

        let mut cells = blank(&geometry);
        cells[0] = FONT_A00.glyph('Z').unwrap();
        cells[17] = [0x15; 8];
        renderer.render(&mut bus, &geometry, cells.clone()).unwrap();
        assert!(!log.borrow().is_empty());

        log.borrow_mut().clear();
        renderer.render(&mut bus, &geometry, cells).unwrap();
        assert!(log.borrow().is_empty());
    }
}
