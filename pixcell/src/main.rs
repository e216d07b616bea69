mod config;

use crate::config::Config;
use dotenv::dotenv;
use log::{debug, info};
use pixcell_lcd::bitmap::Bitmap;
use pixcell_lcd::geometry::Geometry;
use pixcell_lcd::hd44780::{DeviceConfig, HD44780};
use pixcell_lcd::transport::gpio::ParallelGpio;
use std::env::var;
use std::thread;
use std::time::Duration;

fn parse_pin_bus(pin_str: &str) -> eyre::Result<Vec<u32>> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("pixcell starting...");

    // Get pin numbers from env
    let lcd_rs_pin_no: u32 = var("PIXCELL_LCD_PIN_RS")?.parse()?;
    let lcd_e_pin_no: u32 = var("PIXCELL_LCD_PIN_E")?.parse()?;
    let lcd_data_pin_nos = parse_pin_bus(&var("PIXCELL_LCD_PINS_DATA")?)?;
    let chip_path = var("PIXCELL_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());

    info!(
        "LCD @ RS: {}, E: {}, Data: {:?} on {}",
        lcd_rs_pin_no, lcd_e_pin_no, lcd_data_pin_nos, chip_path
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    debug!("Initializing transport...");
    let chip = gpiod::Chip::new(&chip_path)?;
    let mut serial = match *lcd_data_pin_nos.as_slice() {
        [d0, d1, d2, d3] => {
            ParallelGpio::new_4bit(&chip, lcd_rs_pin_no, lcd_e_pin_no, [d0, d1, d2, d3])?
        }
        [d0, d1, d2, d3, d4, d5, d6, d7] => ParallelGpio::new_8bit(
            &chip,
            lcd_rs_pin_no,
            lcd_e_pin_no,
            [d0, d1, d2, d3, d4, d5, d6, d7],
        )?,
        _ => {
            return Err(eyre::eyre!(
                "expected 4 or 8 data pins, got {}",
                lcd_data_pin_nos.len()
            ));
        }
    };
    debug!("{:?} initialized.", serial);

    debug!("Initializing display...");
    let mut device = HD44780::new(
        &mut serial,
        DeviceConfig {
            geometry: Geometry::new(config.columns, config.rows),
            backlight_pin: None,
            font: config.font,
        },
    )?;
    let geometry = device.geometry();
    let font = device.font();
    info!("{}x{} display initialized.", geometry.columns, geometry.rows);

    let width = geometry.pixel_width();
    let height = geometry.pixel_height();
    let title = concat!("pixcell v", env!("CARGO_PKG_VERSION"));

    info!("Starting main loop...");

    let mut progress: u32 = 0;
    loop {
        let mut frame = Bitmap::new(width, height);
        let text_x = (width.saturating_sub(title.chars().count() as u32 * 5)) / 2;
        frame.draw_text(font, text_x, 0, title);

        // bargraph along the bottom row, exercising the custom glyph path
        if geometry.rows >= 2 {
            let bar_y = height - 6;
            frame.fill_rect(0, bar_y, width, 5, true);
            frame.fill_rect(1, bar_y + 1, width - 2, 3, false);
            frame.fill_rect(1, bar_y + 1, (width - 2) * progress / 100, 3, true);
        }

        device.display(&frame)?;
        progress = (progress + 5) % 105;

        thread::sleep(Duration::from_millis(250));
    }
}
