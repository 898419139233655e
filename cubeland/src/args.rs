use clap::Parser;

use crate::window::WindowSettings;

#[derive(Debug, Parser)]
pub struct Args {
    /// Width of the window
    #[arg(long, default_value_t = 1600, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,
    /// Height of the window
    #[arg(long, default_value_t = 1200, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,
    /// Window title
    #[arg(long, default_value = "CubeLand")]
    pub title: String,
    /// Wait for vertical blank when presenting
    #[arg(long)]
    pub vsync: bool,
}

impl Args {
    pub fn window_settings(&self, depth_bits: u8) -> WindowSettings {
        WindowSettings {
            width: self.width,
            height: self.height,
            title: self.title.clone(),
            vsync: self.vsync,
            depth_bits,
        }
    }
}
