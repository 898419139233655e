pub mod args;
pub mod assets;
pub mod error;
pub mod window;
