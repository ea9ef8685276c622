//! Shared browser process ownership

mod wrapper;

pub use wrapper::{BrowserWrapper, launch_browser};
