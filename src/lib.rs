pub use crate::counter::EventCounter;
pub use crate::error::{Error, Result};

mod counter;
mod error;
