mod budget;

pub use budget::*;

/// Number of canvas slots a session pre-allocates.
pub const MAX_CANVASES: usize = 20;
