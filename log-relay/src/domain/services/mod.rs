mod clock;
mod deduplication;
mod input_validator;

pub use clock::Clock;
pub use deduplication::{CursorAdvance, LogCursor};
pub use input_validator::{InputValidator, MAX_FIELD_CHARS, MAX_KEY_CHARS};
