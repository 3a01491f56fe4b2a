pub mod entities;
pub mod events;
pub mod services;
pub mod value_objects;

// Re-export entity types
pub use entities::{Connection, PollerState, PollerStatus, RemoteLog, RemoteLogEntry};

// Re-export events
pub use events::{ClientConfig, ConnectionEvent};

// Re-export services
pub use services::{
    Clock, CursorAdvance, InputValidator, LogCursor, MAX_FIELD_CHARS, MAX_KEY_CHARS,
};

// Re-export value objects
pub use value_objects::{ConnectionId, SubscriptionKey, Timestamp, ValidationError};
