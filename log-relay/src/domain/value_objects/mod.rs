mod connection_id;
mod key;

pub use connection_id::ConnectionId;
pub use key::{SubscriptionKey, ValidationError};

/// Wall-clock instant used across the relay
pub type Timestamp = chrono::DateTime<chrono::Utc>;
