mod connection;
mod poller_state;
mod remote_log;

pub use connection::Connection;
pub use poller_state::{PollerState, PollerStatus};
pub use remote_log::{RemoteLog, RemoteLogEntry};
