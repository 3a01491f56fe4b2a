mod http_source;
mod retry;

pub use http_source::{HttpLogSource, MalformedShape, parse_remote_log};
pub use retry::{RetryPolicy, RetryingFetcher};
