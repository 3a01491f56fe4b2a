mod handler;
mod message;

pub use handler::{WsState, create_ws_router, ws_handler};
pub use message::{ClientMessage, ServerMessage, SubscribePayload};
