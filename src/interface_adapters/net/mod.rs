// Network adapter modules split by WebSocket clients vs the static client page.

pub mod client;
pub mod page;

pub use client::ws_handler;
pub use page::index_handler;
