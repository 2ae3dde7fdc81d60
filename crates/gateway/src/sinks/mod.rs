//! Frame sink adapters: consumers of completed Sync Frames downstream of
//! the core. Each sink is driven by its own [`mash_framebuffer::PolicyQueue`]
//! so a slow consumer can't stall the gateway's own tick loop.

pub mod csv_recorder;
pub mod websocket;

pub use csv_recorder::CsvRecorderSink;
pub use websocket::ws_frames_route;
