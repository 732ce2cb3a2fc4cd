//! Multi-resolution chunk streaming

pub mod view;
pub mod spiral;
pub mod registry;
pub mod streamer;
pub mod fetch;
pub mod display;
pub mod session;

pub use view::{View, ViewId, ViewSet, REGION_CHUNKS};
pub use spiral::{Spiral, load_spiral};
pub use registry::{
    Chunk, ChunkFetcher, ChunkKey, ChunkRegistry, ChunkTicket, LifecycleState, LoadOutcome,
    RegionPos, chunk_path,
};
pub use streamer::{ChunkStreamer, TickReport};
pub use fetch::{ByteSource, FetchFuture, FetchQueue, FetchResult, FsByteSource, MemoryByteSource};
pub use display::{DisplayHandle, DisplaySink, ErrorSink, LogErrorSink, LoggingDisplay};
pub use session::{FetchTag, Observer, SessionStats, WorldSession};
