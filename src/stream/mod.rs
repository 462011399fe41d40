//! Open stream bookkeeping
//!
//! Handle records, the pools that recycle them, and the per-stream cipher.

pub mod cipher;
pub mod handle;
pub mod pool;

pub use cipher::CipherState;
pub use handle::{Backend, SeekOrigin, StreamHandle, StreamId};
pub use pool::{Pool, SlotKey};
