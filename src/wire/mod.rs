//! Binary stream layer: wire constants, byte sinks and cursors, the
//! static-data pool, and the writer/reader pair.

pub mod format;
mod reader;
mod sink;
mod source;
mod static_data;
mod writer;

pub use format::CURRENT_VERSION;
pub use reader::FbomReader;
pub use sink::ByteSink;
pub use source::{ByteCursor, FbomSource};
pub use static_data::{StaticDataPool, StaticDataValue, UsageCounts};
pub use writer::FbomWriter;
