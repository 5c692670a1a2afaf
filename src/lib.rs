pub mod error;
pub mod container;
pub mod codec;
pub mod fields;
pub mod record;
pub mod io_stream;
pub mod sanitize;
pub mod sink;
pub mod perf;
pub mod run;

pub use error::{Error, Result};
pub use codec::TextCodec;
pub use fields::{split_fields, DecodedMetadata};
pub use record::{decode_frame, MetadataStatus, RawFrame, Record, RecordHeader};
pub use io_stream::{ImgCacheReader, ImgCacheWriter};
pub use sink::RecordSink;
pub use run::{run, MarkerPolicy, RunConfig, RunMode, RunSummary};
