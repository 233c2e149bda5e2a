//! Remote destinations for finished exports.
//!
//! A staging file is handed to a [`RemoteSink`] once the terminal chunk has been
//! written. Every sink implements the same synchronous trait, so the export path does not
//! care whether the bytes end up in a mounted share or an object store.
//!
//! ## Available sinks
//! - [`LocalDirSink`] - a directory tree; stands in for SFTP and SMB shares
//! - [`ObjectStoreSink`] - bucket/key stores behind the [`ObjectIO`] trait
//!
//! Events can also be streamed to an HTTP Event Collector with [`HecEventBuilder`] and
//! [`HecBatcher`] over a [`HecTransport`].
//!
//! ## Unit Testing with Fakes
//! ```
//! use export_everything::io::remote::{FakeObjectIO, ObjectIO, ObjectStoreSink, RemoteSink};
//! use export_everything::outputfile::OutputPath;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = FakeObjectIO::new();
//! store.create_bucket("exports")?;
//! let sink = ObjectStoreSink::new(store.clone(), "exports");
//!
//! let dir = tempfile::tempdir()?;
//! let staged = dir.path().join("staged.log");
//! std::fs::write(&staged, "hello\n")?;
//!
//! let remote = OutputPath { folder: "/daily".into(), filename: "out.log".into() };
//! assert_eq!(sink.upload(&staged, &remote)?, 6);
//! assert_eq!(store.get_object("exports", "daily/out.log")?, b"hello\n");
//! # Ok(())
//! # }
//! ```

pub mod fake;
pub mod hec;
pub mod local;
pub mod object;
pub mod traits;

pub use fake::{FakeHecTransport, FakeObjectIO};
pub use hec::{HecBatcher, HecEvent, HecEventBuilder, MetaValue, send_records};
pub use local::LocalDirSink;
pub use object::ObjectStoreSink;
pub use traits::{
    ErrorKind, HecTransport, ObjectIO, ObjectMetadata, RemoteSink, SinkError, SinkResult,
};
