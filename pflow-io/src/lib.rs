//! pflow-io: JSON event input and contact output for pflow.
//!
//! Events are read into a hit store, tracks and clusters; evaluated
//! contacts are written as JSON or CSV.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{ClusterDescription, Event, EventDescription, EventFileReader, RelationDescription};
pub use writer::ContactFileWriter;
