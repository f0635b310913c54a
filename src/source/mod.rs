mod pipelines;
mod sequencer;
mod transport;
mod types;

pub use pipelines::PipelineDataSource;
pub use sequencer::{RequestSequencer, Settled};
pub use transport::{Endpoint, HttpTransport, Transport, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
