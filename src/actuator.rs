//! Actuator side: command line protocol, sinks and the dispatch thread.

mod channel;
mod command;
mod sink;

pub use channel::{CommandChannel, DispatchStats};
pub use command::Command;
#[cfg(feature = "serial")]
pub use sink::SerialSink;
pub use sink::{CommandSink, NullSink, WriterSink};
