//! Destinations for serialized actuator commands.

use std::io::{self, Write};

/// A line-oriented destination for commands. Nothing is read back.
pub trait CommandSink: Send + 'static {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Called once when dispatch stops.
    fn close(&mut self) {}
}

impl CommandSink for Box<dyn CommandSink> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Writes lines to any [`Write`] implementation, flushing after each one.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send + 'static> CommandSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }

    fn close(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Discards every command; used when no actuator is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn write_line(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialSink;

#[cfg(feature = "serial")]
mod serial {
    use std::io::{self, Write};
    use std::thread;

    use tracing::info;

    use super::CommandSink;
    use crate::config::ActuatorConfig;
    use crate::error::{Error, Result};

    /// Actuator board on a serial port.
    pub struct SerialSink {
        port: Box<dyn serialport::SerialPort>,
        name: String,
    }

    impl SerialSink {
        /// Open the configured port and wait for the board to come out of reset.
        pub fn open(config: &ActuatorConfig) -> Result<Self> {
            let path = config
                .port
                .as_deref()
                .ok_or_else(|| Error::SinkUnavailable("no serial port configured".to_string()))?;

            info!("Opening serial port: {path} at {} bps", config.baud_rate);
            let port = serialport::new(path, config.baud_rate)
                .timeout(config.write_timeout())
                .open()
                .map_err(|e| Error::SinkUnavailable(format!("failed to open {path}: {e}")))?;

            thread::sleep(config.settle());
            info!("Connected to actuator on {path}");

            Ok(Self {
                port,
                name: path.to_string(),
            })
        }
    }

    impl CommandSink for SerialSink {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.port.write_all(line.as_bytes())?;
            self.port.flush()
        }

        fn close(&mut self) {
            let _ = self.port.flush();
            info!("Closed serial port {}", self.name);
        }
    }
}
