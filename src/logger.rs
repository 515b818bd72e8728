use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event types that determine which receivers should log the message
/// Ordered from the finest grained to the coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// One row per simulated auction instance (all agent bids, CSV)
    Auction,
    /// One block per outer update iteration (distances, kappa, expected prices)
    Iteration,
    /// Convergence information (converged / iteration cap reached)
    Convergence,
    /// Final belief of one price prediction run
    Variant,
    /// Comparisons between variants and scenario level checks
    Scenario,
    /// Pass/fail lines
    Validation,
}

impl LogEvent {
    const HIERARCHY: [LogEvent; 6] = [
        LogEvent::Auction,
        LogEvent::Iteration,
        LogEvent::Convergence,
        LogEvent::Variant,
        LogEvent::Scenario,
        LogEvent::Validation,
    ];

    /// This event together with every coarser event
    /// Auction -> Iteration -> Convergence -> Variant -> Scenario -> Validation
    pub fn and_upward(self) -> &'static [LogEvent] {
        let position = Self::HIERARCHY.iter().position(|e| *e == self).unwrap_or(0);
        &Self::HIERARCHY[position..]
    }
}

/// Trait for log receivers that can receive log messages
pub trait LogReceiver {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    fn write(&mut self, s: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    enabled_events: Vec<LogEvent>,
}

impl ConsoleReceiver {
    /// Returns a boxed receiver ready to be added to a logger
    pub fn new(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(Self { enabled_events })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        print!("{}", s);
        io::stdout().flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// File log receiver (writes to a file)
pub struct FileReceiver {
    file: File,
    enabled_events: Vec<LogEvent>,
}

impl FileReceiver {
    /// Create a receiver writing to `path`
    /// The file is truncated if it exists and parent directories are created as needed
    pub fn new(path: &Path, enabled_events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiver>> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(Self { file, enabled_events }))
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        write!(self.file, "{}", s)?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// In-memory receiver, used to inspect what a run logged
#[cfg(test)]
pub struct MemoryReceiver {
    pub lines: std::rc::Rc<std::cell::RefCell<String>>,
    enabled_events: Vec<LogEvent>,
}

#[cfg(test)]
impl MemoryReceiver {
    pub fn new(enabled_events: Vec<LogEvent>) -> (Box<dyn LogReceiver>, std::rc::Rc<std::cell::RefCell<String>>) {
        let lines = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
        (Box::new(Self { lines: lines.clone(), enabled_events }), lines)
    }
}

#[cfg(test)]
impl LogReceiver for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.lines.borrow_mut().push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unique identifier for a receiver
pub type ReceiverId = usize;

static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Logger routing messages to every receiver subscribed to the message's event
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    /// Add a file receiver, falling back to no receiver when the file cannot be opened
    /// Returns None (and reports on stderr) when the file could not be created
    pub fn add_file_receiver(&mut self, path: &Path, enabled_events: Vec<LogEvent>) -> Option<ReceiverId> {
        match FileReceiver::new(path, enabled_events) {
            Ok(receiver) => Some(self.add_receiver(receiver)),
            Err(e) => {
                eprintln!("Could not open log file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// Remove a receiver added with `add_file_receiver`
    pub fn remove_optional_receiver(&mut self, id: Option<ReceiverId>) {
        if let Some(id) = id {
            self.remove_receiver(id);
        }
    }

    /// Write a message with a specific log event type
    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// Write a prefixed line to `event` and every coarser event
    /// Each receiver receives the message only once, even if it listens to several of them
    fn log_with_prefix(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        let events = event.and_upward();
        let formatted_message = format!("{} {}\n", prefix, message);
        for (_, receiver) in &mut self.receivers {
            if events.iter().any(|&evt| receiver.should_log(evt)) {
                receiver.write(&formatted_message)?;
            }
        }
        Ok(())
    }

    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "ERROR", message)
    }

    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "WARNING", message)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize a string to be used as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Log a formatted line (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Log an "ERROR" line to the event and all coarser events
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Log a "WARNING" line to the event and all coarser events
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}
