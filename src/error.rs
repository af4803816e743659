use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

/// Errors raised by the simulation kernel and the objects that talk to it.
///
/// Conformance mismatches of the design under test are not errors; they are
/// collected by a [`Scoreboard`](crate::testbench::Scoreboard) and reported as
/// test results.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("no simulation is running on this thread")]
    NotRunning,
    #[error("a simulation is already running on this thread")]
    AlreadyRunning,
    #[error("no object named `{0}`")]
    UnknownObject(String),
    #[error("invalid object handle {0}")]
    InvalidHandle(usize),
    #[error("`{0}` is not a signal and has no value")]
    NoValue(String),
    #[error("`{0}` is an output port and can't be written")]
    ReadOnlyPort(String),
    #[error("value {value:#x} does not fit into {width}-bit signal `{name}`")]
    ValueTooWide { name: String, width: u32, value: u64 },
    #[error("`{name}` holds `{bin}`, which has no integer value")]
    Unresolved { name: String, bin: String },
    #[error("invalid bit string `{0}`")]
    InvalidBitString(String),
    #[error("`{name}` is {expected} bits wide, got {got} bits")]
    WidthMismatch {
        name: String,
        expected: u32,
        got: u32,
    },
    #[error("unknown time unit `{0}`")]
    UnknownTimeUnit(String),
    #[error("can't convert {time} {unit} to sim steps without rounding (precision 1e{precision} s)")]
    TimeRounding { time: f64, unit: String, precision: i8 },
    #[error("unknown callback handle {0}")]
    UnknownCallback(usize),
    #[error("callback already registered: {0}")]
    DuplicateCallback(String),
    #[error("invalid value `{value}` for {var}")]
    Config { var: String, value: String },
    #[error("failed to write test results to {path}: {message}")]
    Report { path: String, message: String },
}
