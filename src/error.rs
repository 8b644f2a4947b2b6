use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Broad category of a failure.
///
/// Every category is fatal for the run; the category decides how the binary terminates
/// (configuration failures are agreed on by every rank and exit cleanly, anything else
/// aborts the process group).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed configuration file, invalid field combination or grid mismatch.
    Config,
    /// Failure while creating, opening, selecting, writing or reading storage objects.
    Storage,
    /// A broadcast, barrier or reduction could not complete.
    Collective,
    /// Failure writing a report.
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "configuration error",
            Self::Storage => "storage error",
            Self::Collective => "collective error",
            Self::Io => "i/o error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type for benchmark operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration detected by the sanity checks or grid validation.
    Config(String),
    /// The configuration file could not be parsed.
    Parse(toml::de::Error),
    /// An error raised by the high-level HDF5 API.
    Hdf5(hdf5::Error),
    /// A raw storage call or an in-memory storage operation failed.
    Storage(String),
    /// Group communication failed.
    Collective(String),
    Io(io::Error),
}

/// A type for results generated by benchmark functions where the `Err` type is
/// set to `hdf5_iotest::Error`.
pub type Result<T, E = Error> = ::std::result::Result<T, E>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Self::Config(_) | Self::Parse(_) => ErrorKind::Config,
            Self::Hdf5(_) | Self::Storage(_) => ErrorKind::Storage,
            Self::Collective(_) => ErrorKind::Collective,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// The error description without the kind prefix.
    pub fn message(&self) -> String {
        match *self {
            Self::Config(ref desc) | Self::Storage(ref desc) | Self::Collective(ref desc) => {
                desc.clone()
            }
            Self::Parse(ref err) => err.to_string(),
            Self::Hdf5(ref err) => err.to_string(),
            Self::Io(ref err) => err.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Self::Parse(ref err) => Some(err),
            Self::Hdf5(ref err) => Some(err),
            Self::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<hdf5::Error> for Error {
    fn from(err: hdf5::Error) -> Self {
        Self::Hdf5(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Collective(format!("undecodable broadcast payload: {err}"))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
