use std::{error, fmt, io};

use crate::message::MessageKind;
use crate::session::SessionState;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the framing layer, the codec, the model
/// validations and the gadget protocol.
///
/// Framing and codec errors terminate the session: a corrupt length
/// prefix cannot be resynchronized. Model errors
/// ([`DuplicateVariableId`], [`InconsistentValueLength`],
/// [`ReservedVariableId`]) are raised at construction time and the
/// caller may discard the offending message and keep the stream.
/// Protocol-sequence errors always terminate the session.
///
/// [`DuplicateVariableId`]: Error::DuplicateVariableId
/// [`InconsistentValueLength`]: Error::InconsistentValueLength
/// [`ReservedVariableId`]: Error::ReservedVariableId
#[derive(Debug)]
pub enum Error {
    /// The stream ended in the middle of a length prefix or payload.
    TruncatedFrame {
        /// Stream offset at which the frame started.
        offset: u64,
        /// Bytes the frame declared.
        expected: usize,
        /// Bytes actually available.
        got: usize,
    },
    /// A length prefix exceeded the configured maximum frame size.
    FrameTooLarge {
        /// Declared payload length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The payload does not start with the `zkif` magic.
    UnrecognizedFormat {
        /// The four bytes found in place of the magic.
        magic: [u8; 4],
    },
    /// Structurally invalid payload: bad offsets, lengths pointing
    /// outside the buffer, or an unknown union tag.
    MalformedMessage {
        /// What the decoder was reading.
        context: &'static str,
        /// Offset within the payload.
        offset: usize,
    },
    /// A string field holds invalid UTF-8.
    InvalidEncoding {
        /// What the decoder was reading.
        context: &'static str,
        /// Offset within the payload.
        offset: usize,
    },
    /// A variables collection repeats an id.
    DuplicateVariableId {
        /// The repeated id.
        id: u64,
    },
    /// The values buffer is not an exact multiple of the id count.
    InconsistentValueLength {
        /// Number of variable ids.
        ids: usize,
        /// Length of the values buffer.
        bytes: usize,
    },
    /// A witness assigns the variable id reserved for the constant one.
    ReservedVariableId {
        /// The reserved id.
        id: u64,
    },
    /// The first reply of a gadget was not a circuit header.
    MissingHeaderEcho {
        /// Kind of the message received instead.
        received: MessageKind,
    },
    /// A gadget response did not advance the free variable id.
    NonMonotonicAllocation {
        /// Free variable id supplied in the request.
        requested: u64,
        /// Free variable id returned by the gadget.
        returned: u64,
    },
    /// Witness generation was requested without input values.
    MissingInputValues {
        /// First unassigned instance variable.
        id: u64,
    },
    /// An out-of-order message; the session cannot resume.
    ProtocolViolation {
        /// State the machine was in.
        state: SessionState,
        /// Kind of the offending message, if any was decoded.
        received: Option<MessageKind>,
    },
    /// Underlying transport failure.
    Io(io::Error),
}

impl Error {
    /// Data-free discriminant, convenient for matching.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TruncatedFrame { .. } => ErrorKind::TruncatedFrame,
            Self::FrameTooLarge { .. } => ErrorKind::FrameTooLarge,
            Self::UnrecognizedFormat { .. } => ErrorKind::UnrecognizedFormat,
            Self::MalformedMessage { .. } => ErrorKind::MalformedMessage,
            Self::InvalidEncoding { .. } => ErrorKind::InvalidEncoding,
            Self::DuplicateVariableId { .. } => ErrorKind::DuplicateVariableId,
            Self::InconsistentValueLength { .. } => {
                ErrorKind::InconsistentValueLength
            }
            Self::ReservedVariableId { .. } => ErrorKind::ReservedVariableId,
            Self::MissingHeaderEcho { .. } => ErrorKind::MissingHeaderEcho,
            Self::NonMonotonicAllocation { .. } => {
                ErrorKind::NonMonotonicAllocation
            }
            Self::MissingInputValues { .. } => ErrorKind::MissingInputValues,
            Self::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// True when the caller may discard the offending message and keep
    /// using the stream.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateVariableId { .. }
                | Self::InconsistentValueLength { .. }
                | Self::ReservedVariableId { .. }
        )
    }
}

/// Discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::TruncatedFrame`].
    TruncatedFrame,
    /// See [`Error::FrameTooLarge`].
    FrameTooLarge,
    /// See [`Error::UnrecognizedFormat`].
    UnrecognizedFormat,
    /// See [`Error::MalformedMessage`].
    MalformedMessage,
    /// See [`Error::InvalidEncoding`].
    InvalidEncoding,
    /// See [`Error::DuplicateVariableId`].
    DuplicateVariableId,
    /// See [`Error::InconsistentValueLength`].
    InconsistentValueLength,
    /// See [`Error::ReservedVariableId`].
    ReservedVariableId,
    /// See [`Error::MissingHeaderEcho`].
    MissingHeaderEcho,
    /// See [`Error::NonMonotonicAllocation`].
    NonMonotonicAllocation,
    /// See [`Error::MissingInputValues`].
    MissingInputValues,
    /// See [`Error::ProtocolViolation`].
    ProtocolViolation,
    /// See [`Error::Io`].
    Io,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedFrame {
                offset,
                expected,
                got,
            } => write!(
                f,
                "stream ended mid-frame at offset {}: expected {} bytes, got {}",
                offset, expected, got
            ),
            Self::FrameTooLarge { len, max } => write!(
                f,
                "frame of {} bytes exceeds the configured maximum of {}",
                len, max
            ),
            Self::UnrecognizedFormat { magic } => write!(
                f,
                "payload magic {:02x}{:02x}{:02x}{:02x} is not a zkif message",
                magic[0], magic[1], magic[2], magic[3]
            ),
            Self::MalformedMessage { context, offset } => {
                write!(f, "malformed message at offset {}: {}", offset, context)
            }
            Self::InvalidEncoding { context, offset } => {
                write!(f, "invalid utf-8 at offset {}: {}", offset, context)
            }
            Self::DuplicateVariableId { id } => {
                write!(f, "variable id {} appears more than once", id)
            }
            Self::InconsistentValueLength { ids, bytes } => write!(
                f,
                "{} value bytes cannot be split evenly across {} variables",
                bytes, ids
            ),
            Self::ReservedVariableId { id } => write!(
                f,
                "variable id {} is reserved for the constant one and cannot be assigned",
                id
            ),
            Self::MissingHeaderEcho { received } => write!(
                f,
                "gadget reply must start with a circuit header, got {}",
                received
            ),
            Self::NonMonotonicAllocation {
                requested,
                returned,
            } => write!(
                f,
                "gadget returned free variable id {} for a request at {}",
                returned, requested
            ),
            Self::MissingInputValues { id } => write!(
                f,
                "witness generation requires input values; variable {} is unassigned",
                id
            ),
            Self::ProtocolViolation { state, received } => match received {
                Some(kind) => write!(
                    f,
                    "unexpected {} while the session was {}",
                    kind, state
                ),
                None => write!(f, "session aborted while {}", state),
            },
            Self::Io(e) => write!(f, "transport failure: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[test]
fn recoverable_errors_are_model_errors() {
    assert!(Error::DuplicateVariableId { id: 1 }.is_recoverable());
    assert!(Error::InconsistentValueLength { ids: 3, bytes: 7 }.is_recoverable());
    assert!(!Error::FrameTooLarge { len: 10, max: 5 }.is_recoverable());
}

#[test]
fn kind_matches_variant() {
    let err = Error::NonMonotonicAllocation {
        requested: 5,
        returned: 5,
    };

    assert_eq!(err.kind(), ErrorKind::NonMonotonicAllocation);
}
