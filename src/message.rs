use std::fmt;
use std::io;

use tracing::debug;

use crate::command::Command;
use crate::constraint::ConstraintSystem;
use crate::frame::{self, FrameReader};
use crate::header::CircuitHeader;
use crate::wire::{Cursor, Emit, Parse};
use crate::witness::Witness;
use crate::{Config, Error, Result};

/// Format identifier embedded at the start of every non-empty payload.
pub const MAGIC: [u8; 4] = *b"zkif";

const TAG_EMPTY: u8 = 0;
const TAG_CIRCUIT_HEADER: u8 = 1;
const TAG_CONSTRAINT_SYSTEM: u8 = 2;
const TAG_WITNESS: u8 = 3;
const TAG_COMMAND: u8 = 4;

/// Root union of the interchange format; exactly one variant is active
/// per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Circuit or sub-circuit description.
    CircuitHeader(CircuitHeader),
    /// Chunk of the constraint list.
    ConstraintSystem(ConstraintSystem),
    /// Chunk of the variable assignment.
    Witness(Witness),
    /// Out-of-band control message.
    Command(Command),
    /// No populated variant; the decoding of a zero-length frame.
    Empty,
}

/// Discriminant of [`Message`], used by the protocol state machine and
/// in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// See [`Message::CircuitHeader`].
    CircuitHeader,
    /// See [`Message::ConstraintSystem`].
    ConstraintSystem,
    /// See [`Message::Witness`].
    Witness,
    /// See [`Message::Command`].
    Command,
    /// See [`Message::Empty`].
    Empty,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CircuitHeader => "circuit header",
            Self::ConstraintSystem => "constraint system",
            Self::Witness => "witness",
            Self::Command => "command",
            Self::Empty => "empty message",
        };

        write!(f, "{}", name)
    }
}

impl Message {
    /// Discriminant of the active variant.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::CircuitHeader(_) => MessageKind::CircuitHeader,
            Self::ConstraintSystem(_) => MessageKind::ConstraintSystem,
            Self::Witness(_) => MessageKind::Witness,
            Self::Command(_) => MessageKind::Command,
            Self::Empty => MessageKind::Empty,
        }
    }

    /// Encode into a standalone frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        if let Self::Empty = self {
            return buf;
        }

        buf.extend_from_slice(&MAGIC);

        match self {
            Self::CircuitHeader(h) => {
                buf.push(TAG_CIRCUIT_HEADER);
                h.emit(&mut buf);
            }
            Self::ConstraintSystem(cs) => {
                buf.push(TAG_CONSTRAINT_SYSTEM);
                cs.emit(&mut buf);
            }
            Self::Witness(w) => {
                buf.push(TAG_WITNESS);
                w.emit(&mut buf);
            }
            Self::Command(c) => {
                buf.push(TAG_COMMAND);
                c.emit(&mut buf);
            }
            Self::Empty => unreachable!("handled above"),
        }

        buf
    }

    /// Decode a frame payload.
    ///
    /// Structural integrity is checked eagerly; the semantic invariants
    /// of the models are left to the consumer so a relay can pass
    /// through data it does not fully understand.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Ok(Self::Empty);
        }

        let mut cur = Cursor::new(payload);
        let magic = cur.take(4, "format magic")?;

        if magic != MAGIC {
            let mut found = [0u8; 4];

            found.copy_from_slice(magic);

            return Err(Error::UnrecognizedFormat { magic: found });
        }

        let tag = cur.u8("union tag")?;

        if tag != TAG_EMPTY && cur.is_empty() {
            return Err(Error::MalformedMessage {
                context: "union tag with no matching payload",
                offset: cur.offset(),
            });
        }

        let message = match tag {
            TAG_EMPTY => Self::Empty,
            TAG_CIRCUIT_HEADER => {
                Self::CircuitHeader(CircuitHeader::parse(&mut cur)?)
            }
            TAG_CONSTRAINT_SYSTEM => {
                Self::ConstraintSystem(ConstraintSystem::parse(&mut cur)?)
            }
            TAG_WITNESS => Self::Witness(Witness::parse(&mut cur)?),
            TAG_COMMAND => Self::Command(Command::parse(&mut cur)?),
            _ => {
                return Err(Error::MalformedMessage {
                    context: "unknown union tag",
                    offset: cur.offset(),
                })
            }
        };

        Ok(message)
    }

    /// Write the message as one frame.
    pub fn write_into<W>(&self, writer: W) -> Result<()>
    where
        W: io::Write,
    {
        frame::write_frame(writer, &self.encode())
    }
}

/// Streaming reader turning frames into messages, in stream order.
///
/// A file of concatenated frames decodes the same way as a live
/// stream; iteration ends at a clean end of stream.
#[derive(Debug)]
pub struct MessageReader<R> {
    frames: FrameReader<R>,
}

impl<R> MessageReader<R>
where
    R: io::Read,
{
    /// Wrap a readable source of frames.
    pub fn new(reader: R, config: Config) -> Self {
        Self {
            frames: FrameReader::new(reader, config),
        }
    }

    /// Read the next message; `None` at a clean end of stream.
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        let payload = match self.frames.read_frame()? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        let message = Message::decode(&payload)?;

        debug!(
            kind = %message.kind(),
            payload = payload.len(),
            "message decoded"
        );

        Ok(Some(message))
    }
}

impl<R> Iterator for MessageReader<R>
where
    R: io::Read,
{
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_message().transpose()
    }
}
