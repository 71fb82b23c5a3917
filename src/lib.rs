#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

//! The wire format is a sequence of frames, each a payload prefixed by
//! an unsigned 32-bit little-endian length. A payload wraps exactly one
//! [`Message`]: a [`CircuitHeader`], a [`ConstraintSystem`], a
//! [`Witness`] or a [`Command`], tagged with the `zkif` format magic.
//!
//! A [`CircuitHeader`] describes a circuit or sub-circuit through its
//! instance [`Variables`], the exclusive upper bound of its allocated
//! variable ids and the canonical bytes of the field maximum.
//! [`ConstraintSystem`] messages carry R1CS [`BilinearConstraint`]s and
//! concatenate in arrival order; [`Witness`] messages carry value
//! assignments the same way.
//!
//! The [`session`] module sequences these messages into gadget
//! exchanges: a caller sends a header, the gadget echoes it with a
//! strictly greater free variable id and streams its body back.

mod command;
mod config;
mod constraint;
mod error;
mod frame;
mod header;
mod keyvalue;
mod message;
mod variables;
mod witness;

pub mod session;
pub mod wire;

pub use command::Command;
pub use config::{Config, Flow};
pub use constraint::{BilinearConstraint, ConstraintSystem};
pub use error::{Error, ErrorKind, Result};
pub use frame::{read_frame, write_frame, FrameReader};
pub use header::CircuitHeader;
pub use keyvalue::{KeyValue, KvValue};
pub use message::{Message, MessageKind, MessageReader, MAGIC};
pub use session::{
    read_request, write_response, Event, GadgetCaller, GadgetRequest,
    GadgetResponse, SessionState,
};
pub use variables::{Variables, CONSTANT_ONE_ID};
pub use witness::Witness;
