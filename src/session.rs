//! Gadget protocol state machine and session drivers.
//!
//! The protocol is strictly synchronous request/response over one
//! ordered byte stream. Each session owns its stream exclusively; the
//! transition function is pure over (state, event), so independent
//! sessions run in parallel with no shared state.

use std::fmt;
use std::io;

use tracing::debug;

use crate::command::Command;
use crate::config::Flow;
use crate::constraint::ConstraintSystem;
use crate::frame;
use crate::header::CircuitHeader;
use crate::message::{Message, MessageKind};
use crate::witness::Witness;
use crate::{Config, Error, Result};

/// Protocol event fed to the transition function, seen from the caller
/// side of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A session begins on the stream.
    Opened,
    /// The caller wrote a message of this kind.
    Sent(MessageKind),
    /// The gadget delivered a message of this kind.
    Received(MessageKind),
    /// The stream ended.
    StreamEnded,
}

/// States of the gadget protocol.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No exchange in progress.
    #[default]
    Idle,
    /// Session open; an optional command may still arrive.
    AwaitingCommand,
    /// A constraint-generation exchange was requested.
    RequestingConstraints,
    /// A witness-generation exchange was requested.
    RequestingWitness,
    /// Request sent; the reply must open with a circuit header.
    AwaitingHeaderEcho,
    /// Header echo accepted; body messages are flowing.
    AwaitingBody,
    /// Terminal failure; the session cannot resume.
    ProtocolViolation,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingCommand => "awaiting command",
            Self::RequestingConstraints => "requesting constraints",
            Self::RequestingWitness => "requesting witness",
            Self::AwaitingHeaderEcho => "awaiting header echo",
            Self::AwaitingBody => "awaiting body",
            Self::ProtocolViolation => "in protocol violation",
        };

        write!(f, "{}", name)
    }
}

impl SessionState {
    /// Pure, total transition function. Every (state, event) pair has a
    /// defined reaction; unexpected input is a fatal error and the
    /// caller must move the machine to [`ProtocolViolation`].
    ///
    /// Zero-length frames decode to [`MessageKind::Empty`] and are a
    /// no-op in every live state.
    ///
    /// [`ProtocolViolation`]: SessionState::ProtocolViolation
    /// [`MessageKind::Empty`]: crate::MessageKind::Empty
    pub fn advance(self, flow: Flow, event: Event) -> Result<Self> {
        use Event::*;
        use MessageKind::*;
        use SessionState::*;

        let next = match (self, event) {
            // empty messages are no-ops wherever the stream is live
            (
                state @ (AwaitingCommand | RequestingConstraints
                | RequestingWitness | AwaitingHeaderEcho | AwaitingBody),
                Sent(Empty) | Received(Empty),
            ) => state,

            (Idle, Opened) => AwaitingCommand,
            (Idle | AwaitingCommand, StreamEnded) => Idle,

            (AwaitingCommand, Sent(Command) | Received(Command)) => {
                if flow.witnesses() && !flow.constraints() {
                    RequestingWitness
                } else {
                    RequestingConstraints
                }
            }

            // command-less direct exchange
            (AwaitingCommand, Sent(CircuitHeader)) => AwaitingHeaderEcho,

            (
                RequestingConstraints | RequestingWitness,
                Sent(CircuitHeader),
            ) => AwaitingHeaderEcho,

            (AwaitingHeaderEcho, Received(CircuitHeader)) => AwaitingBody,
            (AwaitingHeaderEcho, Received(kind)) => {
                return Err(Error::MissingHeaderEcho { received: kind })
            }

            (AwaitingBody, Received(ConstraintSystem)) if flow.constraints() => {
                AwaitingBody
            }
            (AwaitingBody, Received(Witness)) if flow.witnesses() => {
                AwaitingBody
            }

            // end of flow: the body is complete and the machine is
            // ready for another exchange
            (AwaitingBody, StreamEnded) => Idle,

            (state, event) => {
                return Err(Error::ProtocolViolation {
                    state,
                    received: match event {
                        Sent(kind) | Received(kind) => Some(kind),
                        Opened | StreamEnded => None,
                    },
                })
            }
        };

        Ok(next)
    }
}

/// Structured result of a gadget exchange.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GadgetResponse {
    /// Header echo; outputs in its instance variables.
    pub header: CircuitHeader,
    /// Constraint-system messages, in arrival order.
    pub constraint_systems: Vec<ConstraintSystem>,
    /// Witness messages, in arrival order.
    pub witnesses: Vec<Witness>,
}

impl GadgetResponse {
    /// Concatenate the constraint-system messages into one list,
    /// preserving the canonical arrival order.
    pub fn constraints(&self) -> ConstraintSystem {
        let mut merged = ConstraintSystem::default();

        for cs in &self.constraint_systems {
            merged.extend(cs.clone());
        }

        merged
    }

    /// Check the semantic invariants of the header and every body
    /// message. The driver passes bodies through untouched so relays
    /// work; consumers call this before trusting the data.
    pub fn validate(&self) -> Result<()> {
        self.header.validate()?;
        self.constraint_systems
            .iter()
            .try_for_each(ConstraintSystem::validate)?;
        self.witnesses.iter().try_for_each(Witness::validate)?;

        Ok(())
    }
}

/// Request read by the gadget side of the protocol.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GadgetRequest {
    /// Command opening the stream, when one was sent.
    pub command: Option<Command>,
    /// The request header; inputs in its instance variables.
    pub header: CircuitHeader,
}

/// Caller side of a gadget exchange over a duplex stream.
///
/// The driver sequences frames through the state machine, enforces the
/// response invariants (header echo first, strictly increasing free
/// variable id, input values present for witness generation) and
/// collects the body messages.
#[derive(Debug)]
pub struct GadgetCaller<S> {
    stream: S,
    config: Config,
    state: SessionState,
    flow: Flow,
    offset: u64,
}

impl<S> GadgetCaller<S> {
    /// Open a session over a duplex stream. The configured flow applies
    /// until a command overrides it.
    pub fn new(stream: S, config: Config) -> Self {
        Self {
            stream,
            config,
            state: SessionState::AwaitingCommand,
            flow: config.flow,
            offset: 0,
        }
    }

    /// Current protocol state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Flow in effect for the next exchange.
    pub const fn flow(&self) -> Flow {
        self.flow
    }

    /// Return the inner stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn step(&mut self, event: Event) -> Result<()> {
        match self.state.advance(self.flow, event) {
            Ok(next) => {
                if next != self.state {
                    debug!(from = %self.state, to = %next, "session transition");
                }

                self.state = next;

                Ok(())
            }
            Err(e) => {
                self.state = SessionState::ProtocolViolation;

                Err(e)
            }
        }
    }
}

impl<S> GadgetCaller<S>
where
    S: io::Read + io::Write,
{
    /// Send the command opening the session; its flags select the flow
    /// of the exchange.
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        if self.state == SessionState::Idle {
            self.step(Event::Opened)?;
        }

        if let Some(flow) = command.flow() {
            self.flow = flow;
        }

        self.step(Event::Sent(MessageKind::Command))?;

        Message::Command(command.clone()).write_into(&mut self.stream)
    }

    /// Run a constraint-generation exchange.
    pub fn request_constraints(
        &mut self,
        header: &CircuitHeader,
    ) -> Result<GadgetResponse> {
        self.flow = Flow::Constraints;

        self.request(header)
    }

    /// Run a witness-generation exchange; the request header must carry
    /// input values.
    pub fn request_witness(
        &mut self,
        header: &CircuitHeader,
    ) -> Result<GadgetResponse> {
        self.flow = Flow::Witness;

        self.request(header)
    }

    /// Run an exchange under the flow in effect, sending the request
    /// header and collecting the response until the stream ends.
    pub fn request(&mut self, header: &CircuitHeader) -> Result<GadgetResponse> {
        header.validate()?;

        if self.flow.witnesses() {
            let inputs = &header.instance_variables;

            if !inputs.is_empty() && !inputs.is_assigned() {
                return Err(Error::MissingInputValues { id: inputs.ids()[0] });
            }
        }

        if self.state == SessionState::Idle {
            self.step(Event::Opened)?;
        }

        self.step(Event::Sent(MessageKind::CircuitHeader))?;
        Message::CircuitHeader(header.clone()).write_into(&mut self.stream)?;

        self.collect_response(header.free_variable_id)
    }

    fn collect_response(&mut self, requested: u64) -> Result<GadgetResponse> {
        let mut response = GadgetResponse::default();

        loop {
            let payload = match self.read_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    self.step(Event::StreamEnded)?;

                    return Ok(response);
                }
                Err(e) => {
                    // a partial frame can never resolve to a clean end
                    // of flow
                    self.state = SessionState::ProtocolViolation;

                    return Err(e);
                }
            };

            let message = Message::decode(&payload).map_err(|e| {
                self.state = SessionState::ProtocolViolation;

                e
            })?;

            self.step(Event::Received(message.kind()))?;

            match message {
                Message::CircuitHeader(echo) => {
                    if echo.free_variable_id <= requested {
                        self.state = SessionState::ProtocolViolation;

                        return Err(Error::NonMonotonicAllocation {
                            requested,
                            returned: echo.free_variable_id,
                        });
                    }

                    response.header = echo;
                }
                Message::ConstraintSystem(cs) => {
                    response.constraint_systems.push(cs);
                }
                Message::Witness(w) => response.witnesses.push(w),
                Message::Empty => (),
                // no post-request state accepts a received command
                Message::Command(_) => {
                    unreachable!("rejected by the state machine")
                }
            }
        }
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let frame =
            frame::read_frame_at(&mut self.stream, &self.config, self.offset)?;

        if let Some(payload) = &frame {
            self.offset += 4 + payload.len() as u64;
        }

        Ok(frame)
    }
}

/// Read a gadget request from a stream: an optional command followed by
/// the request header. `None` at a clean end of stream before any
/// message.
pub fn read_request<R>(reader: R, config: &Config) -> Result<Option<GadgetRequest>>
where
    R: io::Read,
{
    let mut frames = frame::FrameReader::new(reader, *config);
    let mut command = None;

    loop {
        let payload = match frames.read_frame()? {
            Some(payload) => payload,
            None if command.is_none() => return Ok(None),
            None => {
                return Err(Error::ProtocolViolation {
                    state: SessionState::AwaitingCommand,
                    received: None,
                })
            }
        };

        match Message::decode(&payload)? {
            Message::Empty => (),
            Message::Command(c) if command.is_none() => command = Some(c),
            Message::CircuitHeader(header) => {
                return Ok(Some(GadgetRequest { command, header }))
            }
            message => {
                return Err(Error::ProtocolViolation {
                    state: SessionState::AwaitingCommand,
                    received: Some(message.kind()),
                })
            }
        }
    }
}

/// Write a gadget response: the header echo followed by the body
/// messages. Enforces the allocation invariant at the producing end so
/// a compliant gadget never emits a rejectable response.
pub fn write_response<W>(
    mut writer: W,
    requested: u64,
    response: &GadgetResponse,
) -> Result<()>
where
    W: io::Write,
{
    if response.header.free_variable_id <= requested {
        return Err(Error::NonMonotonicAllocation {
            requested,
            returned: response.header.free_variable_id,
        });
    }

    Message::CircuitHeader(response.header.clone()).write_into(&mut writer)?;

    for cs in &response.constraint_systems {
        Message::ConstraintSystem(cs.clone()).write_into(&mut writer)?;
    }

    for w in &response.witnesses {
        Message::Witness(w.clone()).write_into(&mut writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_total() {
        let states = [
            SessionState::Idle,
            SessionState::AwaitingCommand,
            SessionState::RequestingConstraints,
            SessionState::RequestingWitness,
            SessionState::AwaitingHeaderEcho,
            SessionState::AwaitingBody,
            SessionState::ProtocolViolation,
        ];

        let kinds = [
            MessageKind::CircuitHeader,
            MessageKind::ConstraintSystem,
            MessageKind::Witness,
            MessageKind::Command,
            MessageKind::Empty,
        ];

        for state in states {
            for flow in [Flow::Constraints, Flow::Witness, Flow::Both] {
                let mut events = vec![Event::Opened, Event::StreamEnded];

                for kind in kinds {
                    events.push(Event::Sent(kind));
                    events.push(Event::Received(kind));
                }

                for event in events {
                    // no input is silently ignored: every pair either
                    // transitions or fails loudly
                    let _ = state.advance(flow, event);
                }
            }
        }
    }

    #[test]
    fn violation_state_is_terminal() {
        let err = SessionState::ProtocolViolation
            .advance(Flow::Constraints, Event::Received(MessageKind::Witness))
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::ProtocolViolation);
    }

    #[test]
    fn body_kinds_follow_the_flow() {
        let state = SessionState::AwaitingBody;

        assert!(state
            .advance(
                Flow::Constraints,
                Event::Received(MessageKind::ConstraintSystem)
            )
            .is_ok());
        assert!(state
            .advance(Flow::Constraints, Event::Received(MessageKind::Witness))
            .is_err());
        assert!(state
            .advance(Flow::Both, Event::Received(MessageKind::Witness))
            .is_ok());
        assert!(state
            .advance(Flow::Both, Event::Received(MessageKind::ConstraintSystem))
            .is_ok());
    }

    #[test]
    fn header_echo_is_required_first() {
        let err = SessionState::AwaitingHeaderEcho
            .advance(Flow::Witness, Event::Received(MessageKind::Witness))
            .unwrap_err();

        match err {
            Error::MissingHeaderEcho { received } => {
                assert_eq!(received, MessageKind::Witness);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn stream_end_mid_reply_is_a_violation() {
        let err = SessionState::AwaitingHeaderEcho
            .advance(Flow::Constraints, Event::StreamEnded)
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::ProtocolViolation);
    }
}
