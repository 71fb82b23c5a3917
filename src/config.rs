use serde::{Deserialize, Serialize};
use toml_base_config::BaseConfig;

/// Flow of a gadget exchange.
///
/// A session that carries no [`Command`](crate::Command) message has no
/// in-band way to tell constraint generation from witness generation;
/// the caller supplies the active flow through [`Config::flow`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Flow {
    /// Constraint-generation exchange.
    #[default]
    Constraints,
    /// Witness-generation exchange.
    Witness,
    /// Both flows, interleaved by message order.
    Both,
}

impl Flow {
    /// Whether the gadget body may carry constraint systems.
    pub const fn constraints(&self) -> bool {
        matches!(self, Self::Constraints | Self::Both)
    }

    /// Whether the gadget body may carry witnesses.
    pub const fn witnesses(&self) -> bool {
        matches!(self, Self::Witness | Self::Both)
    }
}

/// Configuration parameters for framing and session handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on a frame payload, checked before allocation.
    pub max_frame_size: usize,
    /// Flow assumed for sessions that open without a command message.
    pub flow: Flow,
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Config {
    /// Default value as constant.
    pub const DEFAULT: Self = Self {
        // large enough for any realistic circuit chunk, small enough
        // to bound a hostile length prefix
        max_frame_size: 64 * 1024 * 1024,
        flow: Flow::Constraints,
    };

    /// Set the maximum accepted frame payload size.
    pub fn with_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Set the flow assumed for command-less sessions.
    pub fn with_flow(&mut self, flow: Flow) -> &mut Self {
        self.flow = flow;
        self
    }
}

impl BaseConfig for Config {
    const PACKAGE: &'static str = env!("CARGO_PKG_NAME");
}

#[test]
fn builder_functions_works() {
    let config = *Config::default()
        .with_max_frame_size(1024)
        .with_flow(Flow::Witness);

    assert_eq!(config.max_frame_size, 1024);
    assert_eq!(config.flow, Flow::Witness);
}

#[test]
fn flow_predicates_works() {
    assert!(Flow::Constraints.constraints());
    assert!(!Flow::Constraints.witnesses());
    assert!(Flow::Witness.witnesses());
    assert!(!Flow::Witness.constraints());
    assert!(Flow::Both.constraints() && Flow::Both.witnesses());
}
