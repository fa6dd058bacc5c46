//! Client-side controller for the live SoD findings stream.

pub mod api;
pub mod banner;
pub mod decision;
pub mod error;
pub mod registry;
pub mod render;
pub mod session;
pub mod simulation;
pub mod source;
pub mod sse;
pub mod statistics;
pub mod stream;

pub use api::{FindingsApi, HttpFindingsApi, MissingFindingsApi};
pub use banner::ProviderBanner;
pub use decision::{DecisionDraft, DecisionForm};
pub use error::{ClientError, WorkflowError};
pub use registry::{FindingRegistry, RegistryEntry};
pub use render::{mask_email, render_finding, FindingRow, RenderedTable, Row};
pub use session::{FindingsSession, SessionEvent, SessionSnapshot};
pub use simulation::{SimulationForm, SimulationView};
pub use source::{channel_event_source, ChannelEventSource, EventSource, InboundEvent};
pub use sse::{HttpEventSource, SseDecoder, SseError, SseFrame, MAX_LINE_BYTES};
pub use statistics::{build_statistics, StatisticsTable};
pub use stream::{StreamConsumer, StreamPhase};

#[cfg(test)]
#[path = "tests/fixtures.rs"]
pub(crate) mod fixtures;
