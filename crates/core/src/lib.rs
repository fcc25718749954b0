//! Scholar Core
//!
//! The request/response pipeline behind the stdio agent: line framing, feature
//! routing, the agent adapter contract, extraction of text from opaque agent
//! replies, normalization, quiz and interview JSON repair, conversation
//! history and response framing.

pub mod agent;
pub mod extract;
pub mod history;
pub mod normalize;
pub mod protocol;
pub mod quiz;
pub mod request;
pub mod response;
pub mod router;
pub mod session;

pub use agent::{AgentAdapter, HttpAgent, MockAgent, OutputFormat, Parameters};
pub use history::{ConversationTurn, HistoryStore};
pub use protocol::{Framing, Payload, SENTINEL};
pub use response::RawResponse;
pub use session::{Session, SessionSettings};
