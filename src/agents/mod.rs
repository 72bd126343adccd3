//! Agent System
//!
//! The conversational side of the application:
//!
//! - **Agent Factory**: validates the LLM credential once and builds a fresh
//!   agent for every dataset selection
//! - **Query Agent**: answers questions about its bound dataset, replaying
//!   conversation memory as context
//! - **Analysis Sandbox**: runs model-generated analysis code, when the
//!   operator has enabled it
//!
//! ## Query Flow
//!
//! ```text
//! Question
//!    │
//!    ▼
//! ┌─────────────┐   code block   ┌─────────────┐
//! │ Query Agent │ ─────────────▶ │   Sandbox   │
//! │  (LLM call) │ ◀───────────── │ (subprocess)│
//! └─────────────┘   observation  └─────────────┘
//!    │
//!    ▼
//! Answer  → appended to conversation memory
//! ```

pub mod factory;
pub mod memory;
pub mod query;
pub mod sandbox;

pub use factory::{AgentFactory, AgentSettings};
pub use memory::{ConversationMemory, ConversationTurn};
pub use query::{QueryAgent, QueryAnswer};
pub use sandbox::{AnalysisSandbox, ExecutionOutput};
