//! Q-learning forex trading runner
//!
//! The agent in [`agent`] is the decision core; everything else feeds it
//! (history, indicators) or consumes its actions (broker, live pipeline).

pub mod agent;
pub mod broker;
pub mod candle;
pub mod config;
pub mod history;
pub mod indicators;
pub mod stream;

// Re-export main types for convenience
pub use agent::{Action, AgentConfig, AgentError, QLearningAgent};
pub use broker::{BrokerClient, OrderResult};
pub use candle::{Bar, Candle};
pub use config::{InstrumentSpec, Settings, TradingMode};
pub use history::HistoryClient;
pub use stream::LivePipeline;
