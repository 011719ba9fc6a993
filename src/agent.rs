//! Q-learning trading agent - action selection, reward, value updates

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::candle::Bar;

/// Trade action produced by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Number of actions in the table
    pub const COUNT: usize = 3;

    /// Action index in `[0, COUNT)`
    pub fn index(self) -> usize {
        match self {
            Action::Buy => 0,
            Action::Sell => 1,
            Action::Hold => 2,
        }
    }

    fn from_index(index: usize) -> Option<Action> {
        match index {
            0 => Some(Action::Buy),
            1 => Some(Action::Sell),
            2 => Some(Action::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::Hold => write!(f, "hold"),
        }
    }
}

/// Agent contract violations, surfaced synchronously to the caller
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("New data must contain exactly one row of data (got {rows})")]
    InvalidNewData { rows: usize },

    #[error("Feature index {index} out of bounds for {num_features} features")]
    FeatureIndexOutOfBounds { index: usize, num_features: usize },

    #[error("State representation is empty")]
    EmptyState,

    #[error("Historical data is empty")]
    EmptyHistory,

    #[error("Current close price is zero")]
    ZeroPrice,
}

/// Hyperparameters, fixed at construction
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Second dimension of the value table
    pub num_features: usize,
    /// Learning rate (alpha), in [0, 1]
    pub learning_rate: f64,
    /// Discount factor (gamma), in [0, 1]
    pub discount_factor: f64,
    /// Probability of taking a random action, in [0, 1]
    pub exploration_prob: f64,
}

/// Tabular Q-learning trader for one instrument session.
///
/// Owns the value table and all mutable runtime state. One agent per
/// instrument worker; never shared across sessions.
pub struct QLearningAgent {
    config: AgentConfig,
    /// Indexed `[action][feature]`, zero-initialized
    q_table: Vec<Vec<f64>>,
    /// State observed at the most recent selection, consumed by the
    /// bootstrap step. None until a state is recorded (first call in a
    /// session) - the bootstrap is skipped rather than dereferenced.
    last_state: Option<Vec<f64>>,
    last_action: Option<Action>,
    cumulative_reward: f64,
    rng: StdRng,
}

impl QLearningAgent {
    /// Create an agent with an entropy-seeded generator
    pub fn new(config: AgentConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an agent with a deterministic seed
    pub fn with_seed(config: AgentConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: AgentConfig, rng: StdRng) -> Self {
        let q_table = vec![vec![0.0; config.num_features]; Action::COUNT];
        Self {
            config,
            q_table,
            last_state: None,
            last_action: None,
            cumulative_reward: 0.0,
            rng,
        }
    }

    /// Running sum of rewards for this session
    pub fn cumulative_reward(&self) -> f64 {
        self.cumulative_reward
    }

    /// Read one value table cell
    pub fn q_value(&self, action: Action, feature_index: usize) -> f64 {
        self.q_table[action.index()][feature_index]
    }

    /// Seed one value table cell (test setup and table restoration)
    pub fn set_q_value(&mut self, action: Action, feature_index: usize, value: f64) {
        self.q_table[action.index()][feature_index] = value;
    }

    /// Epsilon-greedy action selection.
    ///
    /// A scalar state is a one-element slice. Exploitation indexes the
    /// table column by the state's maximal component; a state whose
    /// argmax exceeds the configured feature count is out of contract.
    /// Selection alone does not advance runtime state.
    pub fn choose_action(&mut self, state: &[f64]) -> Result<Action, AgentError> {
        if self.rng.gen::<f64>() < self.config.exploration_prob {
            let index = self.rng.gen_range(0..Action::COUNT);
            return Ok(Action::from_index(index).unwrap_or(Action::Hold));
        }

        let feature_index = self.feature_index(state)?;
        Ok(self.best_action_for_feature(feature_index))
    }

    /// Signed reward from realized price movement.
    ///
    /// Hold pays the magnitude of the move regardless of direction; this
    /// asymmetry is intentional and load-bearing for the learned values.
    pub fn calculate_reward(
        &self,
        action: Action,
        current_close: f64,
        next_close: f64,
    ) -> Result<f64, AgentError> {
        if current_close == 0.0 {
            return Err(AgentError::ZeroPrice);
        }
        let price_change = (next_close - current_close) / current_close;

        Ok(match action {
            Action::Buy => price_change,
            Action::Sell => -price_change,
            Action::Hold => price_change.abs(),
        })
    }

    /// One-step bootstrapped value update for the previous state/action,
    /// then advance runtime state to `action`.
    ///
    /// Skipped entirely when no prior state or action exists - the first
    /// call in a session is a legitimate condition, not a crash.
    pub fn apply_update(&mut self, action: Action, reward: f64) -> Result<(), AgentError> {
        if let (Some(last_action), Some(last_state)) = (self.last_action, self.last_state.as_ref())
        {
            let feature_index = self.feature_index(last_state)?;
            let alpha = self.config.learning_rate;
            let gamma = self.config.discount_factor;

            let current = self.q_table[last_action.index()][feature_index];
            let best_next = self.max_value_for_feature(feature_index);
            let updated = (1.0 - alpha) * current + alpha * (reward + gamma * best_next);
            self.q_table[last_action.index()][feature_index] = updated;
        }

        self.last_state = None;
        self.last_action = Some(action);
        Ok(())
    }

    /// Batch training over consecutive bar pairs, forward in time.
    ///
    /// The state here is the scalar close of the earlier bar - a
    /// deliberately narrower representation than the live path's full
    /// feature vector. Cumulative reward carries over from whatever the
    /// session had already accumulated.
    pub fn train(&mut self, history: &[Bar]) -> Result<(), AgentError> {
        info!("Training the Q-learning model over {} bars...", history.len());

        for pair in history.windows(2) {
            let current_close = pair[0].close();
            let next_close = pair[1].close();
            let state = [current_close];

            let action = self.choose_action(&state)?;
            let reward = self.calculate_reward(action, current_close, next_close)?;
            self.cumulative_reward += reward;

            self.last_state = Some(state.to_vec());
            self.apply_update(action, reward)?;

            let feature_index = self.feature_index(&state)?;
            info!(
                "State: {:.5}, Action: {}, Reward: {:.6}, Updated value: {:.6}, Cumulative reward: {:.6}",
                current_close,
                action,
                reward,
                self.q_table[action.index()][feature_index],
                self.cumulative_reward,
            );
        }

        info!("Training complete.");
        Ok(())
    }

    /// Live single-step update: one new bar against the full history.
    ///
    /// Resets the cumulative reward, so after the call it equals exactly
    /// this step's reward. The state is the entire last historical bar,
    /// not just its close. Returns the selected action for execution.
    pub fn live_update(&mut self, history: &[Bar], new_bars: &[Bar]) -> Result<Action, AgentError> {
        self.cumulative_reward = 0.0;

        if new_bars.len() != 1 {
            return Err(AgentError::InvalidNewData {
                rows: new_bars.len(),
            });
        }
        let current_bar = history.last().ok_or(AgentError::EmptyHistory)?;
        let next_bar = &new_bars[0];

        let state = current_bar.features();
        let action = self.choose_action(&state)?;

        match action {
            Action::Buy => info!("Buy signal detected."),
            Action::Sell => info!("Sell signal detected."),
            Action::Hold => info!("Hold signal detected."),
        }

        let reward = self.calculate_reward(action, current_bar.close(), next_bar.close())?;
        self.cumulative_reward += reward;

        let feature_index = self.feature_index(&state)?;
        self.last_state = Some(state);
        self.apply_update(action, reward)?;

        info!(
            "State: {:.5}, Action: {}, Reward: {:.6}, Updated value: {:.6}, Cumulative reward: {:.6}",
            current_bar.close(),
            action,
            reward,
            self.q_table[action.index()][feature_index],
            self.cumulative_reward,
        );

        Ok(action)
    }

    /// Index of the maximal state component; ties resolve to the lowest
    /// index. Out-of-range indexes are contract violations, never clamped.
    fn feature_index(&self, state: &[f64]) -> Result<usize, AgentError> {
        let mut best = 0;
        let mut best_value = *state.first().ok_or(AgentError::EmptyState)?;
        for (i, &value) in state.iter().enumerate().skip(1) {
            if value > best_value {
                best = i;
                best_value = value;
            }
        }

        if best >= self.config.num_features {
            return Err(AgentError::FeatureIndexOutOfBounds {
                index: best,
                num_features: self.config.num_features,
            });
        }
        Ok(best)
    }

    /// Action with the highest value in a table column; ties resolve to
    /// the lowest action index.
    fn best_action_for_feature(&self, feature_index: usize) -> Action {
        let mut best = 0;
        for action in 1..Action::COUNT {
            if self.q_table[action][feature_index] > self.q_table[best][feature_index] {
                best = action;
            }
        }
        Action::from_index(best).unwrap_or(Action::Hold)
    }

    fn max_value_for_feature(&self, feature_index: usize) -> f64 {
        (0..Action::COUNT)
            .map(|action| self.q_table[action][feature_index])
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
