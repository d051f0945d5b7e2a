use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLrState {
    pub base_lr: f64,
    pub step_size: usize,
    pub gamma: f64,
    pub last_step: usize,
}

/// Decays the learning rate by `gamma` every `step_size` optimizer steps.
#[derive(Debug, Clone)]
pub struct StepLr {
    state: StepLrState,
}

impl StepLr {
    pub fn new(base_lr: f64, step_size: usize, gamma: f64) -> Self {
        StepLr {
            state: StepLrState {
                base_lr,
                step_size: step_size.max(1),
                gamma,
                last_step: 0,
            },
        }
    }

    pub fn from_state(state: StepLrState) -> Self {
        StepLr { state }
    }

    pub fn state(&self) -> &StepLrState {
        &self.state
    }

    pub fn step(&mut self) {
        self.state.last_step += 1;
    }

    pub fn learning_rate(&self) -> f64 {
        let decays = self.state.last_step / self.state.step_size.max(1);
        self.state.base_lr * self.state.gamma.powf(decays as f64)
    }
}
