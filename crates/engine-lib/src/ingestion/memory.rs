use super::ObservationSource;
use crate::models::Observation;
use anyhow::Result;
use async_trait::async_trait;

/// Source over a fixed list of observations
#[derive(Debug, Clone)]
pub struct MemorySource {
    observations: Vec<Observation>,
    position: usize,
    looping: bool,
}

impl MemorySource {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            position: 0,
            looping: false,
        }
    }

    /// Restart from the first observation once exhausted
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }
}

#[async_trait]
impl ObservationSource for MemorySource {
    async fn next_observation(&mut self) -> Result<Option<Observation>> {
        if self.position >= self.observations.len() {
            if !self.looping || self.observations.is_empty() {
                return Ok(None);
            }
            self.position = 0;
        }
        let observation = self.observations[self.position].clone();
        self.position += 1;
        Ok(Some(observation))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
