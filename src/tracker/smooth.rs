use std::collections::VecDeque;

/// Moving average over the last `window` samples
///
/// Damps landmark jitter in the depth signal before any threshold decision.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    samples: VecDeque<f32>,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    /// Push a sample and return the current average
    pub fn apply(&mut self, value: f32) -> f32 {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.mean()
    }

    pub fn value(&self) -> Option<f32> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.mean())
        }
    }

    // summed per call, no running total to drift
    fn mean(&self) -> f32 {
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
