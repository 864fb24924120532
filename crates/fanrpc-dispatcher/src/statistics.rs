// Copyright 2025 fanrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Serialize;

/// Number of samples collapsed into one average.
pub const DEFAULT_STATS_WINDOW: usize = 10;

/// A single latency observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSample {
    /// Wall-clock duration of one successful remote call, in seconds
    #[serde(rename = "timeline")]
    pub seconds: f64,
}

/// Tumbling latency window for one executor.
///
/// Samples accumulate until the window is full, at which point their mean
/// becomes the new average and the samples are discarded. The average
/// therefore describes the most recently *completed* window, and memory per
/// executor stays bounded by the window size.
///
/// The average is informational. Selection never looks at it.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: Vec<StatisticsSample>,
    window: usize,
    average: f64,
    completed_windows: u64,
}

impl LatencyWindow {
    /// Creates an empty window. A size of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: Vec::with_capacity(window),
            window,
            average: 0.0,
            completed_windows: 0,
        }
    }

    /// Records one sample and returns the new average if this sample
    /// completed the window.
    pub fn record(&mut self, seconds: f64) -> Option<f64> {
        self.samples.push(StatisticsSample { seconds });

        if self.samples.len() < self.window {
            return None;
        }

        let sum: f64 = self.samples.iter().map(|s| s.seconds).sum();
        self.average = sum / self.samples.len() as f64;
        self.samples.clear();
        self.completed_windows += 1;
        Some(self.average)
    }

    /// Samples of the window currently being filled.
    pub fn samples(&self) -> &[StatisticsSample] {
        &self.samples
    }

    /// Mean of the last completed window, or 0.0 before the first one.
    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn completed_windows(&self) -> u64 {
        self.completed_windows
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_default_size() {
        let window = LatencyWindow::default();
        assert_eq!(window.window(), 10);
        assert!(window.samples().is_empty());
        assert_eq!(window.average(), 0.0);
    }

    #[test]
    fn test_average_after_full_window() {
        let mut window = LatencyWindow::new(10);
        let samples: Vec<f64> = (1..=10).map(|i| i as f64 * 0.1).collect();

        for s in &samples[..9] {
            assert_eq!(window.record(*s), None);
        }
        assert_eq!(window.samples().len(), 9);
        assert_eq!(window.average(), 0.0);

        let mean = samples.iter().sum::<f64>() / 10.0;
        let average = window.record(samples[9]).unwrap();
        assert!((average - mean).abs() < 1e-12);
        assert!((window.average() - mean).abs() < 1e-12);
        assert!(window.samples().is_empty());
        assert_eq!(window.completed_windows(), 1);
    }

    #[test]
    fn test_average_reflects_last_completed_window() {
        let mut window = LatencyWindow::new(2);
        window.record(1.0);
        window.record(3.0);
        assert_eq!(window.average(), 2.0);

        // A partial window leaves the previous average in place
        window.record(10.0);
        assert_eq!(window.average(), 2.0);
        assert_eq!(window.samples().len(), 1);

        window.record(20.0);
        assert_eq!(window.average(), 15.0);
        assert_eq!(window.completed_windows(), 2);
    }

    #[test]
    fn test_samples_never_exceed_window() {
        let mut window = LatencyWindow::new(3);
        for i in 0..100 {
            window.record(i as f64);
            assert!(window.samples().len() < 3);
        }
    }

    #[test]
    fn test_zero_window_is_one() {
        let mut window = LatencyWindow::new(0);
        assert_eq!(window.window(), 1);
        assert_eq!(window.record(0.5), Some(0.5));
        assert!(window.samples().is_empty());
    }
}
