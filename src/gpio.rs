use crate::config::SwitchConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Floating,
    PullUp,
    PullDown,
}

/// A requested input line. Each line is owned by exactly one monitor.
pub trait InputLine: Send {
    /// Instantaneous level, `true` for logical high.
    fn read_level(&mut self) -> Result<bool, AppError>;
}

pub trait GpioBackend: Send + Sync {
    type Line: InputLine + 'static;

    fn request_input(
        &self,
        pin_id: u32,
        pin: &SwitchConfig,
        bias: Bias,
    ) -> Result<Self::Line, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Edge detection over successive samples. The level before the first sample
/// is taken as low.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, level: bool) -> Option<Edge> {
        let edge = match (self.previous, level) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        };
        self.previous = level;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(levels: &[bool]) -> Vec<Edge> {
        let mut detector = EdgeDetector::new();
        levels.iter().filter_map(|l| detector.sample(*l)).collect()
    }

    #[test]
    fn steady_low_never_fires() {
        assert!(edges(&[false, false, false]).is_empty());
    }

    #[test]
    fn idle_pulled_up_pin_fires_rising_once() {
        assert_eq!(edges(&[true, true, true, true]), vec![Edge::Rising]);
    }

    #[test]
    fn one_edge_per_transition() {
        let levels = [true, true, false, false, false, true, false, true, true];
        assert_eq!(
            edges(&levels),
            vec![
                Edge::Rising,
                Edge::Falling,
                Edge::Rising,
                Edge::Falling,
                Edge::Rising
            ]
        );
    }

    #[test]
    fn edge_count_matches_level_changes() {
        let levels: Vec<bool> = (0..200).map(|i| (i / 3) % 2 == 1 || i % 7 == 0).collect();
        let mut prev = false;
        let mut rising = 0;
        let mut falling = 0;
        for l in &levels {
            match (prev, *l) {
                (false, true) => rising += 1,
                (true, false) => falling += 1,
                _ => {}
            }
            prev = *l;
        }

        let found = edges(&levels);
        assert_eq!(found.iter().filter(|e| **e == Edge::Rising).count(), rising);
        assert_eq!(found.iter().filter(|e| **e == Edge::Falling).count(), falling);
    }
}
