use std::thread;
use std::time::Duration;

/// Delay policy applied between parameter combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Each handler's own interval.
    #[default]
    Fixed,
    Override(Duration),
    Disabled,
}

impl Pacing {
    pub fn interval(&self, handler_default: Duration) -> Option<Duration> {
        match self {
            Pacing::Fixed => Some(handler_default),
            Pacing::Override(d) => Some(*d),
            Pacing::Disabled => None,
        }
        .filter(|d| !d.is_zero())
    }

    pub fn pause(&self, handler_default: Duration) {
        if let Some(d) = self.interval(handler_default) {
            thread::sleep(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Pacing;

    #[test]
    fn policies_resolve_interval() {
        let base = Duration::from_millis(500);
        assert_eq!(Pacing::Fixed.interval(base), Some(base));
        assert_eq!(
            Pacing::Override(Duration::from_millis(5)).interval(base),
            Some(Duration::from_millis(5))
        );
        assert_eq!(Pacing::Disabled.interval(base), None);
        assert_eq!(Pacing::Override(Duration::ZERO).interval(base), None);
    }
}
