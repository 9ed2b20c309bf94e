use std::mem;

use log::trace;

/// Batch released when a window closes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow<T> {
    pub batch: Vec<T>,
    /// Latest GPS week seen in this window
    pub week: Option<i16>,
    /// Latest leap second offset seen in this window
    pub leap_seconds: Option<i8>,
}

/// Per stream window state.
///
/// Items come with a progress metric that strictly increases within a
/// minute. Any decrease (or repetition) means the minute rolled over: the
/// current batch is released and the item opens the next window.
#[derive(Debug, Clone)]
pub struct WindowState<T> {
    batch: Vec<T>,
    carry_over: Vec<T>,
    last_metric: Option<f64>,
    week: Option<i16>,
    leap_seconds: Option<i8>,
}

impl<T> Default for WindowState<T> {
    fn default() -> Self {
        Self {
            batch: Vec::new(),
            carry_over: Vec::new(),
            last_metric: None,
            week: None,
            leap_seconds: None,
        }
    }
}

impl<T> WindowState<T> {
    /// Latest known GPS week
    pub fn week(&self) -> Option<i16> {
        self.week
    }

    /// Latest known leap second offset
    pub fn leap_seconds(&self) -> Option<i8> {
        self.leap_seconds
    }

    /// Items of the window being accumulated
    pub fn batch(&self) -> &[T] {
        &self.batch
    }

    /// Refreshes cached week and leap seconds, absent values are ignored.
    pub fn observe(&mut self, week: Option<i16>, leap_seconds: Option<i8>) {
        if week.is_some() {
            self.week = week;
        }
        if leap_seconds.is_some() {
            self.leap_seconds = leap_seconds;
        }
    }

    /// Aggregates one item. Returns the released window on rollover.
    pub fn push(
        &mut self,
        item: T,
        metric: f64,
        week: Option<i16>,
        leap_seconds: Option<i8>,
    ) -> Option<ClosedWindow<T>> {
        match self.last_metric {
            Some(last) if metric <= last => {
                trace!("window rollover: {:.3} <= {:.3}", metric, last);

                self.carry_over.push(item);

                let closed = ClosedWindow {
                    batch: mem::take(&mut self.batch),
                    week: self.week,
                    leap_seconds: self.leap_seconds,
                };

                self.batch = mem::take(&mut self.carry_over);
                self.last_metric = Some(metric);
                self.observe(week, leap_seconds);

                Some(closed)
            },
            _ => {
                self.batch.push(item);
                self.last_metric = Some(metric);
                self.observe(week, leap_seconds);
                None
            },
        }
    }

    /// Releases the current batch without waiting for a rollover.
    pub fn flush(&mut self) -> Option<ClosedWindow<T>> {
        if self.batch.is_empty() {
            return None;
        }

        self.last_metric = None;

        Some(ClosedWindow {
            batch: mem::take(&mut self.batch),
            week: self.week,
            leap_seconds: self.leap_seconds,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rollover() {
        let mut window = WindowState::<f64>::default();

        let mut closed = Vec::new();
        for metric in [5.0, 20.0, 40.0, 58.0, 3.0, 10.0] {
            if let Some(released) = window.push(metric, metric, Some(2150), Some(18)) {
                closed.push(released);
            }
        }

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].batch, vec![5.0, 20.0, 40.0, 58.0]);
        assert_eq!(closed[0].week, Some(2150));
        assert_eq!(closed[0].leap_seconds, Some(18));

        assert_eq!(window.batch(), &[3.0, 10.0]);
    }

    #[test]
    fn repeated_metric_closes() {
        let mut window = WindowState::<u32>::default();
        assert!(window.push(1, 12.0, None, None).is_none());

        let closed = window.push(2, 12.0, None, None).unwrap();
        assert_eq!(closed.batch, vec![1]);
        assert_eq!(window.batch(), &[2]);
    }

    #[test]
    fn first_item_always_accepted() {
        let mut window = WindowState::<u32>::default();
        assert!(window.push(1, 59.5, None, None).is_none());
        assert_eq!(window.batch(), &[1]);
    }

    #[test]
    fn closed_window_carries_values_prior_to_rollover() {
        let mut window = WindowState::<u32>::default();
        window.push(1, 10.0, Some(2150), Some(17));
        let closed = window.push(2, 1.0, Some(2151), Some(18)).unwrap();

        assert_eq!(closed.week, Some(2150));
        assert_eq!(closed.leap_seconds, Some(17));
        assert_eq!(window.week(), Some(2151));
        assert_eq!(window.leap_seconds(), Some(18));
    }

    #[test]
    fn flush() {
        let mut window = WindowState::<u32>::default();
        assert!(window.flush().is_none());

        window.push(1, 10.0, None, Some(18));
        window.push(2, 20.0, None, Some(18));

        let closed = window.flush().unwrap();
        assert_eq!(closed.batch, vec![1, 2]);
        assert!(window.batch().is_empty());

        // baseline was reset
        assert!(window.push(3, 5.0, None, None).is_none());
    }
}
