//! Gain automation timeline
//!
//! A small rendition of an audio parameter's event list. Two event kinds are
//! supported: jump to a value at a time, and approach a target exponentially
//! starting at a time. The event at or before `t` governs the value at `t`; a
//! target approach starts from whatever value was in force when it begins.

use reef_common::volume;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Curve {
    Constant(f64),
    Target {
        from: f64,
        to: f64,
        start: f64,
        time_constant: f64,
    },
}

impl Curve {
    fn value_at(&self, t: f64) -> f64 {
        match *self {
            Curve::Constant(v) => v,
            Curve::Target {
                from,
                to,
                start,
                time_constant,
            } => volume::approach(from, to, t - start, time_constant),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue { value: f64, time: f64 },
    SetTarget { target: f64, time: f64, time_constant: f64 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. } | Automation::SetTarget { time, .. } => time,
        }
    }

    fn apply(&self, current: Curve) -> Curve {
        match *self {
            Automation::SetValue { value, .. } => Curve::Constant(value),
            Automation::SetTarget {
                target,
                time,
                time_constant,
            } => Curve::Target {
                from: current.value_at(time),
                to: target,
                start: time,
                time_constant,
            },
        }
    }
}

/// Scheduled gain values
///
/// Events at or before the newest insertion time are folded into a single
/// base curve, so the list stays short however often the gain is touched.
#[derive(Debug, Clone)]
pub struct GainParam {
    base: Curve,
    pending: Vec<Automation>,
}

impl GainParam {
    pub fn new(initial: f32) -> Self {
        Self {
            base: Curve::Constant(initial as f64),
            pending: Vec::new(),
        }
    }

    /// Jump to `value` at time `time`
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Automation::SetValue {
            value: value as f64,
            time,
        });
    }

    /// Start approaching `target` at `time` with the given time constant (seconds)
    pub fn set_target_at_time(&mut self, target: f32, time: f64, time_constant: f64) {
        self.insert(Automation::SetTarget {
            target: target as f64,
            time,
            time_constant,
        });
    }

    /// Gain in force at time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut curve = self.base;
        for event in self.pending.iter().filter(|e| e.time() <= t) {
            curve = event.apply(curve);
        }
        curve.value_at(t) as f32
    }

    /// Number of events not yet folded into the base curve
    #[cfg(test)]
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    fn insert(&mut self, event: Automation) {
        let time = event.time();

        // Fold everything that is already in force at the new event's time.
        let mut remaining = Vec::with_capacity(self.pending.len() + 1);
        for existing in self.pending.drain(..) {
            if existing.time() <= time {
                self.base = existing.apply(self.base);
            } else {
                remaining.push(existing);
            }
        }

        // Stable insert: equal times keep call order.
        let index = remaining
            .iter()
            .position(|e| e.time() > time)
            .unwrap_or(remaining.len());
        remaining.insert(index, event);
        self.pending = remaining;
    }
}

impl Default for GainParam {
    fn default() -> Self {
        Self::new(1.0)
    }
}
