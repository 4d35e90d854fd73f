/// Viewport ranges.
///
/// A `Range` is a half-open window `[lo, hi)` over the logical ordering of a
/// view, optionally widened by `buffer_size` rows on both sides.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub lo: usize,
    pub hi: usize,
    #[serde(default)]
    pub buffer_size: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
}

pub const NULL_RANGE: Range = Range {
    lo: 0,
    hi: 0,
    buffer_size: 0,
    reset: false,
};

impl Range {
    pub fn new(lo: usize, hi: usize) -> Self {
        Range {
            lo,
            hi,
            ..NULL_RANGE
        }
    }

    pub fn with_buffer(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn len(&self) -> usize {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.lo && pos < self.hi
    }

    /// The range widened by its buffer, clamped at zero.
    pub fn full(&self) -> Range {
        Range {
            lo: self.lo.saturating_sub(self.buffer_size),
            hi: self.hi + self.buffer_size,
            buffer_size: 0,
            reset: false,
        }
    }

    /// Same window size moved back to the top.
    pub fn reset(&self) -> Range {
        Range {
            lo: 0,
            hi: self.len(),
            buffer_size: self.buffer_size,
            reset: true,
        }
    }
}

/// Rows that enter the window moving from `old` to `new`.
///
/// When the windows do not overlap, or the new one grows on both sides, the
/// whole new window is returned. When nothing new enters, the result is empty.
pub fn get_delta_range(old: &Range, new: &Range) -> Range {
    let old = old.full();
    let new = new.full();

    if old.is_empty() || new.lo >= old.hi || new.hi <= old.lo {
        return new;
    }
    match (new.lo < old.lo, new.hi > old.hi) {
        (true, true) => new,
        (true, false) => Range::new(new.lo, old.lo),
        (false, true) => Range::new(old.hi, new.hi),
        (false, false) => Range::new(new.hi, new.hi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_range_applies_buffer() {
        let r = Range::new(5, 15).with_buffer(10);
        assert_eq!(r.full(), Range::new(0, 25));
        assert_eq!(Range::new(30, 40).with_buffer(10).full(), Range::new(20, 50));
    }

    #[test]
    fn test_delta_scrolling_down() {
        let delta = get_delta_range(&Range::new(0, 10), &Range::new(5, 15));
        assert_eq!(delta, Range::new(10, 15));
    }

    #[test]
    fn test_delta_scrolling_up() {
        let delta = get_delta_range(&Range::new(10, 20), &Range::new(5, 15));
        assert_eq!(delta, Range::new(5, 10));
    }

    #[test]
    fn test_delta_jump_and_first_range() {
        assert_eq!(get_delta_range(&Range::new(0, 10), &Range::new(50, 60)), Range::new(50, 60));
        assert_eq!(get_delta_range(&NULL_RANGE, &Range::new(0, 10)), Range::new(0, 10));
        assert_eq!(get_delta_range(&Range::new(10, 20), &Range::new(5, 25)), Range::new(5, 25));
    }

    #[test]
    fn test_delta_shrinking_is_empty() {
        let delta = get_delta_range(&Range::new(0, 20), &Range::new(5, 15));
        assert!(delta.is_empty());
    }

    #[test]
    fn test_reset_and_wire_shape() {
        let r = Range::new(40, 60).with_buffer(5).reset();
        assert_eq!((r.lo, r.hi, r.buffer_size, r.reset), (0, 20, 5, true));

        let parsed: Range = serde_json::from_str(r#"{"lo":0,"hi":10}"#).unwrap();
        assert_eq!(parsed, Range::new(0, 10));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"lo":0,"hi":10,"bufferSize":0}"#);
    }
}
