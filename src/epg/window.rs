//! Incremental EPG window planning
//!
//! The worker fills the `[min, max]` window in chunks: one hour around `now`
//! first so something shows up quickly, then whole days forward and
//! backward. [`EpgLoadState`] tracks the part that is already populated.

pub const HOUR: i64 = 3600;
pub const DAY: i64 = 86400;

/// One `epg` request covering `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpgLoad {
    pub start: i64,
    pub end: i64,
    pub small_step: bool,
}

impl EpgLoad {
    /// One hour from `start`
    pub fn small(start: i64) -> Self {
        Self { start, end: start + HOUR, small_step: true }
    }

    /// The whole local day beginning at `start`. Days are 23 to 25 hours
    /// long around DST changes, so the end is the next `day_start` boundary.
    pub fn day(start: i64, day_start: impl Fn(i64) -> i64) -> Self {
        Self { start, end: day_start(start + DAY + 2 * HOUR), small_step: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpgLoadState {
    /// At least one load was attempted
    pub loaded: bool,
    pub last_start: i64,
    pub last_end: i64,
}

impl EpgLoadState {
    /// Forget the populated range, the next plan starts from `now` again
    pub fn reset(&mut self) {
        self.last_start = 0;
        self.last_end = 0;
    }

    /// Next chunk needed to cover `[window_min, window_max]`. Forward loads
    /// win over backward ones. Day chunks are aligned with `day_start`; going
    /// backward loads the day holding the second before `last_start`.
    pub fn next_load(
        &self,
        now: i64,
        window_min: i64,
        window_max: i64,
        day_start: impl Fn(i64) -> i64,
    ) -> Option<EpgLoad> {
        if self.last_end == 0 {
            Some(EpgLoad::small(now))
        } else if window_max > self.last_end {
            Some(EpgLoad::day(day_start(self.last_end), &day_start))
        } else if window_min < self.last_start {
            Some(EpgLoad::day(day_start(self.last_start - 1), &day_start))
        } else {
            None
        }
    }

    /// Whether `load` would only fetch what is already there
    pub fn covers(&self, load: &EpgLoad) -> bool {
        self.loaded && self.last_start != 0 && load.start >= self.last_start && load.end <= self.last_end
    }

    /// Record a successful load and clip the populated range to the window
    pub fn extend(&mut self, load: &EpgLoad, window_min: i64, window_max: i64) {
        if self.last_end == 0 {
            self.last_start = load.start;
            self.last_end = load.end;
        } else {
            self.last_start = self.last_start.min(load.start);
            self.last_end = self.last_end.max(load.end);
        }
        self.loaded = true;
        self.clip(window_min, window_max);
    }

    pub fn clip(&mut self, window_min: i64, window_max: i64) {
        if self.last_end == 0 {
            return;
        }
        self.last_start = self.last_start.max(window_min);
        self.last_end = self.last_end.min(window_max);
    }
}
