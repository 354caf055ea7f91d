use time::{Duration, OffsetDateTime, UtcOffset};

/// Next daylight-saving start and end instants.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DstTransitions {
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl DstTransitions {
    #[must_use]
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> OffsetDateTime {
        self.end
    }
}

/// Source of wall-clock time for the time-set flow.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> OffsetDateTime;

    /// Total offset from UTC, including any daylight-saving shift.
    fn utc_offset(&self) -> UtcOffset;

    /// Portion of [`Clock::utc_offset`] contributed by daylight saving.
    fn dst_offset(&self) -> Duration {
        Duration::ZERO
    }

    fn next_dst_transitions(&self) -> Option<DstTransitions> {
        None
    }
}

/// Reads the system clock and reports a configured UTC offset.
///
/// The offset is supplied by the caller because the local offset cannot be
/// read soundly once the runtime has spawned threads.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    #[must_use]
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    #[must_use]
    pub fn utc() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    fn utc_offset(&self) -> UtcOffset {
        self.offset
    }
}

/// Clock frozen at one instant, for tests and reproducible simulations.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: OffsetDateTime,
    offset: UtcOffset,
    dst_offset: Duration,
    transitions: Option<DstTransitions>,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now,
            offset: now.offset(),
            dst_offset: Duration::ZERO,
            transitions: None,
        }
    }

    #[must_use]
    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self.now = self.now.to_offset(offset);
        self
    }

    #[must_use]
    pub fn with_dst_offset(mut self, dst_offset: Duration) -> Self {
        self.dst_offset = dst_offset;
        self
    }

    #[must_use]
    pub fn with_dst_transitions(mut self, transitions: DstTransitions) -> Self {
        self.transitions = Some(transitions);
        self
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now
    }

    fn utc_offset(&self) -> UtcOffset {
        self.offset
    }

    fn dst_offset(&self) -> Duration {
        self.dst_offset
    }

    fn next_dst_transitions(&self) -> Option<DstTransitions> {
        self.transitions
    }
}
