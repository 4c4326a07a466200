use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of "now" for timestamps and overdue checks.
pub trait Clock {
    fn now(&self) -> PrimitiveDateTime;

    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Local wall-clock time, falling back to UTC when the offset is unknown.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc().to_offset(local_offset());
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

pub struct FixedClock(pub PrimitiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        self.0
    }
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}
