/// Every appointment occupies exactly one 30-minute slot.
pub const SLOT_MINUTES: i32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed time {0:?}, expected HH:MM")]
pub struct MalformedTime(pub String);

/// Parse "HH:MM" into minutes since midnight.
pub fn to_minutes(hhmm: &str) -> Result<i32, MalformedTime> {
    let mut parts = hhmm.split(':');
    let (hour, minute) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), None) => {
            let hour: i32 = h
                .trim()
                .parse()
                .map_err(|_| MalformedTime(hhmm.to_string()))?;
            let minute: i32 = m
                .trim()
                .parse()
                .map_err(|_| MalformedTime(hhmm.to_string()))?;
            (hour, minute)
        }
        _ => return Err(MalformedTime(hhmm.to_string())),
    };

    if !(0..=23).contains(&hour) || !(0..=59).contains(&minute) {
        return Err(MalformedTime(hhmm.to_string()));
    }

    Ok(hour * 60 + minute)
}

/// Render minutes since midnight as zero-padded "HH:MM".
pub fn from_minutes(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open interval overlap: [a, a+da) and [b, b+db) share a point.
/// Back-to-back slots (end of one == start of the other) do not overlap.
pub fn overlaps(a_start: i32, a_duration: i32, b_start: i32, b_duration: i32) -> bool {
    a_start < b_start + b_duration && b_start < a_start + a_duration
}

/// All slot start times from `work_start` in `step`-minute increments,
/// strictly before `work_end`.
pub fn slot_grid(work_start: &str, work_end: &str, step: i32) -> Result<Vec<String>, MalformedTime> {
    let start = to_minutes(work_start)?;
    let end = to_minutes(work_end)?;

    let mut slots = Vec::new();
    let mut cursor = start;
    while cursor < end {
        slots.push(from_minutes(cursor));
        cursor += step;
    }
    Ok(slots)
}
