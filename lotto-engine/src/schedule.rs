use chrono::{DateTime, Utc};
use lotto_core::DrawSchedule;

/// Start of the drawing window containing `now`, if `now` is inside one.
pub fn window_start(schedule: &DrawSchedule, now: DateTime<Utc>) -> Option<i64> {
    let offset = schedule.epoch_offset.as_secs() as i64;
    let period = schedule.period.as_secs() as i64;
    let window = schedule.window.as_secs() as i64;

    let since = now.timestamp() - offset;
    let into_period = since.rem_euclid(period);
    if into_period < window {
        Some(now.timestamp() - into_period)
    } else {
        None
    }
}

/// First window start at or after `now`.
pub fn next_draw_time(schedule: &DrawSchedule, now: DateTime<Utc>) -> DateTime<Utc> {
    let offset = schedule.epoch_offset.as_secs() as i64;
    let period = schedule.period.as_secs() as i64;

    let since = now.timestamp() - offset;
    let periods = since.div_euclid(period) + i64::from(since.rem_euclid(period) != 0);
    let next = offset + periods * period;
    DateTime::from_timestamp(next, 0).unwrap_or(now)
}
