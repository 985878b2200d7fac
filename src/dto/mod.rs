use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod admin;
pub mod health;
pub mod public;
pub mod sse;
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Render a stored `createdAt` (milliseconds since the Unix epoch) as RFC 3339.
fn format_epoch_millis(millis: u64) -> String {
    format_system_time(UNIX_EPOCH + Duration::from_millis(millis))
}

/// Milliseconds since the Unix epoch, as stored in `createdAt`.
pub fn now_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_render_as_rfc3339() {
        assert_eq!(format_epoch_millis(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_epoch_millis(1_700_000_000_000), "2023-11-14T22:13:20Z");
    }
}
