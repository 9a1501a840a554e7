use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

/// Opaque single-use token for account confirmation and password reset links.
/// 32 bytes from the OS CSPRNG, URL-safe so it can ride in a path segment.
pub fn new_token() -> String {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Confirmation links stay valid for a day.
pub fn confirmation_deadline() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::hours(24)
}

/// Reset links expire quickly; a leaked unconsumed token must not stay live.
pub fn reset_deadline() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::hours(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_are_url_safe() {
        let t = new_token();
        assert!(t
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(t.len(), 43);
    }

    #[test]
    fn deadlines_are_in_the_future() {
        let now = OffsetDateTime::now_utc();
        assert!(confirmation_deadline() > now);
        assert!(reset_deadline() > now);
        assert!(confirmation_deadline() > reset_deadline());
    }
}
