//! `Set-Cookie` instructions queued on the response.

use time::format_description::BorrowedFormatItem;
use time::macros::{datetime, format_description};
use time::{Duration, OffsetDateTime, UtcOffset};

/// IMF-fixdate, the `Expires` attribute format from RFC 6265.
const COOKIE_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

const LATEST_EXPIRY: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// `None` makes a browser-session cookie.
    pub expires: Option<OffsetDateTime>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
}

impl SetCookie {
    /// Cookie carrying a session id, expiring `expiry_seconds` from `now`.
    ///
    /// Zero seconds means no explicit expiry.
    #[must_use]
    pub fn session(
        name: impl Into<String>,
        value: impl Into<String>,
        expiry_seconds: u64,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: expiry_at(now, expiry_seconds),
            path: "/".to_string(),
            domain: None,
            secure: false,
        }
    }

    /// Cookie instructing the client to drop `name` immediately.
    #[must_use]
    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            expires: Some(OffsetDateTime::UNIX_EPOCH),
            path: "/".to_string(),
            domain: None,
            secure: false,
        }
    }

    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.value.is_empty() && self.expires == Some(OffsetDateTime::UNIX_EPOCH)
    }

    /// Renders the value of a `Set-Cookie` response header.
    pub fn header_value(&self) -> Result<String, time::error::Format> {
        let mut header = format!("{}={}", self.name, self.value);
        if let Some(expires) = self.expires {
            let formatted = expires.to_offset(UtcOffset::UTC).format(COOKIE_DATE)?;
            header.push_str("; Expires=");
            header.push_str(&formatted);
        }
        if let Some(domain) = &self.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }
        header.push_str("; Path=");
        header.push_str(&self.path);
        if self.secure {
            header.push_str("; Secure");
        }
        Ok(header)
    }
}

fn expiry_at(now: OffsetDateTime, expiry_seconds: u64) -> Option<OffsetDateTime> {
    if expiry_seconds == 0 {
        return None;
    }
    let seconds = i64::try_from(expiry_seconds).unwrap_or(i64::MAX);
    Some(now.checked_add(Duration::seconds(seconds)).unwrap_or(LATEST_EXPIRY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_expiry_is_a_browser_session_cookie() {
        let cookie = SetCookie::session("sid", "abc", 0, datetime!(2026-10-19 12:00 UTC));
        assert_eq!(cookie.expires, None);
        assert_eq!(
            cookie.header_value().expect("header should render"),
            "sid=abc; Path=/"
        );
    }

    #[test]
    fn expiry_is_offset_from_now_and_rendered_in_gmt() {
        let cookie = SetCookie::session("sid", "abc", 3600, datetime!(2026-10-19 12:00 +02:00));
        assert_eq!(cookie.expires, Some(datetime!(2026-10-19 13:00 +02:00)));
        assert_eq!(
            cookie.header_value().expect("header should render"),
            "sid=abc; Expires=Mon, 19 Oct 2026 11:00:00 GMT; Path=/"
        );
    }

    #[test]
    fn removal_cookie_expires_at_epoch() {
        let cookie = SetCookie::removal("sid");
        assert!(cookie.is_removal());
        assert_eq!(
            cookie.header_value().expect("header should render"),
            "sid=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/"
        );
    }

    #[test]
    fn optional_attributes_render_when_set() {
        let mut cookie = SetCookie::session("sid", "abc", 0, OffsetDateTime::UNIX_EPOCH);
        cookie.domain = Some("example.com".to_string());
        cookie.secure = true;
        assert_eq!(
            cookie.header_value().expect("header should render"),
            "sid=abc; Domain=example.com; Path=/; Secure"
        );
    }
}
