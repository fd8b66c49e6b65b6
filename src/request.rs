//! The slice of an HTTP request/response that the session engine touches.

use std::collections::HashMap;

use crate::cookie::SetCookie;

/// Cookie and parameter lookup on the incoming request plus a way to queue
/// `Set-Cookie` instructions on the outgoing response.
pub trait RequestContext {
    fn cookie(&self, name: &str) -> Option<String>;

    /// Query or form parameter, consulted when the cookie is absent.
    fn param(&self, name: &str) -> Option<String>;

    fn set_cookie(&mut self, cookie: SetCookie);
}

impl<C: RequestContext + ?Sized> RequestContext for &mut C {
    fn cookie(&self, name: &str) -> Option<String> {
        (**self).cookie(name)
    }

    fn param(&self, name: &str) -> Option<String> {
        (**self).param(name)
    }

    fn set_cookie(&mut self, cookie: SetCookie) {
        (**self).set_cookie(cookie);
    }
}

/// An in-memory [`RequestContext`], for adapters that have already parsed the request.
#[derive(Debug, Clone, Default)]
pub struct MemoryRequest {
    cookies: HashMap<String, String>,
    params: HashMap<String, String>,
    queued: Vec<SetCookie>,
}

impl MemoryRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Cookies queued for the response, in the order they were set.
    #[must_use]
    pub fn queued_cookies(&self) -> &[SetCookie] {
        &self.queued
    }

    /// The last cookie queued under `name`, which is the one a client would keep.
    #[must_use]
    pub fn response_cookie(&self, name: &str) -> Option<&SetCookie> {
        self.queued.iter().rev().find(|cookie| cookie.name == name)
    }
}

impl RequestContext for MemoryRequest {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn param(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }

    fn set_cookie(&mut self, cookie: SetCookie) {
        self.queued.push(cookie);
    }
}
