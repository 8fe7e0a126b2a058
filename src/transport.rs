use std::time::Duration;

use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use url::Url;

use crate::config::HttpConfig;
use crate::error::TransportError;

/// A fetched response. Any status below 500 is handed back to the caller.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub final_url: Url,
    pub text: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTP capability the core consumes. Implementations own the
/// cookie jar; callers only ever hold a shared reference.
pub trait Transport {
    fn fetch(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Page, TransportError>;

    fn submit(&self, url: &Url, fields: &[(&str, &str)]) -> Result<Page, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Page, TransportError> {
        (**self).fetch(url, headers)
    }

    fn submit(&self, url: &Url, fields: &[(&str, &str)]) -> Result<Page, TransportError> {
        (**self).submit(url, fields)
    }
}

/// Fixed attempt count with linearly growing pauses (`backoff × attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(1200),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    /// Runs `op` until it succeeds or the attempts are spent. Every
    /// `TransportError` is transient by construction.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    let delay = self.delay_after(attempt);
                    tracing::debug!(%err, attempt, ?delay, "transport failure; retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)?,
        );

        let client = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    fn into_page(
        method: &'static str,
        url: &Url,
        response: reqwest::blocking::Response,
    ) -> Result<Page, TransportError> {
        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::ServerStatus {
                method,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let text = response.text().map_err(|err| TransportError::Request {
            method,
            url: url.to_string(),
            message: format!("read body: {err}"),
        })?;

        Ok(Page {
            status: status.as_u16(),
            final_url,
            text,
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Page, TransportError> {
        self.retry.run(|| {
            let mut request = self.client.get(url.clone());
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            let response = request.send().map_err(|err| TransportError::Request {
                method: "GET",
                url: url.to_string(),
                message: err.to_string(),
            })?;
            Self::into_page("GET", url, response)
        })
    }

    fn submit(&self, url: &Url, fields: &[(&str, &str)]) -> Result<Page, TransportError> {
        self.retry.run(|| {
            let response = self
                .client
                .post(url.clone())
                .form(fields)
                .send()
                .map_err(|err| TransportError::Request {
                    method: "POST",
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            Self::into_page("POST", url, response)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn no_wait(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
        }
    }

    fn server_error() -> TransportError {
        TransportError::ServerStatus {
            method: "GET",
            url: "http://portal.test/".to_owned(),
            status: 503,
        }
    }

    #[test]
    fn retry_stops_after_configured_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = no_wait(3).run(|| {
            calls.set(calls.get() + 1);
            Err(server_error())
        });

        assert!(matches!(
            result,
            Err(TransportError::ServerStatus { status: 503, .. })
        ));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_returns_first_success() {
        let calls = Cell::new(0);
        let result = no_wait(5).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(server_error())
            } else {
                Ok("ok")
            }
        });

        assert_eq!(result.ok(), Some("ok"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let _ = no_wait(0).run(|| {
            calls.set(calls.get() + 1);
            Err::<(), _>(server_error())
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1200),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(1200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2400));
    }

    #[test]
    fn page_success_is_2xx_only() -> anyhow::Result<()> {
        let page = |status| Page {
            status,
            final_url: Url::parse("http://portal.test/").expect("valid url"),
            text: String::new(),
        };
        assert!(page(200).is_success());
        assert!(page(204).is_success());
        assert!(!page(302).is_success());
        assert!(!page(404).is_success());
        Ok(())
    }
}
