use url::Url;

use crate::config::{Credentials, PortalConfig};
use crate::error::PortalError;
use crate::transport::{Page, Transport};

/// An authenticated portal session. Built once by [`acquire`], then lent out
/// by shared reference for the rest of the run.
pub struct Session<T> {
    transport: T,
    landing_url: Url,
}

impl<T: Transport> Session<T> {
    /// Final URL of the authenticated landing page, after redirects.
    pub fn landing_url(&self) -> &Url {
        &self.landing_url
    }

    /// GET as the portal's own XHR calls do, so fragment endpoints answer
    /// with the bare HTML fragment.
    pub fn fetch_fragment(&self, url: &Url) -> Result<Page, PortalError> {
        let referer = self.landing_url.as_str();
        let headers = [
            ("X-Requested-With", "XMLHttpRequest"),
            ("Accept", "text/html, */*; q=0.01"),
            ("Referer", referer),
        ];
        Ok(self.transport.fetch(url, &headers)?)
    }
}

pub fn acquire<T: Transport>(
    transport: T,
    config: &PortalConfig,
    credentials: &Credentials,
) -> Result<Session<T>, PortalError> {
    let root_url = portal_url(config, &config.root_path)?;
    let login_url = portal_url(config, &config.login_path)?;
    let landing_url = portal_url(config, &config.landing_path)?;

    tracing::debug!(url = %root_url, "requesting baseline session cookies");
    transport.fetch(&root_url, &[])?;

    tracing::debug!(url = %login_url, "submitting credentials");
    let login = transport.submit(
        &login_url,
        &[
            (config.identity_field.as_str(), credentials.identity()),
            (config.passphrase_field.as_str(), credentials.passphrase()),
        ],
    )?;
    if login.status >= 400 {
        return Err(PortalError::Authentication(format!(
            "login endpoint answered {}",
            login.status
        )));
    }

    // The login response is 200 for good and bad credentials alike; only an
    // authenticated-only page tells them apart.
    let landing = transport.fetch(&landing_url, &[])?;
    if !landing.is_success() || !has_logout_marker(&landing.text, &config.logout_markers) {
        return Err(PortalError::Authentication(format!(
            "no active session marker on {} (status {})",
            landing.final_url, landing.status
        )));
    }

    tracing::info!(landing = %landing.final_url, "logged in");
    Ok(Session {
        transport,
        landing_url: landing.final_url,
    })
}

fn portal_url(config: &PortalConfig, path: &str) -> Result<Url, PortalError> {
    config
        .portal_url(path)
        .map_err(|err| PortalError::Authentication(format!("invalid portal path {path}: {err}")))
}

fn has_logout_marker(html: &str, markers: &[String]) -> bool {
    let lowered = html.to_lowercase();
    markers
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}
