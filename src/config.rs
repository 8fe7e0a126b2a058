use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::PortalError;
use crate::transport::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://wcrew-ilsa.trenitalia.it";
pub const DEFAULT_ROOT_PATH: &str = "/mbweb/";
pub const DEFAULT_LOGIN_PATH: &str = "/mbweb/j_security_check";
pub const DEFAULT_LANDING_PATH: &str = "/mbweb/main/ivu/desktop/duties";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.9";

pub const DEFAULT_MONTH_CANDIDATES: &[&str] = &[
    "_-duty-table",
    "_-duty-table?beginDate={month_start}",
    "/mbweb/_-duty-table",
    "/mbweb/_-duty-table?_={nocache}",
];

pub const DEFAULT_DAY_CANDIDATES: &[&str] = &[
    "_-duty-details-day?beginDate={date}&showUserInfo=true{employee_query}",
    "/mbweb/_-duty-details-day?beginDate={date}&showUserInfo=true{employee_query}",
    "_-duty-details-day?beginDate={date}",
];

pub const DEFAULT_LOGOUT_MARKERS: &[&str] = &["logout", "cerrar sesión", "sign out", "sign-out"];

/// Identity and passphrase. `Debug` never prints the passphrase.
#[derive(Clone)]
pub struct Credentials {
    identity: String,
    passphrase: String,
}

impl Credentials {
    pub fn new(
        identity: Option<String>,
        passphrase: Option<String>,
    ) -> Result<Self, PortalError> {
        let identity = identity
            .filter(|v| !v.trim().is_empty())
            .ok_or(PortalError::MissingCredentials("IVU_USER"))?;
        let passphrase = passphrase
            .filter(|v| !v.is_empty())
            .ok_or(PortalError::MissingCredentials("IVU_PASS"))?;
        Ok(Self {
            identity,
            passphrase,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("passphrase", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_owned(),
        }
    }
}

/// Everything the run needs to know about the portal deployment.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: Url,
    pub root_path: String,
    pub login_path: String,
    pub landing_path: String,
    pub identity_field: String,
    pub passphrase_field: String,
    pub logout_markers: Vec<String>,
    pub month_candidates: Vec<String>,
    pub day_candidates: Vec<String>,
    pub months: u32,
    pub include_rest_days: bool,
    pub http: HttpConfig,
}

impl PortalConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            root_path: DEFAULT_ROOT_PATH.to_owned(),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            landing_path: DEFAULT_LANDING_PATH.to_owned(),
            identity_field: "j_username".to_owned(),
            passphrase_field: "j_password".to_owned(),
            logout_markers: to_owned_list(DEFAULT_LOGOUT_MARKERS),
            month_candidates: to_owned_list(DEFAULT_MONTH_CANDIDATES),
            day_candidates: to_owned_list(DEFAULT_DAY_CANDIDATES),
            months: 1,
            include_rest_days: true,
            http: HttpConfig::default(),
        }
    }

    /// Joins a portal-absolute path onto the base URL.
    pub fn portal_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    /// Host (and port, when explicit) used as the bundle's source label.
    pub fn source_label(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}
