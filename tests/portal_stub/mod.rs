use std::io::Read as _;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER: &str = "crew";
pub const PASS: &str = "secret";
pub const EMPLOYEE_ID: &str = "4711";

const SESSION_COOKIE: &str = "JSESSIONID=stub";
const AUTH_COOKIE: &str = "auth=ok";
const LOGIN_FORM: &str = r#"<form action="j_security_check" method="post">
<input name="j_username"><input name="j_password" type="password"></form>"#;

/// Day detail answers keyed by the exact request path and query.
#[derive(Debug, Clone)]
pub struct DayPage {
    pub path_and_query: String,
    pub status: u16,
    pub body: String,
}

/// A small IVU-like portal: form login, cookie-gated pages, one month
/// overview and whatever day pages the test registers.
pub struct PortalStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PortalStub {
    pub fn spawn(overview: String, days: Vec<DayPage>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind stub portal");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_owned();
                log.lock().expect("request log").push(url.clone());

                let cookies = request
                    .headers()
                    .iter()
                    .filter(|h| h.field.equiv("Cookie"))
                    .map(|h| h.value.as_str().to_owned())
                    .collect::<Vec<_>>()
                    .join("; ");
                let authed = cookies.contains(AUTH_COOKIE);

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let (status, text, set_cookie) = match url.as_str() {
                    "/mbweb/" => (200, LOGIN_FORM.to_owned(), Some(SESSION_COOKIE)),
                    "/mbweb/j_security_check" => {
                        let accepted = cookies.contains(SESSION_COOKIE)
                            && body.contains(&format!("j_username={USER}"))
                            && body.contains(&format!("j_password={PASS}"));
                        if accepted {
                            (200, "<p>welcome</p>".to_owned(), Some(AUTH_COOKIE))
                        } else {
                            (200, LOGIN_FORM.to_owned(), None)
                        }
                    }
                    "/mbweb/main/ivu/desktop/duties" if authed => (
                        200,
                        r#"<nav><a href="/mbweb/logout">Logout</a></nav><div id="duties"></div>"#
                            .to_owned(),
                        None,
                    ),
                    "/mbweb/main/ivu/desktop/duties" => (200, LOGIN_FORM.to_owned(), None),
                    "/mbweb/main/ivu/desktop/_-duty-table" if authed => {
                        (200, overview.clone(), None)
                    }
                    other if authed => match days.iter().find(|d| d.path_and_query == other) {
                        Some(day) => (day.status, day.body.clone(), None),
                        None => (404, "not found".to_owned(), None),
                    },
                    _ => (403, "forbidden".to_owned(), None),
                };

                let mut response = tiny_http::Response::from_string(text).with_status_code(status);
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"text/html; charset=utf-8"[..],
                )
                .expect("build header");
                response = response.with_header(header);
                if let Some(cookie) = set_cookie {
                    let header = tiny_http::Header::from_bytes(
                        &b"Set-Cookie"[..],
                        format!("{cookie}; Path=/").as_bytes(),
                    )
                    .expect("build cookie header");
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }
}

impl Drop for PortalStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Path of the first day candidate for `date` once the employee is known.
pub fn day_path(date: &str) -> String {
    format!(
        "/mbweb/main/ivu/desktop/_-duty-details-day?beginDate={date}&showUserInfo=true&allocatedEmployeeId={EMPLOYEE_ID}"
    )
}

/// Month overview listing `dates` the way the portal links its day cells.
pub fn overview(dates: &[String]) -> String {
    let mut html = String::from("<table class=\"duty-table\">");
    for date in dates {
        html.push_str(&format!(
            "<tr><td><a href=\"_-duty-details-day?beginDate={date}&allocatedEmployeeId={EMPLOYEE_ID}\">{date}</a></td></tr>"
        ));
    }
    html.push_str("</table>");
    html
}
