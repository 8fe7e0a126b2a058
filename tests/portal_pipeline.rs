mod portal_stub;

use std::fs;

use chrono::{Datelike as _, NaiveDate};
use predicates::prelude::*;

use portal_stub::{DayPage, PortalStub};

const SERVICE_DAY: &str = r#"<table class="allocation-info"><tr><td>Turno</td><td>T123</td></tr></table>
<table class="duty-components-table">
<tr><td class="start_time">8:05</td><td class="start_location_long_name">Madrid Chamartín</td>
<td class="end_time">16:30</td><td class="end_location_long_name">Valladolid</td>
<td class="trip_numbers">AV 3171</td></tr>
</table>"#;

const REST_DAY: &str = r#"<div class="day"><h3>Día</h3><p>DESCANSO</p></div>"#;

/// The first three days of the month the binary will treat as current.
fn current_month_dates() -> Vec<String> {
    let today = chrono::Local::now().date_naive();
    (1..=3)
        .map(|day| {
            NaiveDate::from_ymd_opt(today.year(), today.month(), day)
                .expect("valid date")
                .to_string()
        })
        .collect()
}

fn fetch_cmd(stub: &PortalStub, out: &std::path::Path, password: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("turnos");
    cmd.env_remove("MESES_A_LEER")
        .env_remove("TURNOS_DATA_DIR")
        .env_remove("IVU_BASE_URL")
        .env("IVU_USER", portal_stub::USER)
        .env("IVU_PASS", password)
        .args([
            "fetch",
            "--base-url",
            stub.base_url.as_str(),
            "--out",
            out.to_str().expect("utf-8 temp path"),
            "--retries",
            "2",
            "--backoff-ms",
            "0",
            "--timeout-secs",
            "5",
        ]);
    cmd
}

#[test]
fn fetch_writes_month_bundle_and_skips_failing_day() -> anyhow::Result<()> {
    let dates = current_month_dates();
    let stub = PortalStub::spawn(
        portal_stub::overview(&dates),
        vec![
            DayPage {
                path_and_query: portal_stub::day_path(&dates[0]),
                status: 200,
                body: SERVICE_DAY.to_owned(),
            },
            DayPage {
                path_and_query: portal_stub::day_path(&dates[1]),
                status: 500,
                body: "boom".to_owned(),
            },
            DayPage {
                path_and_query: portal_stub::day_path(&dates[2]),
                status: 200,
                body: REST_DAY.to_owned(),
            },
        ],
    );
    let temp = tempfile::TempDir::new()?;
    let out = temp.path().join("data");

    fetch_cmd(&stub, &out, portal_stub::PASS)
        .args(["--format", "both"])
        .assert()
        .success();

    let year_month = &dates[0][..7];
    let json_path = out.join(format!("turnos_{year_month}.json"));
    let bundle: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path)?)?;

    assert_eq!(bundle["year_month"], year_month);
    assert_eq!(bundle["employee_id"], portal_stub::EMPLOYEE_ID);
    let source = stub.base_url.trim_start_matches("http://");
    assert_eq!(bundle["source"], source);

    let days = bundle["days"].as_array().expect("days array");
    assert_eq!(days.len(), 2);

    assert_eq!(days[0]["date"], dates[0].as_str());
    assert_eq!(days[0]["status"], "SERVICIO");
    assert_eq!(days[0]["start"], "08:05");
    assert_eq!(days[0]["end"], "16:30");
    assert_eq!(days[0]["shift_code"], "T123");
    assert_eq!(days[0]["train_or_trip_id"], "3171");
    assert!(
        days[0]["content_fingerprint"]
            .as_str()
            .is_some_and(|fp| fp.starts_with("sha256:"))
    );

    assert_eq!(days[1]["date"], dates[2].as_str());
    assert_eq!(days[1]["status"], "DESCANSO");

    let ics = fs::read_to_string(out.join(format!("turnos_{year_month}.ics")))?;
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
    assert!(!out.join("NO_DATA.txt").exists());

    let requests = stub.requests();
    let failing = portal_stub::day_path(&dates[1]);
    assert_eq!(
        requests.iter().filter(|path| **path == failing).count(),
        2,
        "5xx answers are retried up to --retries"
    );
    Ok(())
}

#[test]
fn fetch_skip_rest_days_leaves_only_service() -> anyhow::Result<()> {
    let dates = current_month_dates();
    let stub = PortalStub::spawn(
        portal_stub::overview(&dates[..2]),
        vec![
            DayPage {
                path_and_query: portal_stub::day_path(&dates[0]),
                status: 200,
                body: SERVICE_DAY.to_owned(),
            },
            DayPage {
                path_and_query: portal_stub::day_path(&dates[1]),
                status: 200,
                body: REST_DAY.to_owned(),
            },
        ],
    );
    let temp = tempfile::TempDir::new()?;

    fetch_cmd(&stub, temp.path(), portal_stub::PASS)
        .arg("--skip-rest-days")
        .assert()
        .success();

    let json_path = temp.path().join(format!("turnos_{}.json", &dates[0][..7]));
    let bundle: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_path)?)?;
    let days = bundle["days"].as_array().expect("days array");
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["status"], "SERVICIO");
    Ok(())
}

#[test]
fn fetch_with_wrong_password_fails_without_output() -> anyhow::Result<()> {
    let dates = current_month_dates();
    let stub = PortalStub::spawn(portal_stub::overview(&dates), Vec::new());
    let temp = tempfile::TempDir::new()?;
    let out = temp.path().join("data");

    fetch_cmd(&stub, &out, "wrong")
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication failed"));

    let written = fs::read_dir(&out)?.count();
    assert_eq!(written, 0);
    assert!(
        !stub
            .requests()
            .iter()
            .any(|path| path.contains("_-duty-table"))
    );
    Ok(())
}
