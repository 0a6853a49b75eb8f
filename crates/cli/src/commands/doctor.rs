use permbot_core::config::{AppConfig, LoadOptions, TransportMode};
use serde::Serialize;

use super::CommandResult;

/// Windows longer than a day keep per-user timestamp logs around for too long.
const MAX_SENSIBLE_WINDOW_SECS: u64 = 86_400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_rate_limit(&config));
            checks.push(check_admin_users(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_token_readiness", "rate_limit_sanity", "admin_users"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

// Token shapes are enforced by config validation; this reports which ones the transport needs.
fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let details = match config.server.transport {
        TransportMode::Http => "bot token and signing secret present for http transport",
        TransportMode::Socket => "bot token and app-level token present for socket transport",
    };
    DoctorCheck { name: "slack_token_readiness", status: CheckStatus::Pass, details: details.to_string() }
}

fn check_rate_limit(config: &AppConfig) -> DoctorCheck {
    let max_requests = config.rate_limit.max_requests;
    let window_secs = config.rate_limit.window_secs;

    let (status, details) = if max_requests == 0 {
        (
            CheckStatus::Fail,
            "rate_limit.max_requests is 0; every request would be rate limited".to_string(),
        )
    } else if window_secs > MAX_SENSIBLE_WINDOW_SECS {
        (
            CheckStatus::Warn,
            format!("rate_limit.window_secs is {window_secs}s; windows over a day are unusual"),
        )
    } else {
        (CheckStatus::Pass, format!("{max_requests} requests per {window_secs}s per user"))
    };

    DoctorCheck { name: "rate_limit_sanity", status, details }
}

fn check_admin_users(config: &AppConfig) -> DoctorCheck {
    let admins = &config.permissions.admin_users;
    if admins.is_empty() {
        return DoctorCheck {
            name: "admin_users",
            status: CheckStatus::Warn,
            details: "no admin users configured; nobody can grant permissions".to_string(),
        };
    }

    DoctorCheck {
        name: "admin_users",
        status: CheckStatus::Pass,
        details: format!("{} admin user(s) configured", admins.len()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
