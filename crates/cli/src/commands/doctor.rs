use serde::Serialize;
use slashgate_core::config::{AppConfig, LoadOptions};
use slashgate_core::ports::CredentialStore;
use slashgate_db::connection::{connect_with_config, ping};
use slashgate_db::repositories::SqlTenantRepository;
use slashgate_db::{migrations, DbPool};

use crate::commands::{runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG: &str = "config_validation";
const DATABASE: &str = "database_connectivity";
const SCHEMA: &str = "schema_migrations";
const TENANTS: &str = "tenant_pool";

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

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
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut checks = vec![DoctorCheck::pass(CONFIG, "configuration loaded and validated")];
            checks.extend(runtime_checks(&config));
            checks
        }
        Err(error) => vec![
            DoctorCheck::fail(CONFIG, error.to_string()),
            DoctorCheck::skipped(DATABASE, "configuration did not load"),
            DoctorCheck::skipped(SCHEMA, "configuration did not load"),
            DoctorCheck::skipped(TENANTS, "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn runtime_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(DATABASE, format!("failed to initialize async runtime: {error}")),
                DoctorCheck::skipped(SCHEMA, "the async runtime did not start"),
                DoctorCheck::skipped(TENANTS, "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(DATABASE, format!("failed to connect to database: {error}")),
                    DoctorCheck::skipped(SCHEMA, "the database is unreachable"),
                    DoctorCheck::skipped(TENANTS, "the database is unreachable"),
                ];
            }
        };

        let mut checks = Vec::new();
        match ping(&pool).await {
            Ok(()) => checks.push(DoctorCheck::pass(
                DATABASE,
                format!("connected using `{}`", config.database.url),
            )),
            Err(error) => checks.push(DoctorCheck::fail(DATABASE, format!("ping failed: {error}"))),
        }

        let schema = check_schema(&pool).await;
        let schema_ready = schema.status == CheckStatus::Pass;
        checks.push(schema);
        checks.push(if schema_ready {
            check_tenant_pool(config, &pool).await
        } else {
            DoctorCheck::skipped(TENANTS, "the schema is not up to date")
        });

        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    match migrations::pending_count(pool).await {
        Ok(0) => DoctorCheck::pass(SCHEMA, "all migrations applied"),
        Ok(pending) => DoctorCheck::fail(
            SCHEMA,
            format!("{pending} pending migrations; run `slashgate migrate`"),
        ),
        Err(error) => DoctorCheck::fail(SCHEMA, format!("could not read migration state: {error}")),
    }
}

/// With authentication enabled, at least one active tenant must exist in
/// the database or be declared in config (synced on server start).
async fn check_tenant_pool(config: &AppConfig, pool: &DbPool) -> DoctorCheck {
    if !config.auth.enabled {
        return DoctorCheck::pass(TENANTS, "authentication disabled; tenant pool not consulted");
    }

    let stored = match SqlTenantRepository::new(pool.clone()).list_active().await {
        Ok(tenants) => tenants.iter().filter(|tenant| tenant.is_verifiable()).count(),
        Err(error) => {
            return DoctorCheck::fail(TENANTS, format!("could not list tenants: {error}"));
        }
    };
    let configured = config.tenants.iter().filter(|tenant| tenant.active).count();

    if stored + configured == 0 {
        return DoctorCheck::fail(
            TENANTS,
            "no active tenant applications; every signed request would be rejected",
        );
    }

    DoctorCheck::pass(
        TENANTS,
        format!("{stored} active tenants stored, {configured} declared in config"),
    )
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
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
