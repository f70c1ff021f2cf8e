use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::Serialize;

use clientsync_core::clients::{Client, ClientRepositoryTrait, ServiceRecord};
use clientsync_core::returns::{ReturnCandidate, ReturnWindow};
use clientsync_core::sync::{SyncMetadata, SyncMetadataRepositoryTrait, SyncResult, SyncResultStatus};
use clientsync_core::utils::time_utils::{format_timestamp, today_utc};

use crate::cli::{Command, OutputFormat};
use crate::context::AppContext;

pub async fn run(ctx: &AppContext, command: Command, output: OutputFormat) -> Result<()> {
    match command {
        Command::Sync => sync(ctx, output).await,
        Command::Status { today } => {
            let summary = ctx
                .sync_service
                .get_sync_status_on(today.unwrap_or_else(today_utc));
            emit(output, &summary, || {
                format!(
                    "Last sync:        {}\nLast outcome:     {:?}\nClients:          {}\nPending returns:  {}",
                    summary.last_sync_display(),
                    summary.last_outcome,
                    summary.total_clients,
                    summary.pending_returns
                )
            })
        }
        Command::Returns {
            today,
            days_before,
            days_after,
        } => {
            let window = override_window(ctx.settings.return_window, days_before, days_after)?;
            let today = today.unwrap_or_else(today_utc);
            let candidates = ctx.store.clients().query_return_candidates(&window, today)?;
            emit(output, &candidates, || render_returns(&candidates, &window, today))
        }
        Command::Clients => {
            let clients = ctx.store.clients().query_all_clients()?;
            emit(output, &clients, || render_clients(&clients))
        }
        Command::Services { client_id } => {
            let services = ctx.store.clients().query_services_for_client(&client_id)?;
            emit(output, &services, || render_services(&client_id, &services))
        }
        Command::History { limit } => {
            let history = ctx.store.sync_metadata().sync_history(limit)?;
            emit(output, &history, || render_history(&history))
        }
        Command::Health => {
            let healthy = ctx.sync_service.check_remote_health().await;
            emit(
                output,
                &serde_json::json!({ "url": ctx.settings.api_base_url, "healthy": healthy }),
                || {
                    format!(
                        "{} is {}",
                        ctx.settings.api_base_url,
                        if healthy { "reachable" } else { "unreachable" }
                    )
                },
            )?;
            if !healthy {
                bail!("Sync server is not healthy");
            }
            Ok(())
        }
    }
}

async fn sync(ctx: &AppContext, output: OutputFormat) -> Result<()> {
    let result = ctx.sync_service.perform_sync().await;
    emit(output, &result, || render_sync(&result))?;
    if result.status == SyncResultStatus::Failed {
        bail!(
            "Sync failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn override_window(
    base: ReturnWindow,
    days_before: Option<i64>,
    days_after: Option<i64>,
) -> Result<ReturnWindow> {
    let start_offset_days = match days_before {
        Some(days) => match days.checked_neg() {
            Some(offset) => offset,
            None => bail!("--days-before is out of range: {}", days),
        },
        None => base.start_offset_days,
    };
    let window = ReturnWindow::new(
        start_offset_days,
        days_after.unwrap_or(base.end_offset_days),
        base.days_after_service,
    );
    if window.start_offset_days > window.end_offset_days {
        bail!("Return window is empty");
    }
    Ok(window)
}

fn emit<T: Serialize>(output: OutputFormat, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn render_sync(result: &SyncResult) -> String {
    match result.status {
        SyncResultStatus::Completed => format!(
            "Synced {} clients and {} services in {} ms (server time {})",
            result.clients,
            result.services,
            result.duration_ms,
            result
                .sync_date
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default()
        ),
        SyncResultStatus::AlreadyRunning => "Sync already in progress".to_string(),
        SyncResultStatus::Failed => format!(
            "Sync failed after {} ms{}: {}",
            result.duration_ms,
            if result.retryable { " (retryable)" } else { "" },
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn render_returns(candidates: &[ReturnCandidate], window: &ReturnWindow, today: NaiveDate) -> String {
    let (first, last) = window.bounds(today);
    if candidates.is_empty() {
        return format!("No clients due between {} and {}", first, last);
    }

    let mut lines = vec![format!(
        "{} clients due between {} and {}:",
        candidates.len(),
        first,
        last
    )];
    for candidate in candidates {
        lines.push(format!(
            "  {}  {:<24} {:<18} last visit {}  ({})",
            candidate.expected_return_date,
            candidate.client.name,
            candidate.client.display_phone(),
            candidate.last_service_date.date_naive(),
            candidate.classification.label()
        ));
    }
    lines.join("\n")
}

fn render_clients(clients: &[Client]) -> String {
    if clients.is_empty() {
        return "No clients cached yet. Run `clientsync sync`.".to_string();
    }
    clients
        .iter()
        .map(|c| {
            format!(
                "{:<12} {:<24} {:<18} {}",
                c.client_id,
                c.name,
                c.display_phone(),
                c.display_email()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_services(client_id: &str, services: &[ServiceRecord]) -> String {
    if services.is_empty() {
        return format!("No visits recorded for {}", client_id);
    }
    services
        .iter()
        .map(|s| {
            let mut line = format!(
                "{}  {:<16} {:<10}",
                s.service_date.date_naive(),
                s.service_type,
                s.status
            );
            if let Some(description) = &s.description {
                line.push(' ');
                line.push_str(description);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_history(history: &[SyncMetadata]) -> String {
    if history.is_empty() {
        return "No sync attempts recorded".to_string();
    }
    history
        .iter()
        .map(|entry| {
            let detail = match (&entry.cursor, &entry.error_message) {
                (_, Some(message)) => message.clone(),
                (Some(cursor), None) => format!("cursor {}", format_timestamp(cursor)),
                (None, None) => String::new(),
            };
            format!(
                "#{:<5} {}  {:<7} {}",
                entry.id,
                format_timestamp(&entry.last_sync_date),
                entry.sync_status.as_str(),
                detail
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clientsync_core::returns::classify;

    #[test]
    fn renders_failed_sync_with_reason() {
        let text = render_sync(&SyncResult::failed("Network error: timed out", true, 30012));
        assert_eq!(
            text,
            "Sync failed after 30012 ms (retryable): Network error: timed out"
        );

        let text = render_sync(&SyncResult::failed("Schema error: no such table", false, 4));
        assert_eq!(text, "Sync failed after 4 ms: Schema error: no such table");
    }

    #[test]
    fn renders_return_line_with_label() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let mut client = Client::new("c-1", "Ana");
        client.phone = Some("11987654321".into());
        let candidate = ReturnCandidate {
            client,
            last_service_date: Utc.with_ymd_and_hms(2023, 12, 11, 9, 0, 0).unwrap(),
            expected_return_date: expected,
            classification: classify(expected, today),
        };

        let text = render_returns(&[candidate], &ReturnWindow::default(), today);
        assert!(text.starts_with("1 clients due between 2024-01-08 and 2024-01-29:"));
        assert!(text.contains("(11) 98765-4321"));
        assert!(text.contains("overdue by 5 days"));
    }

    #[test]
    fn window_flags_override_configured_window() {
        let base = ReturnWindow::default();
        assert_eq!(override_window(base, None, None).unwrap(), base);
        assert_eq!(
            override_window(base, Some(3), Some(5)).unwrap(),
            ReturnWindow::new(-3, 5, 30)
        );
        let err = override_window(base, Some(-20), None).unwrap_err();
        assert_eq!(err.to_string(), "Return window is empty");
    }

    #[test]
    fn days_before_minimum_is_rejected_not_negated() {
        let err = override_window(ReturnWindow::default(), Some(i64::MIN), None).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn empty_lists_explain_themselves() {
        assert_eq!(render_history(&[]), "No sync attempts recorded");
        assert_eq!(render_services("c-9", &[]), "No visits recorded for c-9");
    }
}
