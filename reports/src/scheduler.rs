// reports/src/scheduler.rs
//! Background jobs: one-shot export tasks handed out by id, and the
//! periodic beat that sends reminder and digest mails.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, Timelike};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info};
use uuid::Uuid;

use models::errors::HmsResult;
use models::medical::Role;
use notifications::{DeliveryReport, MailBody, Mailer, OutboundMail};
use storage::HospitalStore;

pub const DAILY_REMINDER_HOUR: u32 = 8;
pub const MONTHLY_DIGEST_HOUR: u32 = 7;

/// Tracks spawned export jobs by handle id so callers can poll for
/// completion. Job outcomes are logged, not returned.
#[derive(Default)]
pub struct JobTracker {
    jobs: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        JobTracker::default()
    }

    /// Runs `job` on the blocking pool and returns its task id immediately.
    pub async fn spawn<F>(&self, label: &str, job: F) -> Uuid
    where
        F: FnOnce() -> HmsResult<PathBuf> + Send + 'static,
    {
        let task_id = Uuid::new_v4();
        let label = label.to_string();
        let handle = tokio::task::spawn_blocking(move || match job() {
            Ok(path) => info!(job = %label, path = %path.display(), "export job finished"),
            Err(e) => error!(job = %label, error = %e, "export job failed"),
        });
        self.jobs.lock().await.insert(task_id, handle);
        task_id
    }

    /// Whether the job has finished, or `None` for an unknown id.
    pub async fn is_finished(&self, task_id: &Uuid) -> Option<bool> {
        self.jobs
            .lock()
            .await
            .get(task_id)
            .map(|handle| handle.is_finished())
    }
}

/// Emails every patient with a Booked appointment dated `today`. Failures
/// are counted per recipient and never abort the batch.
pub async fn daily_reminder(
    store: &HospitalStore,
    mailer: &dyn Mailer,
    today: NaiveDate,
) -> HmsResult<DeliveryReport> {
    let mut report = DeliveryReport::default();
    for appointment in store.booked_appointments_on(today)? {
        let Some(patient) = store.user_by_id(appointment.patient_id)? else {
            continue;
        };
        if !patient.has_mail_address() {
            continue;
        }
        let doctor_name = store
            .user_by_id(appointment.doctor_id)?
            .map(|d| d.username)
            .unwrap_or_else(|| "N/A".to_string());
        let outcome = mailer
            .send(&OutboundMail {
                to: patient.username.clone(),
                subject: "Appointment Reminder".to_string(),
                body: MailBody::Text(format!(
                    "Reminder: Appointment with Dr {} at {} on {}",
                    doctor_name,
                    appointment.time_label(),
                    appointment.date_label(),
                )),
            })
            .await;
        report.record(&outcome, &patient.username);
    }
    Ok(report)
}

/// Emails every approved doctor an HTML digest of the appointments whose
/// month-of-year matches `month`. The year is not compared.
pub async fn monthly_doctor_activity(
    store: &HospitalStore,
    mailer: &dyn Mailer,
    month: u32,
    month_label: &str,
) -> HmsResult<DeliveryReport> {
    let mut report = DeliveryReport::default();
    for doctor in store.users_by_role(Role::Doctor)? {
        if !doctor.approved {
            continue;
        }
        let appointments = store.doctor_appointments_in_month(doctor.id, month)?;
        let mut html = format!(
            "<h2>Activity for {} - {}</h2><ul>",
            doctor.username, month_label
        );
        for appointment in &appointments {
            html.push_str(&format!(
                "<li>{} {} - {}</li>",
                appointment.date_label(),
                appointment.time_label(),
                appointment.status,
            ));
        }
        html.push_str("</ul>");

        if !doctor.has_mail_address() {
            continue;
        }
        let outcome = mailer
            .send(&OutboundMail {
                to: doctor.username.clone(),
                subject: format!("Monthly Activity - {}", month_label),
                body: MailBody::Html(html),
            })
            .await;
        report.record(&outcome, &doctor.username);
    }
    Ok(report)
}

/// Spawns the beat loop: daily reminders at 08:00 local, the monthly digest
/// at 07:00 on the first of the month. Runs until the process exits.
pub fn spawn_beat(store: Arc<HospitalStore>, mailer: Arc<dyn Mailer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(60));
        let mut last_daily: Option<NaiveDate> = None;
        let mut last_monthly: Option<(i32, u32)> = None;
        loop {
            ticker.tick().await;
            let now = Local::now();
            let today = now.date_naive();

            if now.hour() == DAILY_REMINDER_HOUR && last_daily != Some(today) {
                last_daily = Some(today);
                match daily_reminder(&store, mailer.as_ref(), today).await {
                    Ok(report) => report.log("daily_reminder"),
                    Err(e) => error!(error = %e, "daily reminder run failed"),
                }
            }

            let month_key = (now.year(), now.month());
            if now.day() == 1
                && now.hour() == MONTHLY_DIGEST_HOUR
                && last_monthly != Some(month_key)
            {
                last_monthly = Some(month_key);
                let label = now.format("%B %Y").to_string();
                match monthly_doctor_activity(&store, mailer.as_ref(), now.month(), &label).await {
                    Ok(report) => report.log("monthly_doctor_activity"),
                    Err(e) => error!(error = %e, "monthly digest run failed"),
                }
            }
        }
    })
}
