//! Cron-driven job scheduler.

use chrono::Utc;
use cron::Schedule;
use faas_types::{JobHandler, MountError, Scheduler};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Parse a job rule. Five-field (minute-resolution) rules get a leading
/// seconds field of `0`; six- and seven-field rules keep their seconds.
///
/// The day-of-week field uses Unix numbering whatever the field count:
/// `0` and `7` are Sunday, `1` is Monday. Day names pass through unchanged.
pub fn parse_rule(rule: &str) -> Result<Schedule, MountError> {
    let invalid = |reason: String| MountError::InvalidRule {
        rule: rule.to_owned(),
        reason,
    };
    let mut fields: Vec<String> = rule.split_whitespace().map(str::to_owned).collect();
    if fields.len() == 5 {
        fields.insert(0, "0".to_owned());
    }
    if let Some(weekday) = fields.get_mut(DAY_OF_WEEK) {
        *weekday = unix_weekdays(weekday).map_err(invalid)?;
    }
    Schedule::from_str(&fields.join(" ")).map_err(|e| invalid(e.to_string()))
}

/// Position of the day-of-week field once seconds lead.
const DAY_OF_WEEK: usize = 5;

/// Rewrite a Unix day-of-week field (Sunday = 0 or 7) into the `cron`
/// crate's numbering (Sunday = 1). Numeric items are expanded to an explicit
/// list so ranges ending on `7` and stepped ranges keep their meaning.
fn unix_weekdays(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_owned());
    }
    let mut days = [false; 7];
    let mut names = Vec::new();
    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            names.push(item.to_owned());
            continue;
        }
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(weekday_number(step)?)),
            None => (item, None),
        };
        let (start, end) = match base.split_once('-') {
            _ if base == "*" => (0, 7),
            Some((start, end)) => (weekday_number(start)?, weekday_number(end)?),
            None => {
                let day = weekday_number(base)?;
                (day, if step.is_some() { 7 } else { day })
            }
        };
        let step = step.unwrap_or(1);
        if start > 7 || end > 7 || start > end || step == 0 {
            return Err(format!("'{item}' is not a valid day-of-week item"));
        }
        for day in (start..=end).step_by(step) {
            days[day % 7] = true;
        }
    }
    let mut items: Vec<String> = days
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(day, _)| (day + 1).to_string())
        .collect();
    items.extend(names);
    Ok(items.join(","))
}

fn weekday_number(raw: &str) -> Result<usize, String> {
    raw.parse()
        .map_err(|_| format!("'{raw}' is not a day-of-week number"))
}

/// A [`Scheduler`] running one tokio task per job.
///
/// Must be used inside a tokio runtime. Jobs stop on
/// [`shutdown`](Self::shutdown) or when the scheduler is dropped.
#[derive(Default)]
pub struct CronScheduler {
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl CronScheduler {
    /// Create a scheduler with no jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of scheduled jobs, in registration order.
    pub fn jobs(&self) -> Vec<String> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Stop every job.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for (name, task) in tasks {
            debug!(job = %name, "stopping job");
            task.abort();
        }
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_schedule(name: String, schedule: Schedule, job: Arc<dyn JobHandler>) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            info!(job = %name, "schedule has no further runs");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        debug!(job = %name, "running job");
        if let Err(error) = job.run().await {
            warn!(job = %name, error = %error, "job failed");
        }
    }
}

impl Scheduler for CronScheduler {
    fn schedule(&self, name: &str, rule: &str, job: Arc<dyn JobHandler>) -> Result<(), MountError> {
        let schedule = parse_rule(rule)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MountError::Other(Box::new(e)))?;
        let task = runtime.spawn(run_schedule(name.to_owned(), schedule, job));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_owned(), task));
        info!(job = %name, rule, "job scheduled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Weekday};
    use faas_types::test_utils::job_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn five_six_and_seven_field_rules() {
        assert!(parse_rule("*/5 * * * *").is_ok());
        assert!(parse_rule("*/10 * * * * *").is_ok());
        assert!(parse_rule("0 0 12 * * * 2099").is_ok());
        assert!(matches!(
            parse_rule("every day"),
            Err(MountError::InvalidRule { .. })
        ));
    }

    fn next_weekdays(rule: &str, count: usize) -> Vec<Weekday> {
        // 2024-01-01 is a Monday.
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        parse_rule(rule)
            .unwrap()
            .after(&from)
            .take(count)
            .map(|at| at.weekday())
            .collect()
    }

    #[test]
    fn weekdays_use_unix_numbering() {
        assert_eq!(next_weekdays("0 9 * * 1", 2), vec![Weekday::Mon, Weekday::Mon]);
        assert_eq!(next_weekdays("0 9 * * 0", 1), vec![Weekday::Sun]);
        assert_eq!(next_weekdays("0 9 * * 7", 1), vec![Weekday::Sun]);
        assert_eq!(
            next_weekdays("0 9 * * 1-5", 6),
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Mon
            ]
        );
        assert_eq!(
            next_weekdays("0 9 * * 5-7", 3),
            vec![Weekday::Fri, Weekday::Sat, Weekday::Sun]
        );
        assert_eq!(
            next_weekdays("0 9 * * */2", 4),
            vec![Weekday::Tue, Weekday::Thu, Weekday::Sat, Weekday::Sun]
        );
        assert_eq!(next_weekdays("30 0 9 * * 6", 1), vec![Weekday::Sat]);
        assert_eq!(next_weekdays("0 9 * * Wed", 1), vec![Weekday::Wed]);
    }

    #[test]
    fn bad_weekdays_are_rejected() {
        for rule in ["0 9 * * 8", "0 9 * * 5-2", "0 9 * * 1/0", "0 9 * * x-y"] {
            assert!(
                matches!(parse_rule(rule), Err(MountError::InvalidRule { .. })),
                "{rule} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn every_second_job_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let scheduler = CronScheduler::new();
        scheduler
            .schedule(
                "tick",
                "* * * * * *",
                job_fn(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();
        assert_eq!(scheduler.jobs(), vec!["tick".to_owned()]);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        scheduler.shutdown();
        let seen = runs.load(Ordering::SeqCst);
        assert!(seen >= 1, "job ran {seen} times");
        assert!(scheduler.jobs().is_empty());
    }

    #[test]
    fn scheduling_outside_a_runtime_is_an_error() {
        let scheduler = CronScheduler::new();
        let err = scheduler
            .schedule("tick", "* * * * *", job_fn(|| async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, MountError::Other(_)));
    }
}
