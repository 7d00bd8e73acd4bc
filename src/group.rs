//! Group Executor: fans a deployment out across a group's members under a
//! bounded-parallel or sequential policy with a shared overall deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::info;

use crate::config::Config;
use crate::deploy;
use crate::error::DeployError;
use crate::model::{DeployReport, ExecutionStrategy, GroupPolicy, GroupReport};

/// Deploy every member of a group per its [`GroupPolicy`].
///
/// `members` must already be resolved to configured repository names; any
/// name that fails to resolve in `config` produces a synthetic failed
/// [`DeployReport`] rather than panicking, since config is validated once at
/// load time and a dangling reference here indicates a caller bug, not a
/// runtime condition to propagate.
pub async fn deploy_group(
    config: &Config,
    group_name: &str,
    members: &[String],
    policy: &GroupPolicy,
) -> GroupReport {
    let started = Instant::now();
    let overall_deadline = started + Duration::from_secs(policy.global_timeout);

    let reports = match policy.execution_strategy {
        ExecutionStrategy::Parallel => {
            run_parallel(config, members, policy, overall_deadline).await
        }
        ExecutionStrategy::Sequential => {
            run_sequential(config, members, policy, overall_deadline).await
        }
    };

    let success = reports.values().all(|r| r.success);
    let error = if success {
        String::new()
    } else {
        reports
            .values()
            .filter(|r| !r.success)
            .map(|r| format!("{}: {}", r.repo_name, r.error))
            .collect::<Vec<_>>()
            .join("; ")
    };

    info!(group = group_name, success, members = reports.len(), "group dispatch complete");

    GroupReport {
        group_name: group_name.to_string(),
        strategy: policy.execution_strategy,
        members: reports,
        success,
        elapsed: started.elapsed(),
        error,
    }
}

async fn run_parallel(
    config: &Config,
    members: &[String],
    policy: &GroupPolicy,
    overall_deadline: Instant,
) -> HashMap<String, DeployReport> {
    let semaphore = Arc::new(Semaphore::new(policy.max_parallel));
    let reports = Arc::new(Mutex::new(HashMap::with_capacity(members.len())));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut tasks = JoinSet::new();

    for name in members {
        if !policy.continue_on_error && stop.load(std::sync::atomic::Ordering::SeqCst) {
            // a member skipped because a sibling already failed (not because
            // of the deadline) never started, so it gets no DeployReport at
            // all rather than a synthetic failure
            continue;
        }

        let Some(spec) = config.repository(name).map(|r| r.deploy.clone()) else {
            let mut guard = reports.lock().await;
            guard.insert(
                name.clone(),
                DeployReport::failed(name, DeployError::UnknownRepo(name.clone()).to_string(), Duration::ZERO),
            );
            continue;
        };

        let semaphore = Arc::clone(&semaphore);
        let reports = Arc::clone(&reports);
        let stop = Arc::clone(&stop);
        let settings = config.global.clone();
        let name = name.clone();
        let continue_on_error = policy.continue_on_error;

        tasks.spawn(async move {
            let permit = tokio::time::timeout_at(
                tokio::time::Instant::from_std(overall_deadline),
                semaphore.acquire_owned(),
            )
            .await;

            let Ok(Ok(_permit)) = permit else {
                let mut guard = reports.lock().await;
                guard.insert(
                    name.clone(),
                    DeployReport::failed(&name, DeployError::Timeout("admission deadline elapsed").to_string(), Duration::ZERO),
                );
                return;
            };

            let report = deploy::deploy(&spec, overall_deadline, &settings).await;
            if !report.success && !continue_on_error {
                stop.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            let mut guard = reports.lock().await;
            guard.insert(name, report);
        });
    }

    while tasks.join_next().await.is_some() {}

    Arc::try_unwrap(reports)
        .map(Mutex::into_inner)
        .unwrap_or_default()
}

async fn run_sequential(
    config: &Config,
    members: &[String],
    policy: &GroupPolicy,
    overall_deadline: Instant,
) -> HashMap<String, DeployReport> {
    let mut reports = HashMap::with_capacity(members.len());
    let mut stopped = false;

    for name in members {
        if stopped {
            // never started because a predecessor already failed and
            // continue_on_error is false: no DeployReport at all
            continue;
        }

        if Instant::now() >= overall_deadline {
            reports.insert(
                name.clone(),
                DeployReport::failed(name, DeployError::Timeout("group deadline elapsed").to_string(), Duration::ZERO),
            );
            continue;
        }

        let Some(spec) = config.repository(name).map(|r| &r.deploy) else {
            reports.insert(
                name.clone(),
                DeployReport::failed(name, DeployError::UnknownRepo(name.clone()).to_string(), Duration::ZERO),
            );
            continue;
        };

        let report = deploy::deploy(spec, overall_deadline, &config.global).await;
        if !report.success && !policy.continue_on_error {
            stopped = true;
        }
        reports.insert(name.clone(), report);
    }

    reports
}
