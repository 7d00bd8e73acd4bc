//! Poller / Trigger Planner: ticks on a fixed interval, turns Change
//! Detector events into a [`TriggerPlan`], and dispatches deployments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::Config;
use crate::detector::SeenMap;
use crate::group;
use crate::model::{GroupTrigger, RepoChangeEvent, TriggerPlan};
use crate::{deploy, hosting};

/// Long-running watch loop: ticks every `config.polling_interval` seconds,
/// the first tick firing immediately at startup.
///
/// Enforces the single-outstanding-tick invariant: if a tick's dispatch is
/// still running when the next tick fires, that next tick is skipped
/// entirely rather than queued.
pub async fn watch(config: Arc<Config>, http: reqwest::Client) -> anyhow::Result<()> {
    let seen = SeenMap::new();
    let busy = Arc::new(AtomicBool::new(false));
    let mut interval = tokio::time::interval(Duration::from_secs(config.polling_interval));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut in_flight: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if busy.swap(true, Ordering::SeqCst) {
                    warn!("skipping tick: previous dispatch still running");
                    continue;
                }
                let config = Arc::clone(&config);
                let http = http.clone();
                let seen = seen.clone();
                let busy = Arc::clone(&busy);
                in_flight = Some(tokio::spawn(async move {
                    run_tick(&config, &http, &seen).await;
                    busy.store(false, Ordering::SeqCst);
                }));
            }
            () = shutdown_signal() => {
                info!("shutdown signal received, waiting for in-flight deployments");
                break;
            }
        }
    }

    if let Some(handle) = in_flight {
        if !handle.is_finished() {
            let _ = handle.await;
        }
    }
    Ok(())
}

async fn run_tick(config: &Config, http: &reqwest::Client, seen: &SeenMap) {
    info!("tick: scanning");
    let http = http.clone();
    let events = seen
        .scan(config, move |platform| {
            hosting::client_for(http.clone(), *platform)
                .unwrap_or_else(|_| panic!("unsupported platform {platform}"))
        })
        .await;

    info!(changed = events.len(), "tick: planning");
    let plan = plan_from_events(config, &events);

    info!(groups = plan.groups.len(), individuals = plan.individuals.len(), "tick: dispatching");
    dispatch(config, &plan).await;
}

/// Build a [`TriggerPlan`] from this tick's change events: grouped repos
/// expand to their full group membership, ungrouped repos go to individuals.
///
/// Change events arrive in whatever order the concurrent scan happened to
/// complete them in, which is not declaration order; `triggering_repo` is
/// picked deterministically as the changed member that appears earliest in
/// `config.repositories`, independent of scan completion order.
#[must_use]
pub fn plan_from_events(config: &Config, events: &[RepoChangeEvent]) -> TriggerPlan {
    let mut plan = TriggerPlan::default();
    let now = chrono::Utc::now();
    let mut first_trigger: std::collections::HashMap<String, (usize, String)> = std::collections::HashMap::new();

    for event in events {
        let Some((index, repo)) = config
            .repositories
            .iter()
            .enumerate()
            .find(|(_, r)| r.name == event.repo_name)
        else {
            continue;
        };

        match &repo.group {
            Some(group_name) => {
                plan.groups.entry(group_name.clone()).or_insert_with(|| GroupTrigger {
                    group_name: group_name.clone(),
                    members: config.group_members(group_name),
                    triggering_repo: event.repo_name.clone(),
                    triggered_at: now,
                });
                first_trigger
                    .entry(group_name.clone())
                    .and_modify(|(best_index, best_name)| {
                        if index < *best_index {
                            *best_index = index;
                            *best_name = event.repo_name.clone();
                        }
                    })
                    .or_insert((index, event.repo_name.clone()));
            }
            None => {
                plan.individuals.insert(event.repo_name.clone());
            }
        }
    }

    for (group_name, (_, repo_name)) in first_trigger {
        if let Some(trigger) = plan.groups.get_mut(&group_name) {
            trigger.triggering_repo = repo_name;
        }
    }

    plan
}

/// Build a [`TriggerPlan`] that treats every configured repository as
/// changed, for the manual `trigger` CLI action.
#[must_use]
pub fn plan_all(config: &Config) -> TriggerPlan {
    let mut plan = TriggerPlan::default();
    let now = chrono::Utc::now();

    for repo in &config.repositories {
        match &repo.group {
            Some(group_name) => {
                plan.groups.entry(group_name.clone()).or_insert_with(|| GroupTrigger {
                    group_name: group_name.clone(),
                    members: config.group_members(group_name),
                    triggering_repo: repo.name.clone(),
                    triggered_at: now,
                });
            }
            None => {
                plan.individuals.insert(repo.name.clone());
            }
        }
    }

    plan
}

/// Dispatch every group entry to the Group Executor and every individual
/// directly to the Repository Deployer, waiting for all results.
///
/// Returns the aggregate success across every dispatched group and
/// individual (`true` if the plan was empty).
pub async fn dispatch(config: &Config, plan: &TriggerPlan) -> bool {
    if plan.is_empty() {
        return true;
    }

    // no configured timeout reads as "effectively unbounded" rather than a
    // literal infinite Duration, which Instant addition can't represent
    let outer_deadline = Instant::now()
        + Duration::from_secs(config.global.timeout.unwrap_or(u64::from(u32::MAX)));

    let mut group_futures = Vec::new();
    for (group_name, trigger) in &plan.groups {
        let Some(policy) = config.groups.get(group_name) else {
            warn!(group = group_name, "trigger references undefined group policy, skipping");
            continue;
        };
        group_futures.push(group::deploy_group(config, group_name, &trigger.members, policy));
    }

    let mut individual_futures = Vec::new();
    for name in &plan.individuals {
        if let Some(repo) = config.repository(name) {
            individual_futures.push(deploy::deploy(&repo.deploy, outer_deadline, &config.global));
        }
    }

    let (group_reports, individual_reports) =
        futures::future::join(futures::future::join_all(group_futures), futures::future::join_all(individual_futures)).await;

    let mut success = true;
    for report in &group_reports {
        info!(group = %report.group_name, success = report.success, "group report");
        success &= report.success;
    }
    for report in &individual_reports {
        info!(repo = %report.repo_name, success = report.success, "deploy report");
        success &= report.success;
    }
    success
}

/// Resolves once SIGINT or SIGTERM (unix) / Ctrl-C (other platforms) fires.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
