//! One tick of event processing.
//!
//! A tick drains the queue once per active watch, sorts every raw event
//! into the plan of the watch that owns it, then applies the plans in id
//! order:
//!
//! 1. a structural event (delete, rename, revoke, or anything on the
//!    directory slot) schedules a rescan;
//! 2. write/extend/attrib on a tracked file marks it dirty;
//! 3. every registration that fired and is still live is renewed;
//! 4. the rescan runs, then dirty files are re-stat'ed and `Modified` is
//!    notified only when the modification time moved.
//!
//! A file the rescan already settled, or that reported a rename or
//! delete, is never also reported as `Modified` in the same tick.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use super::handler::WatchId;
use super::multiplexer::RawEvent;
use super::registrar::{Registrar, Target};
use super::registry::WatchRegistry;
use super::token::Token;

/// Counters for one call to `pump`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Raw events drained from the queue.
    pub events: usize,
    /// Rescans run.
    pub rescans: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

/// Work collected for one watch during a tick.
#[derive(Debug, Default)]
struct TickPlan {
    rescan: bool,
    /// Entries that reported delete, rename or revoke.
    suspects: BTreeSet<PathBuf>,
    /// Entries that reported write, extend or attrib.
    dirty: BTreeSet<PathBuf>,
    /// Tokens whose one-shot registration was consumed.
    fired: Vec<Token>,
}

pub(crate) struct TickSettings {
    pub timeout: Duration,
    pub batch: usize,
}

pub(crate) fn run_tick(
    registry: &mut WatchRegistry,
    registrar: &mut Registrar,
    settings: &TickSettings,
) -> PumpStats {
    let mut stats = PumpStats::default();
    let mut plans: BTreeMap<WatchId, TickPlan> = BTreeMap::new();
    let ids = registry.ids();

    // Only the first poll of a tick may wait
    let mut timeout = settings.timeout;
    for id in &ids {
        stats.events += drain(*id, registry, registrar, settings.batch, &mut timeout, &mut plans);
    }

    for id in ids {
        let plan = plans.remove(&id).unwrap_or_default();
        apply(id, plan, registry, registrar, &mut stats);
    }
    stats
}

fn drain(
    current: WatchId,
    registry: &WatchRegistry,
    registrar: &mut Registrar,
    batch: usize,
    timeout: &mut Duration,
    plans: &mut BTreeMap<WatchId, TickPlan>,
) -> usize {
    let mut events = Vec::with_capacity(batch);
    let mut drained = 0;

    loop {
        events.clear();
        let polled = registrar.poll(&mut events, batch, *timeout);
        *timeout = Duration::ZERO;

        match polled {
            Ok(0) => break,
            Ok(_) => {
                for event in events.drain(..) {
                    drained += 1;
                    classify(current, event, registry, registrar, plans);
                }
            }
            Err(e) => {
                tracing::warn!("[watcher] poll failed, no events this drain: {e}");
                break;
            }
        }
    }
    drained
}

fn classify(
    current: WatchId,
    event: RawEvent,
    registry: &WatchRegistry,
    registrar: &Registrar,
    plans: &mut BTreeMap<WatchId, TickPlan>,
) {
    match registrar.resolve(event.token) {
        None => {
            crate::debug_event!(
                "watcher",
                "stale token",
                "{} {} while draining watch {current}",
                event.token,
                event.flags
            );
        }
        Some(Target::Directory(owner)) => {
            if !registry.contains(*owner) {
                tracing::warn!("[watcher] unable to find watch {owner}, skipping event");
                return;
            }
            crate::debug_event!("watcher", "directory event", "watch {owner}: {}", event.flags);
            let plan = plans.entry(*owner).or_default();
            plan.rescan = true;
            plan.fired.push(event.token);
        }
        Some(Target::Entry { watch_id, path }) => {
            if !registry.contains(*watch_id) {
                tracing::warn!("[watcher] unable to find watch {watch_id}, skipping event");
                return;
            }
            if *watch_id != current {
                crate::debug_event!(
                    "watcher",
                    "re-resolved",
                    "event for watch {watch_id} drained by watch {current}"
                );
            }
            crate::debug_event!("watcher", "file event", "{}: {}", path.display(), event.flags);

            let plan = plans.entry(*watch_id).or_default();
            plan.fired.push(event.token);
            if event.flags.is_structural() {
                plan.rescan = true;
                plan.suspects.insert(path.clone());
            } else {
                plan.dirty.insert(path.clone());
            }
        }
    }
}

fn apply(
    id: WatchId,
    plan: TickPlan,
    registry: &mut WatchRegistry,
    registrar: &mut Registrar,
    stats: &mut PumpStats,
) {
    let Some(watch) = registry.get_mut(id) else {
        return;
    };

    // Renew first so changes made while we rescan or re-stat still queue
    for token in &plan.fired {
        watch.rearm(*token, registrar);
    }

    let mut settled = plan.suspects.clone();
    if watch.take_pending_rescan() || plan.rescan {
        crate::log_event!("watcher", "rescanning", "{}", watch.directory().display());
        let outcome = watch.rescan(&plan.suspects, registrar);
        if !outcome.is_empty() {
            crate::debug_event!(
                "watcher",
                "rescan",
                "{} added, {} removed, {} replaced",
                outcome.added.len(),
                outcome.removed.len(),
                outcome.replaced.len()
            );
        }
        stats.rescans += 1;
        stats.added += outcome.added.len();
        stats.removed += outcome.removed.len();
        settled.extend(outcome.touched().cloned());
    }

    for path in plan.dirty.difference(&settled) {
        match watch.check_modified(path) {
            Ok(true) => stats.modified += 1,
            Ok(false) => {}
            Err(e) => {
                crate::debug_event!("watcher", "re-stat failed, rescan next tick", "{e}");
                watch.schedule_rescan();
            }
        }
    }
}
