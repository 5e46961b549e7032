use std::collections::HashMap;
use std::sync::Arc;

use super::{Sharer, SocialGraph};
use crate::error::Result;
use crate::models::Event;

/// Sharers are expanded one level deep; their own sharers never are.
pub const SHARE_DEPTH: u8 = 1;

/// Other users' events grouped by performance id, in sharer order.
#[derive(Default, Debug, Clone)]
pub struct SharedInterests {
    by_performance: HashMap<i64, Vec<Arc<Event>>>,
}

impl SharedInterests {
    pub fn add(&mut self, event: Event) {
        self.by_performance
            .entry(event.performance_id)
            .or_default()
            .push(Arc::new(event));
    }

    pub fn for_performance(&self, performance_id: i64) -> Vec<Arc<Event>> {
        self.by_performance
            .get(&performance_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_performance.is_empty()
    }
}

/// Loads every sharer's events through `load` and groups them. A sharer whose
/// events cannot be loaded is left out.
pub fn aggregate<G, F>(graph: &G, user_id: i64, mut load: F) -> Result<SharedInterests>
where
    G: SocialGraph + ?Sized,
    F: FnMut(&Sharer) -> Result<Vec<Event>>,
{
    let mut shared = SharedInterests::default();
    for sharer in graph.shared_by(user_id)? {
        match load(&sharer) {
            Ok(events) => {
                for event in events {
                    shared.add(event);
                }
            }
            Err(err) => {
                log::warn!(
                    "skipping schedule shared by user {} with user {user_id}: {err}",
                    sharer.user_id
                );
            }
        }
    }
    Ok(shared)
}
