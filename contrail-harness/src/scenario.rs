use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use contrail_core::StoreResult;
use contrail_shared::ReservationData;

use crate::workflows::{self, ScenarioCtx};

/// What one scenario invocation left behind: the stable name to file metrics
/// under (for random dispatch, the delegate's name) and the reservations
/// still standing, handed to the cleanup policy.
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub reservations: Vec<ReservationData>,
}

/// One named, self-contained unit of concurrent load: run a workflow, let it
/// self-check and classify, report what survived.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &ScenarioCtx, passenger: &str) -> StoreResult<ScenarioOutcome>;
}

pub struct SingleBooking;

#[async_trait]
impl Scenario for SingleBooking {
    fn name(&self) -> &'static str {
        "single_booking"
    }

    async fn execute(&self, ctx: &ScenarioCtx, passenger: &str) -> StoreResult<ScenarioOutcome> {
        let reservations = workflows::create_and_verify(ctx, passenger)
            .await?
            .into_iter()
            .collect();
        Ok(ScenarioOutcome {
            name: self.name(),
            reservations,
        })
    }
}

pub struct BookAndCancel;

#[async_trait]
impl Scenario for BookAndCancel {
    fn name(&self) -> &'static str {
        "book_and_cancel"
    }

    async fn execute(&self, ctx: &ScenarioCtx, passenger: &str) -> StoreResult<ScenarioOutcome> {
        let reservations = workflows::create_and_cancel(ctx, passenger).await?;
        Ok(ScenarioOutcome {
            name: self.name(),
            reservations,
        })
    }
}

pub struct BookAndChange;

#[async_trait]
impl Scenario for BookAndChange {
    fn name(&self) -> &'static str {
        "book_and_change"
    }

    async fn execute(&self, ctx: &ScenarioCtx, passenger: &str) -> StoreResult<ScenarioOutcome> {
        let reservations = workflows::create_and_change(ctx, passenger).await?;
        Ok(ScenarioOutcome {
            name: self.name(),
            reservations,
        })
    }
}

pub struct MultiFlightBooking;

#[async_trait]
impl Scenario for MultiFlightBooking {
    fn name(&self) -> &'static str {
        "multi_flight_booking"
    }

    async fn execute(&self, ctx: &ScenarioCtx, passenger: &str) -> StoreResult<ScenarioOutcome> {
        let reservations = workflows::multi_booking(ctx, passenger).await?;
        Ok(ScenarioOutcome {
            name: self.name(),
            reservations,
        })
    }
}

/// Per-invocation uniform dispatch over the four concrete scenarios. The
/// pick happens inside `execute` with the thread-local RNG, so concurrent
/// workers never observe each other's in-flight choice, and the outcome
/// carries the delegate's name.
pub struct RandomMix {
    delegates: Vec<Arc<dyn Scenario>>,
}

impl RandomMix {
    pub fn new() -> Self {
        Self {
            delegates: registry(),
        }
    }
}

impl Default for RandomMix {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for RandomMix {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn execute(&self, ctx: &ScenarioCtx, passenger: &str) -> StoreResult<ScenarioOutcome> {
        let idx = rand::thread_rng().gen_range(0..self.delegates.len());
        self.delegates[idx].execute(ctx, passenger).await
    }
}

/// The explicit scenario registry, populated at startup. No discovery by
/// naming convention.
pub fn registry() -> Vec<Arc<dyn Scenario>> {
    vec![
        Arc::new(SingleBooking),
        Arc::new(BookAndCancel),
        Arc::new(BookAndChange),
        Arc::new(MultiFlightBooking),
    ]
}

pub fn resolve(name: &str) -> Option<Arc<dyn Scenario>> {
    if name == "random" {
        return Some(Arc::new(RandomMix::new()));
    }
    registry().into_iter().find(|s| s.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_names_are_unique() {
        let names: Vec<_> = registry().iter().map(|s| s.name()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_resolve_known_names() {
        for name in [
            "single_booking",
            "book_and_cancel",
            "book_and_change",
            "multi_flight_booking",
            "random",
        ] {
            let scenario = resolve(name).expect("known scenario");
            if name != "random" {
                assert_eq!(scenario.name(), name);
            }
        }
        assert!(resolve("no_such_scenario").is_none());
    }
}
