use crate::config::{MarketConfigRow, ParamsTable, StrategyAssignments};
use crate::error::StrategyError;
use crate::strategy::dutch_arb::DutchArb;
use crate::strategy::market_maker::{MarketMaker, QuotePricer, QuoteSizer};
use crate::strategy::{MarketData, StrategyContext, StrategyExec};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// Process-wide registry mapping market id to a cooperative mutex, created
/// lazily on first access and never removed (spec.md §5, §9 "Lock registry
/// as module-level mutable map" — here owned by the manager instead of
/// living as a global).
#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, market_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(market_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

/// Tagged variant replacing class-object dispatch (spec.md §9 "Registry of
/// strategy types"): adding a strategy is a code change, not runtime
/// polymorphism.
pub enum Strategy {
    MarketMaker(MarketMaker),
    DutchArb(DutchArb),
}

#[async_trait]
impl StrategyExec for Strategy {
    async fn execute(
        &self,
        market_id: &str,
        market_data: &MarketData<'_>,
    ) -> Result<(), StrategyError> {
        match self {
            Strategy::MarketMaker(s) => s.execute(market_id, market_data).await,
            Strategy::DutchArb(s) => s.execute(market_id, market_data).await,
        }
    }
}

/// Registry + per-market dispatcher (spec.md §4.5). Holds one shared
/// `StrategyContext` and a singleton instance per strategy id, constructed
/// lazily on first `get_instance`.
pub struct StrategyManager {
    ctx: StrategyContext,
    pricer: Arc<dyn QuotePricer>,
    sizer: Arc<dyn QuoteSizer>,
    instances: DashMap<String, Arc<Strategy>>,
    assignments: StrategyAssignments,
    locks: LockRegistry,
}

impl StrategyManager {
    pub fn new(
        ctx: StrategyContext,
        pricer: Arc<dyn QuotePricer>,
        sizer: Arc<dyn QuoteSizer>,
        assignments: StrategyAssignments,
    ) -> Self {
        Self {
            ctx,
            pricer,
            sizer,
            instances: DashMap::new(),
            assignments,
            locks: LockRegistry::new(),
        }
    }

    /// Lazily constructs (or returns the cached) instance for a strategy id.
    /// Default registry: `{"market_maker", "dutch_arb"}`.
    pub fn get_instance(&self, id: &str) -> Result<Arc<Strategy>, StrategyError> {
        if let Some(existing) = self.instances.get(id) {
            return Ok(existing.value().clone());
        }
        let strategy = match id {
            "market_maker" => Strategy::MarketMaker(MarketMaker::new(
                self.ctx.clone(),
                self.pricer.clone(),
                self.sizer.clone(),
            )),
            "dutch_arb" => Strategy::DutchArb(DutchArb::new(self.ctx.clone())),
            other => return Err(StrategyError::UnknownStrategy(other.to_string())),
        };
        let strategy = Arc::new(strategy);
        self.instances.insert(id.to_string(), strategy.clone());
        Ok(strategy)
    }

    /// Resolves the strategy ids assigned to a market. Unknown ids are
    /// logged and skipped, never fatal (spec.md §4.5).
    pub fn strategies_for_market(&self, condition_id: &str) -> Vec<Arc<Strategy>> {
        let ids = self
            .assignments
            .get(condition_id)
            .cloned()
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| match self.get_instance(&id) {
                Ok(strategy) => Some(strategy),
                Err(err) => {
                    warn!(condition_id, strategy_id = %id, error = %err, "unknown strategy id, skipping");
                    None
                }
            })
            .collect()
    }

    /// Runs every strategy assigned to `condition_id` in configured order,
    /// holding that market's lock for the whole sequence — strategies on
    /// the same market never interleave, and a failure in one never stops
    /// the next (spec.md §4.5, §7).
    pub async fn execute_strategies(&self, condition_id: &str, row: &MarketConfigRow, params: &ParamsTable) {
        let Some(param_row) = params.get(&row.param_type) else {
            error!(condition_id, param_type = %row.param_type, "market config references unknown param_type");
            return;
        };
        let market_data = MarketData {
            config: row,
            params: param_row,
        };

        let lock = self.locks.lock_for(condition_id);
        let _guard = lock.lock().await;

        for strategy in self.strategies_for_market(condition_id) {
            if let Err(err) = strategy.execute(condition_id, &market_data).await {
                error!(condition_id, error = ?err, "strategy execution failed, continuing with next strategy");
            }
        }
    }
}
