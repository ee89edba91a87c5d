//! Per-bar evaluation pipeline.
//!
//! [`Engine::evaluate`] turns one snapshot (bars, account, positions,
//! counters, quote) into close, modify and order requests plus the counter
//! state for the next bar. It performs no I/O; [`run_bar`] wires it to an
//! [`ExecutionPort`] and a [`CounterStore`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::domain::bar_series::TimeframeSet;
use crate::domain::config::EngineConfig;
use crate::domain::context::StrategyContext;
use crate::domain::counters::{CounterWrite, PersistedCounters};
use crate::domain::dispatch::{StrategyRegistry, apply_global_filters, standard_registry};
use crate::domain::error::PhasetraderError;
use crate::domain::market::MarketIndicators;
use crate::domain::position::{AccountSnapshot, OpenPositionView, Side};
use crate::domain::profit;
use crate::domain::signals::{
    CloseRequest, CloseSelector, ExitSignal, ModifyRequest, OrderRequest, Signals,
};
use crate::domain::sizing::{SizingInputs, split_orders};
use crate::ports::counter_port::CounterStore;
use crate::ports::execution_port::ExecutionPort;

/// Named values shown to the operator after each bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiReport {
    values: Vec<(String, String)>,
}

impl UiReport {
    pub fn push(&mut self, name: &str, value: impl fmt::Display) {
        self.values.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for UiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.values {
            writeln!(f, "{name:<24}{value}")?;
        }
        Ok(())
    }
}

/// One evaluation's inputs. Account and positions are optional because the
/// backend may fail to report them.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub bars: &'a TimeframeSet,
    pub account: Option<AccountSnapshot>,
    pub positions: Option<&'a [OpenPositionView]>,
    pub counters: &'a PersistedCounters,
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub closes: Vec<CloseRequest>,
    pub modifies: Vec<ModifyRequest>,
    pub orders: Vec<OrderRequest>,
    pub signals: Signals,
    pub report: UiReport,
    /// Counter state after this bar.
    pub counters: PersistedCounters,
    /// The bar was skipped because the series were not aligned.
    pub skipped: bool,
}

pub struct Engine {
    config: EngineConfig,
    registry: StrategyRegistry,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, standard_registry())
    }

    pub fn with_registry(config: EngineConfig, registry: StrategyRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rate-error bookkeeping for live trading. Returns the writes to apply
    /// and whether the bar must be skipped.
    fn check_alignment(&self, input: &EvaluationInput<'_>) -> (Vec<CounterWrite>, bool) {
        if self.config.is_backtesting {
            return (Vec::new(), false);
        }
        let misaligned = input.bars.misaligned(self.config.execution_minutes);
        let count = input.counters.rate_error_count;
        if misaligned.is_empty() {
            let writes = if count > 0 {
                vec![CounterWrite::RateErrors(0)]
            } else {
                Vec::new()
            };
            return (writes, false);
        }
        if count > self.config.max_rate_errors {
            warn!(
                instance = self.config.instance_id,
                errors = count,
                "bar alignment failing repeatedly, validation bypassed"
            );
            return (Vec::new(), false);
        }
        let names: Vec<&str> = misaligned.iter().map(|tf| tf.name()).collect();
        warn!(
            instance = self.config.instance_id,
            timeframes = ?names,
            errors = count + 1,
            "series not aligned with the primary bar, skipping"
        );
        (vec![CounterWrite::RateErrors(count + 1)], true)
    }

    pub fn evaluate(&self, input: &EvaluationInput<'_>) -> Result<Evaluation, PhasetraderError> {
        let config = &self.config;
        let account = input
            .account
            .ok_or_else(|| PhasetraderError::MissingCollaboratorData {
                what: "account snapshot".into(),
            })?;
        let positions = input
            .positions
            .ok_or_else(|| PhasetraderError::MissingCollaboratorData {
                what: "open positions".into(),
            })?;
        let now = input
            .bars
            .now()
            .ok_or_else(|| PhasetraderError::MissingCollaboratorData {
                what: "primary bars".into(),
            })?;

        let (mut writes, skip) = self.check_alignment(input);
        if skip {
            return Ok(Evaluation {
                counters: input.counters.with_writes(&writes),
                skipped: true,
                ..Evaluation::default()
            });
        }

        let account = account.with_topup(config.virtual_balance_topup);
        if account.equity <= 0.0 {
            return Err(PhasetraderError::MissingCollaboratorData {
                what: format!("positive account equity (got {})", account.equity),
            });
        }

        let market = MarketIndicators::compute(input.bars, config);
        let ctx = StrategyContext {
            config,
            bars: input.bars,
            market: &market,
            account,
            positions,
            counters: input.counters,
            now,
            bid: input.bid,
            ask: input.ask,
        };

        let signals = self.registry.dispatch(&ctx);
        let signals = apply_global_filters(signals, &account, config);
        let decision = profit::manage(&ctx, signals, config);
        let signals = decision.signals;

        let closes = exit_requests(&ctx, &signals, decision.closes);
        let modifies = modify_requests(&ctx, &signals, &closes);

        let mut orders = Vec::new();
        if signals.entry_signal != 0 {
            let inputs = SizingInputs {
                risk_percent: config.risk * config.policy.risk_multiplier * signals.risk,
                equity: account.equity,
                policy: &config.policy,
                take_profit_mode: config.take_profit_mode,
                daily_atr: market.daily_atr.realized,
            };
            for result in split_orders(&signals, &inputs) {
                match result {
                    Ok(order) => orders.push(order),
                    Err(err) => warn!(instance = config.instance_id, "order dropped: {err}"),
                }
            }
        }

        writes.extend(signals.counter_writes.iter().copied());
        let counters = input.counters.with_writes(&writes);

        let mut report = UiReport::default();
        report.push("time", now);
        report.push("mode", config.mode);
        report.push("daily_phase", market.daily_phase());
        report.push("weekly_phase", market.weekly_phase());
        report.push("daily_trend_total", market.daily_trend.total);
        report.push("daily_pivot", format!("{:.5}", market.daily_pivot.pivot));
        report.push("daily_atr", format!("{:.5}", market.daily_atr.realized));
        report.push("predicted_atr", format!("{:.5}", market.daily_prediction.predicted));
        report.push("execution_trend", signals.execution_trend);
        report.push("entry_signal", signals.entry_signal);
        report.push("exit_signal", format!("{:?}", signals.exit_signal));
        report.push("strategy_risk", format!("{:.2}", decision.strategy_risk));
        report.push("floating_pnl", format!("{:.2}", decision.floating_pnl));
        report.push("status", &signals.status);

        info!(
            instance = config.instance_id,
            phase = %market.daily_phase(),
            entry = signals.entry_signal,
            orders = orders.len(),
            closes = closes.len(),
            modifies = modifies.len(),
            "bar evaluated"
        );

        Ok(Evaluation {
            closes,
            modifies,
            orders,
            signals,
            report,
            counters,
            skipped: false,
        })
    }
}

/// Side-wide exits first, then individual tickets not already covered.
fn exit_requests(
    ctx: &StrategyContext<'_>,
    signals: &Signals,
    tickets: Vec<CloseRequest>,
) -> Vec<CloseRequest> {
    let mut closes = Vec::new();
    let reason = format!("exit signal {:?}", signals.exit_signal);
    let has_buys = ctx.open_on(Side::Buy).next().is_some();
    let has_sells = ctx.open_on(Side::Sell).next().is_some();
    match signals.exit_signal {
        ExitSignal::None => {}
        ExitSignal::ExitAll if has_buys || has_sells => {
            closes.push(CloseRequest::new(CloseSelector::All, reason));
        }
        ExitSignal::ExitBuy if has_buys => {
            closes.push(CloseRequest::new(CloseSelector::Side(Side::Buy), reason));
        }
        ExitSignal::ExitSell if has_sells => {
            closes.push(CloseRequest::new(CloseSelector::Side(Side::Sell), reason));
        }
        _ => {}
    }

    for request in tickets {
        let covered = match request.selector {
            CloseSelector::Ticket(ticket) => ctx
                .positions
                .iter()
                .find(|p| p.ticket == ticket)
                .is_some_and(|p| signals.exit_signal.closes(p.side)),
            _ => false,
        };
        if !covered {
            closes.push(request);
        }
    }
    closes
}

/// Trail the stop of positions in the execution trend when no new entry is
/// made and the strategy's stop tightens theirs.
fn modify_requests(
    ctx: &StrategyContext<'_>,
    signals: &Signals,
    closes: &[CloseRequest],
) -> Vec<ModifyRequest> {
    let Some(side) = Side::from_signal(signals.execution_trend) else {
        return Vec::new();
    };
    let stop = signals.stop_loss_price;
    if signals.entry_signal != 0 || stop <= 0.0 {
        return Vec::new();
    }
    // A stop through the market would close at once.
    let valid = match side {
        Side::Buy => stop < ctx.bid,
        Side::Sell => stop > ctx.ask,
    };
    if !valid {
        return Vec::new();
    }
    let closing = |p: &OpenPositionView| {
        closes.iter().any(|c| match c.selector {
            CloseSelector::All => true,
            CloseSelector::Side(s) => s == p.side,
            CloseSelector::Ticket(t) => t == p.ticket,
        })
    };
    ctx.open_on(side)
        .filter(|p| !closing(p) && p.tightens_stop(stop))
        .map(|p| {
            debug!(ticket = p.ticket, from = p.stop_loss, to = stop, "trailing stop");
            ModifyRequest {
                ticket: p.ticket,
                stop_loss_price: stop,
                take_profit_price: p.take_profit,
            }
        })
        .collect()
}

/// Evaluate the latest bar against live collaborators: read the counters,
/// evaluate, send the requests (exits first) and commit the counters.
pub fn run_bar(
    engine: &Engine,
    bars: &TimeframeSet,
    execution: &mut dyn ExecutionPort,
    store: &dyn CounterStore,
) -> Result<Evaluation, PhasetraderError> {
    let session = store.open(engine.config().instance_id)?;
    let positions = execution.open_positions();
    let latest_close = bars
        .get(crate::domain::bar_series::Timeframe::Primary)
        .latest()
        .map(|b| b.close)
        .unwrap_or_default();
    let (bid, ask) = execution.quote().unwrap_or((latest_close, latest_close));

    let evaluation = engine.evaluate(&EvaluationInput {
        bars,
        account: execution.account_snapshot(),
        positions: positions.as_deref(),
        counters: session.counters(),
        bid,
        ask,
    })?;

    for request in &evaluation.closes {
        if let Err(err) = execution.close(request) {
            warn!(selector = ?request.selector, "close rejected: {err}");
        }
    }
    for request in &evaluation.modifies {
        if let Err(err) = execution.modify(request) {
            warn!(ticket = request.ticket, "modify rejected: {err}");
        }
    }
    for order in &evaluation.orders {
        if let Err(err) = execution.submit(order) {
            warn!(side = %order.side, lots = order.lots, "order rejected: {err}");
        }
    }

    if &evaluation.counters != session.counters() {
        session.commit(&evaluation.counters)?;
    }
    Ok(evaluation)
}
