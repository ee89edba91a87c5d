//! End-to-end evaluation tests.
//!
//! Tests cover:
//! - Pivot and phase classification from a full timeframe set
//! - Variant dispatch, sizing and the split into orders
//! - Exit and trailing-stop requests against open positions
//! - Counter persistence and bar-alignment bookkeeping through `run_bar`
//! - Missing collaborator data

mod common;

use common::*;
use phasetrader::adapters::csv_adapter::CsvBarAdapter;
use phasetrader::adapters::file_counter_store::FileCounterStore;
use phasetrader::adapters::paper_execution::PaperExecution;
use phasetrader::domain::counters::PersistedCounters;
use phasetrader::domain::engine::{Engine, EvaluationInput, run_bar};
use phasetrader::domain::error::PhasetraderError;
use phasetrader::domain::market::MarketIndicators;
use phasetrader::domain::position::Side;
use phasetrader::domain::signals::{CloseSelector, ExitSignal};
use phasetrader::domain::trend::TrendPhase;
use phasetrader::ports::counter_port::CounterStore;
use tempfile::TempDir;

fn evaluate_input<'a>(
    bars: &'a phasetrader::domain::bar_series::TimeframeSet,
    positions: &'a [phasetrader::domain::position::OpenPositionView],
    counters: &'a PersistedCounters,
    price: f64,
) -> EvaluationInput<'a> {
    EvaluationInput {
        bars,
        account: Some(account(10_000.0)),
        positions: Some(positions),
        counters,
        bid: price,
        ask: price,
    }
}

mod market {
    use super::*;

    #[test]
    fn rising_history_is_a_middle_up_phase() {
        let config = config_from(BACKTEST_INI);
        let market = MarketIndicators::compute(&rising_market(), &config);

        // Last closed day: H 141, L 139, C 140.5
        assert!((market.daily_pivot.pivot - 420.5 / 3.0).abs() < 1e-9);
        assert!((market.daily_pivot.r1 - (2.0 * market.daily_pivot.pivot - 139.0)).abs() < 1e-9);
        assert!((market.daily_atr.realized - 2.0).abs() < 1e-9);
        assert_eq!(market.daily_trend.ma, 2);
        assert_eq!(market.daily_trend.high_low, 1);
        assert_eq!(market.daily_trend.three_rules, 3);
        assert_eq!(market.daily_phase(), TrendPhase::MiddleUp);
    }

    #[test]
    fn intraday_bars_leave_the_daily_pivot_alone() {
        let config = config_from(BACKTEST_INI);
        let mut bars = rising_market();
        let before = MarketIndicators::compute(&bars, &config);
        for bar in primary_session(5, 14, 141.5).into_iter().skip_while(|b| b.time <= at(5, 10, 0)) {
            bars.push(phasetrader::domain::bar_series::Timeframe::Primary, bar)
                .unwrap();
        }
        let after = MarketIndicators::compute(&bars, &config);
        assert_eq!(before.daily_pivot, after.daily_pivot);
        approx::assert_abs_diff_eq!(after.daily_pivot.s1, 2.0 * 420.5 / 3.0 - 141.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(after.daily_pivot.r2, 420.5 / 3.0 + 2.0, epsilon = 1e-9);
    }

    #[test]
    fn crossing_the_daily_pivot_starts_the_up_phase() {
        use phasetrader::domain::bar_series::Timeframe;

        let config = config_from(BACKTEST_INI);
        let mut bars = rising_market();
        let mut phase_after = |time, close: f64| {
            bars.push(Timeframe::Primary, make_bar(time, close + 0.1, close - 0.1, close))
                .unwrap();
            MarketIndicators::compute(&bars, &config).daily_phase()
        };

        // pivot 140.1667, R2 142.1667
        assert_eq!(phase_after(at(5, 10, 15), 140.0), TrendPhase::MiddleUpRetreat);
        assert_eq!(phase_after(at(5, 10, 30), 140.4), TrendPhase::BeginningUp);
        assert_eq!(phase_after(at(5, 10, 45), 140.8), TrendPhase::MiddleUp);
        assert_eq!(phase_after(at(5, 11, 0), 142.5), TrendPhase::FinalUp);
    }

    #[test]
    fn flat_history_is_a_range() {
        let config = config_from(BACKTEST_INI);
        let market = MarketIndicators::compute(&flat_market(), &config);
        assert_eq!(market.daily_trend.total, 0);
        assert_eq!(market.daily_phase(), TrendPhase::Range);
    }

    #[test]
    fn missing_weekly_history_leaves_weekly_neutral() {
        let config = config_from(BACKTEST_INI);
        let market = MarketIndicators::compute(&rising_market(), &config);
        assert_eq!(market.weekly_phase(), TrendPhase::Range);
        assert_eq!(market.weekly_pivot.pivot, 0.0);
    }
}

mod dispatch {
    use super::*;

    #[test]
    fn daily_swing_breakout_produces_one_sized_order() {
        let engine = Engine::new(config_from(BACKTEST_INI));
        let bars = rising_market();
        let counters = PersistedCounters::default();
        let evaluation = engine
            .evaluate(&evaluate_input(&bars, &[], &counters, 140.5))
            .unwrap();

        assert!(!evaluation.skipped);
        assert_eq!(evaluation.orders.len(), 1);
        let order = &evaluation.orders[0];
        assert_eq!(order.side, Side::Buy);
        assert!(!order.is_pending);
        assert!((order.entry_price - 140.5).abs() < 1e-9);
        // stop 1.2 ATR below, target one ATR above
        assert!((order.stop_loss_price - 138.1).abs() < 1e-9);
        assert!((order.take_profit_price - 142.5).abs() < 1e-9);
        // 10_000 * 0.8% (neutral macro trend) / 2.4 points = 33.33.. lots
        assert!((order.lots - 33.34).abs() < 1e-9);
        assert_eq!(evaluation.report.get("daily_phase"), Some("middle_up"));
        assert_eq!(evaluation.report.get("entry_signal"), Some("1"));
    }

    #[test]
    fn daily_swing_trades_once_per_day() {
        let engine = Engine::new(config_from(BACKTEST_INI));
        let bars = rising_market();
        let counters = PersistedCounters::default();
        let positions = [position(1, Side::Buy, at(5, 9, 0), 140.0, 137.6)];
        let evaluation = engine
            .evaluate(&evaluate_input(&bars, &positions, &counters, 140.5))
            .unwrap();
        assert!(evaluation.orders.is_empty());
        assert_eq!(evaluation.signals.execution_trend, 1);
    }

    #[test]
    fn one_side_restriction_vetoes_the_entry() {
        let ini = BACKTEST_INI.replace("[risk]\n", "[risk]\none_side = -1\n");
        let engine = Engine::new(config_from(&ini));
        let bars = rising_market();
        let counters = PersistedCounters::default();
        let evaluation = engine
            .evaluate(&evaluate_input(&bars, &[], &counters, 140.5))
            .unwrap();
        assert!(evaluation.orders.is_empty());
        assert!(evaluation.signals.status.contains("one-side restriction"));
    }

    #[test]
    fn range_phase_exits_everything() {
        let engine = Engine::new(config_from(&ini_with_mode(0)));
        let bars = flat_market();
        let counters = PersistedCounters::default();
        let positions = [
            position(1, Side::Buy, at(4, 10, 0), 100.2, 98.0),
            position(2, Side::Sell, at(4, 11, 0), 99.8, 102.0),
        ];
        let evaluation = engine
            .evaluate(&evaluate_input(&bars, &positions, &counters, 100.0))
            .unwrap();
        assert_eq!(evaluation.signals.exit_signal, ExitSignal::ExitAll);
        assert_eq!(evaluation.closes.len(), 1);
        assert_eq!(evaluation.closes[0].selector, CloseSelector::All);
        assert!(evaluation.orders.is_empty());
        assert!(evaluation.modifies.is_empty());
    }

    #[test]
    fn range_exit_without_positions_sends_nothing() {
        let engine = Engine::new(config_from(&ini_with_mode(0)));
        let bars = flat_market();
        let counters = PersistedCounters::default();
        let evaluation = engine
            .evaluate(&evaluate_input(&bars, &[], &counters, 100.0))
            .unwrap();
        assert_eq!(evaluation.signals.exit_signal, ExitSignal::ExitAll);
        assert!(evaluation.closes.is_empty());
    }

    #[test]
    fn up_phase_closes_sells_and_trails_unprotected_buys() {
        let engine = Engine::new(config_from(&ini_with_mode(0)));
        let bars = rising_market();
        let counters = PersistedCounters::default();
        let positions = [
            position(1, Side::Buy, at(4, 10, 0), 139.5, 0.0),
            position(2, Side::Sell, at(4, 11, 0), 139.8, 142.0),
        ];
        let evaluation = engine
            .evaluate(&evaluate_input(&bars, &positions, &counters, 140.5))
            .unwrap();

        assert_eq!(evaluation.closes.len(), 1);
        assert_eq!(evaluation.closes[0].selector, CloseSelector::Side(Side::Sell));
        // no secondary pullback bar, so no entry; the buy gets a stop
        assert!(evaluation.orders.is_empty());
        assert_eq!(evaluation.modifies.len(), 1);
        let modify = &evaluation.modifies[0];
        assert_eq!(modify.ticket, 1);
        assert!(modify.stop_loss_price > 0.0);
        assert!(modify.stop_loss_price <= 138.5 + 1e-9);
    }

    #[test]
    fn missing_account_is_reported() {
        let engine = Engine::new(config_from(BACKTEST_INI));
        let bars = rising_market();
        let counters = PersistedCounters::default();
        let mut input = evaluate_input(&bars, &[], &counters, 140.5);
        input.account = None;
        assert!(matches!(
            engine.evaluate(&input),
            Err(PhasetraderError::MissingCollaboratorData { .. })
        ));
    }

    #[test]
    fn missing_positions_are_reported() {
        let engine = Engine::new(config_from(BACKTEST_INI));
        let bars = rising_market();
        let counters = PersistedCounters::default();
        let mut input = evaluate_input(&bars, &[], &counters, 140.5);
        input.positions = None;
        assert!(matches!(
            engine.evaluate(&input),
            Err(PhasetraderError::MissingCollaboratorData { .. })
        ));
    }
}

mod run_bar_pipeline {
    use super::*;

    #[test]
    fn orders_reach_the_execution_backend() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(config_from(BACKTEST_INI));
        let mut execution = PaperExecution::new(account(10_000.0), Vec::new());
        let store = FileCounterStore::new(dir.path());

        let evaluation = run_bar(&engine, &rising_market(), &mut execution, &store).unwrap();
        assert_eq!(execution.orders, evaluation.orders);
        assert_eq!(execution.orders.len(), 1);
        // nothing changed, nothing written
        assert!(!dir.path().join("counters_7.csv").exists());
        assert!(store.open(7).is_ok());
    }

    #[test]
    fn exits_are_applied_before_orders() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(config_from(BACKTEST_INI));
        let mut execution = PaperExecution::new(
            account(10_000.0),
            vec![position(3, Side::Sell, at(4, 12, 0), 139.0, 142.0)],
        );
        let store = FileCounterStore::new(dir.path());

        run_bar(&engine, &rising_market(), &mut execution, &store).unwrap();
        assert_eq!(execution.closes.len(), 1);
        assert!(execution.positions().iter().all(|p| !p.is_open));
        assert_eq!(execution.orders.len(), 1);
    }

    #[test]
    fn live_misalignment_counts_rate_errors_across_bars() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(config_from(&live_ini()));
        let store = FileCounterStore::new(dir.path());
        let bars = rising_market();

        for expected in 1..=3u32 {
            let mut execution = PaperExecution::new(account(10_000.0), Vec::new());
            let evaluation = run_bar(&engine, &bars, &mut execution, &store).unwrap();
            assert!(evaluation.skipped);
            assert!(execution.orders.is_empty());
            assert_eq!(
                store.open(7).unwrap().counters().rate_error_count,
                expected
            );
        }
    }

    #[test]
    fn repeated_misalignment_is_eventually_bypassed() {
        let dir = TempDir::new().unwrap();
        let config = config_from(&live_ini());
        let max = config.max_rate_errors;
        let engine = Engine::new(config);
        let store = FileCounterStore::new(dir.path());
        store
            .open(7)
            .unwrap()
            .commit(&PersistedCounters {
                rate_error_count: max + 1,
                ..PersistedCounters::default()
            })
            .unwrap();

        let mut execution = PaperExecution::new(account(10_000.0), Vec::new());
        let evaluation = run_bar(&engine, &rising_market(), &mut execution, &store).unwrap();
        assert!(!evaluation.skipped);
        assert_eq!(execution.orders.len(), 1);
        assert_eq!(store.open(7).unwrap().counters().rate_error_count, max + 1);
    }

    #[test]
    fn locked_counters_abort_the_bar() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(config_from(BACKTEST_INI));
        let store = FileCounterStore::new(dir.path());
        let _held = store.open(7).unwrap();

        let mut execution = PaperExecution::new(account(10_000.0), Vec::new());
        let err = run_bar(&engine, &rising_market(), &mut execution, &store).unwrap_err();
        assert!(matches!(err, PhasetraderError::CounterStore { instance_id: 7, .. }));
        assert!(execution.orders.is_empty());
    }

    #[test]
    fn bars_round_trip_through_csv_files() {
        let dir = TempDir::new().unwrap();
        let in_memory = rising_market();
        write_bar_dir(dir.path(), &in_memory);
        let loaded = CsvBarAdapter::new(dir.path()).load(300).unwrap();

        let engine = Engine::new(config_from(BACKTEST_INI));
        let counters = PersistedCounters::default();
        let from_memory = engine
            .evaluate(&evaluate_input(&in_memory, &[], &counters, 140.5))
            .unwrap();
        let from_disk = engine
            .evaluate(&evaluate_input(&loaded, &[], &counters, 140.5))
            .unwrap();
        assert_eq!(from_memory.orders, from_disk.orders);
        assert_eq!(from_memory.report, from_disk.report);
    }
}
