//! Typed engine configuration built from a [`ConfigPort`].
//!
//! Sections: `[instance]`, `[risk]`, `[indicators]`, `[broker]`, `[account]`
//! and per-symbol `[policy.<SYMBOL>]`. Call
//! [`validate_engine_config`](crate::domain::config_validation::validate_engine_config)
//! first; `from_port` only rejects what it cannot represent.

use crate::domain::error::PhasetraderError;
use crate::domain::indicator::atr::AtrSmoothing;
use crate::domain::symbol_policy::SymbolPolicy;
use crate::ports::config_port::ConfigPort;

/// How the take-profit distance of a plain (unsplit) order is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TakeProfitMode {
    /// Same distance as the stop.
    #[default]
    StopDistance,
    None,
    DailyAtr,
    /// Distance to the take-profit price the strategy produced.
    TargetPrice,
}

impl TakeProfitMode {
    /// Codes 0, 2, 3 and 4; anything else falls back to the stop distance.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => TakeProfitMode::None,
            3 => TakeProfitMode::DailyAtr,
            4 => TakeProfitMode::TargetPrice,
            _ => TakeProfitMode::StopDistance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub instance_id: u32,
    pub symbol: String,
    pub mode: u32,
    pub take_profit_mode: TakeProfitMode,
    pub is_backtesting: bool,
    pub execution_minutes: u32,
    pub capacity: usize,
    pub max_rate_errors: u32,
    /// Hour after which a range-order record may be written.
    pub range_stop_hour: u32,

    /// Percent of equity risked per trade.
    pub risk: f64,
    pub max_strategy_risk: f64,
    pub max_account_risk: f64,
    pub account_risk_percent: f64,
    pub macro_trend: i8,
    pub one_side: i8,

    pub atr_period: usize,
    pub atr_smoothing: AtrSmoothing,
    pub daily_ma_short: usize,
    pub daily_ma_long: usize,
    pub intraday_ma_short: usize,
    pub intraday_ma_long: usize,

    pub adjust_points: f64,
    pub virtual_balance_topup: f64,

    pub policy: SymbolPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_id: 0,
            symbol: String::new(),
            mode: 0,
            take_profit_mode: TakeProfitMode::StopDistance,
            is_backtesting: true,
            execution_minutes: 15,
            capacity: 500,
            max_rate_errors: 5,
            range_stop_hour: 22,
            risk: 1.0,
            max_strategy_risk: 6.0,
            max_account_risk: 3.0,
            account_risk_percent: 3.0,
            macro_trend: 0,
            one_side: 0,
            atr_period: 20,
            atr_smoothing: AtrSmoothing::Simple,
            daily_ma_short: 2,
            daily_ma_long: 8,
            intraday_ma_short: 50,
            intraday_ma_long: 200,
            adjust_points: 0.0,
            virtual_balance_topup: 0.0,
            policy: SymbolPolicy::default(),
        }
    }
}

fn non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<u64, PhasetraderError> {
    let value = config.get_int(section, key, default);
    u64::try_from(value).map_err(|_| PhasetraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{key} must be non-negative"),
    })
}

fn signed_unit(config: &dyn ConfigPort, section: &str, key: &str) -> i8 {
    config.get_int(section, key, 0).signum() as i8
}

impl EngineConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, PhasetraderError> {
        let d = Self::default();
        let symbol = config
            .get_string("instance", "symbol")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PhasetraderError::ConfigMissing {
                section: "instance".into(),
                key: "symbol".into(),
            })?;

        let smoothing_name = config
            .get_string("indicators", "atr_smoothing")
            .unwrap_or_else(|| "simple".to_string());
        let atr_smoothing =
            AtrSmoothing::from_name(&smoothing_name).ok_or_else(|| PhasetraderError::ConfigInvalid {
                section: "indicators".into(),
                key: "atr_smoothing".into(),
                reason: format!("unknown smoothing '{smoothing_name}'"),
            })?;

        let policy = SymbolPolicy::from_port(config, &symbol);
        let u32_of = |v: u64| u32::try_from(v).unwrap_or(u32::MAX);
        let usize_of = |v: u64| usize::try_from(v).unwrap_or(usize::MAX);

        Ok(Self {
            instance_id: u32_of(non_negative_int(config, "instance", "id", 0)?),
            mode: u32_of(non_negative_int(config, "instance", "mode", 0)?),
            take_profit_mode: TakeProfitMode::from_code(config.get_int(
                "instance",
                "take_profit_mode",
                0,
            )),
            is_backtesting: config.get_bool("instance", "backtesting", d.is_backtesting),
            execution_minutes: u32_of(non_negative_int(
                config,
                "instance",
                "execution_minutes",
                i64::from(d.execution_minutes),
            )?),
            capacity: usize_of(non_negative_int(config, "instance", "capacity", 500)?),
            max_rate_errors: u32_of(non_negative_int(
                config,
                "instance",
                "max_rate_errors",
                i64::from(d.max_rate_errors),
            )?),
            range_stop_hour: u32_of(non_negative_int(
                config,
                "instance",
                "range_stop_hour",
                i64::from(d.range_stop_hour),
            )?),

            risk: config.get_double("risk", "risk", d.risk),
            max_strategy_risk: config.get_double("risk", "max_strategy_risk", d.max_strategy_risk),
            max_account_risk: config.get_double("risk", "max_account_risk", d.max_account_risk),
            account_risk_percent: config.get_double(
                "risk",
                "account_risk_percent",
                d.account_risk_percent,
            ),
            macro_trend: signed_unit(config, "risk", "macro_trend"),
            one_side: signed_unit(config, "risk", "one_side"),

            atr_period: usize_of(non_negative_int(config, "indicators", "atr_period", 20)?),
            atr_smoothing,
            daily_ma_short: usize_of(non_negative_int(config, "indicators", "daily_ma_short", 2)?),
            daily_ma_long: usize_of(non_negative_int(config, "indicators", "daily_ma_long", 8)?),
            intraday_ma_short: usize_of(non_negative_int(
                config,
                "indicators",
                "intraday_ma_short",
                50,
            )?),
            intraday_ma_long: usize_of(non_negative_int(
                config,
                "indicators",
                "intraday_ma_long",
                200,
            )?),

            adjust_points: config.get_double("broker", "adjust_points", d.adjust_points),
            virtual_balance_topup: config.get_double(
                "account",
                "virtual_balance_topup",
                d.virtual_balance_topup,
            ),

            symbol,
            policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn take_profit_mode_codes() {
        assert_eq!(TakeProfitMode::from_code(0), TakeProfitMode::StopDistance);
        assert_eq!(TakeProfitMode::from_code(1), TakeProfitMode::StopDistance);
        assert_eq!(TakeProfitMode::from_code(2), TakeProfitMode::None);
        assert_eq!(TakeProfitMode::from_code(3), TakeProfitMode::DailyAtr);
        assert_eq!(TakeProfitMode::from_code(4), TakeProfitMode::TargetPrice);
        assert_eq!(TakeProfitMode::from_code(99), TakeProfitMode::StopDistance);
    }

    #[test]
    fn builds_from_minimal_config() {
        let adapter = FileConfigAdapter::from_string("[instance]\nsymbol = EURUSD\n").unwrap();
        let config = EngineConfig::from_port(&adapter).unwrap();
        assert_eq!(config.symbol, "EURUSD");
        assert_eq!(config.mode, 0);
        assert_eq!(config.risk, 1.0);
        assert_eq!(config.atr_period, 20);
        assert_eq!(config.daily_ma_long, 8);
        assert_eq!(config.policy.symbol, "EURUSD");
    }

    #[test]
    fn reads_every_section() {
        let content = r#"
[instance]
id = 7
symbol = XAUUSD
mode = 10
take_profit_mode = 3
backtesting = false

[risk]
risk = 2.0
max_strategy_risk = 4.0
max_account_risk = 5.0
macro_trend = -1
one_side = 1

[indicators]
atr_period = 14
atr_smoothing = wilder

[broker]
adjust_points = 0.3

[account]
virtual_balance_topup = 5000

[policy.XAUUSD]
risk_multiplier = 0.5
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        let config = EngineConfig::from_port(&adapter).unwrap();
        assert_eq!(config.instance_id, 7);
        assert_eq!(config.mode, 10);
        assert_eq!(config.take_profit_mode, TakeProfitMode::DailyAtr);
        assert!(!config.is_backtesting);
        assert_eq!(config.risk, 2.0);
        assert_eq!(config.policy.risk_multiplier, 0.5);
        assert_eq!(config.max_strategy_risk, 4.0);
        assert_eq!(config.macro_trend, -1);
        assert_eq!(config.one_side, 1);
        assert_eq!(config.atr_smoothing, AtrSmoothing::Wilder);
        assert_eq!(config.atr_period, 14);
        assert_eq!(config.adjust_points, 0.3);
        assert_eq!(config.virtual_balance_topup, 5000.0);
        assert_eq!(config.policy.start_hour, 1);
    }

    #[test]
    fn missing_symbol_is_an_error() {
        let adapter = FileConfigAdapter::from_string("[instance]\nmode = 0\n").unwrap();
        let err = EngineConfig::from_port(&adapter).unwrap_err();
        assert!(matches!(err, PhasetraderError::ConfigMissing { .. }));
    }

    #[test]
    fn negative_mode_is_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[instance]\nsymbol = EURUSD\nmode = -1\n").unwrap();
        assert!(EngineConfig::from_port(&adapter).is_err());
    }
}
