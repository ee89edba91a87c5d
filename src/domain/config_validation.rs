//! Configuration validation.
//!
//! Validates all config fields before the engine is built.

use crate::domain::error::PhasetraderError;
use crate::domain::indicator::atr::AtrSmoothing;
use crate::domain::symbol_policy::SymbolPolicy;
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(
    config: &dyn ConfigPort,
    known_modes: &[u32],
) -> Result<(), PhasetraderError> {
    let symbol = validate_symbol(config)?;
    validate_mode(config, known_modes)?;
    validate_risk(config)?;
    validate_direction_bias(config)?;
    validate_indicators(config)?;
    validate_instance_limits(config)?;
    validate_broker(config)?;
    validate_policy(config, &symbol)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PhasetraderError {
    PhasetraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<String, PhasetraderError> {
    match config.get_string("instance", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(PhasetraderError::ConfigMissing {
            section: "instance".to_string(),
            key: "symbol".to_string(),
        }),
    }
}

fn validate_mode(config: &dyn ConfigPort, known_modes: &[u32]) -> Result<(), PhasetraderError> {
    let mode = config.get_int("instance", "mode", 0);
    let known = u32::try_from(mode).is_ok_and(|m| known_modes.contains(&m));
    if !known {
        return Err(invalid(
            "instance",
            "mode",
            format!("unknown strategy mode {mode}"),
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), PhasetraderError> {
    let risk = config.get_double("risk", "risk", 1.0);
    if risk <= 0.0 || risk > 100.0 {
        return Err(invalid("risk", "risk", "risk must be between 0 and 100"));
    }
    for key in ["max_strategy_risk", "max_account_risk", "account_risk_percent"] {
        let value = config.get_double("risk", key, 3.0);
        if value <= 0.0 {
            return Err(invalid("risk", key, format!("{key} must be positive")));
        }
    }
    Ok(())
}

fn validate_direction_bias(config: &dyn ConfigPort) -> Result<(), PhasetraderError> {
    let macro_trend = config.get_int("risk", "macro_trend", 0);
    let one_side = config.get_int("risk", "one_side", 0);
    for (key, value) in [("macro_trend", macro_trend), ("one_side", one_side)] {
        if !(-1..=1).contains(&value) {
            return Err(invalid("risk", key, format!("{key} must be -1, 0 or 1")));
        }
    }
    if macro_trend * one_side < 0 {
        return Err(PhasetraderError::InvalidConfiguration {
            reason: format!(
                "macro_trend {macro_trend} conflicts with one_side restriction {one_side}"
            ),
        });
    }
    Ok(())
}

fn validate_ma_pair(
    config: &dyn ConfigPort,
    short_key: &str,
    long_key: &str,
    defaults: (i64, i64),
) -> Result<(), PhasetraderError> {
    let short = config.get_int("indicators", short_key, defaults.0);
    let long = config.get_int("indicators", long_key, defaults.1);
    if short < 1 {
        return Err(invalid("indicators", short_key, format!("{short_key} must be at least 1")));
    }
    if long <= short {
        return Err(invalid(
            "indicators",
            long_key,
            format!("{long_key} must be greater than {short_key}"),
        ));
    }
    Ok(())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), PhasetraderError> {
    if config.get_int("indicators", "atr_period", 20) < 1 {
        return Err(invalid("indicators", "atr_period", "atr_period must be at least 1"));
    }
    if let Some(name) = config.get_string("indicators", "atr_smoothing") {
        if AtrSmoothing::from_name(&name).is_none() {
            return Err(invalid(
                "indicators",
                "atr_smoothing",
                format!("unknown smoothing '{name}', expected simple or wilder"),
            ));
        }
    }
    validate_ma_pair(config, "daily_ma_short", "daily_ma_long", (2, 8))?;
    validate_ma_pair(config, "intraday_ma_short", "intraday_ma_long", (50, 200))?;
    Ok(())
}

fn validate_instance_limits(config: &dyn ConfigPort) -> Result<(), PhasetraderError> {
    if config.get_int("instance", "id", 0) < 0 {
        return Err(invalid("instance", "id", "id must be non-negative"));
    }
    if config.get_int("instance", "execution_minutes", 15) < 1 {
        return Err(invalid(
            "instance",
            "execution_minutes",
            "execution_minutes must be at least 1",
        ));
    }
    let longest = config
        .get_int("indicators", "intraday_ma_long", 200)
        .max(config.get_int("indicators", "atr_period", 20))
        .max(25);
    if config.get_int("instance", "capacity", 500) < longest {
        return Err(invalid(
            "instance",
            "capacity",
            format!("capacity must hold at least {longest} bars"),
        ));
    }
    if config.get_int("instance", "max_rate_errors", 5) < 0 {
        return Err(invalid(
            "instance",
            "max_rate_errors",
            "max_rate_errors must be non-negative",
        ));
    }
    if !(0..=23).contains(&config.get_int("instance", "range_stop_hour", 22)) {
        return Err(invalid(
            "instance",
            "range_stop_hour",
            "range_stop_hour must be between 0 and 23",
        ));
    }
    Ok(())
}

fn validate_broker(config: &dyn ConfigPort) -> Result<(), PhasetraderError> {
    if config.get_double("broker", "adjust_points", 0.0) < 0.0 {
        return Err(invalid("broker", "adjust_points", "adjust_points must be non-negative"));
    }
    if config.get_double("account", "virtual_balance_topup", 0.0) < 0.0 {
        return Err(invalid(
            "account",
            "virtual_balance_topup",
            "virtual_balance_topup must be non-negative",
        ));
    }
    Ok(())
}

fn validate_policy(config: &dyn ConfigPort, symbol: &str) -> Result<(), PhasetraderError> {
    let policy = SymbolPolicy::from_port(config, symbol);
    let section = format!("policy.{symbol}");
    for (key, value) in [
        ("min_lot", policy.min_lot),
        ("lot_step", policy.lot_step),
        ("value_per_point", policy.value_per_point),
        ("risk_multiplier", policy.risk_multiplier),
    ] {
        if !(value > 0.0 && value.is_finite()) {
            return Err(invalid(&section, key, format!("{key} must be positive")));
        }
    }
    if policy.start_hour > 23 {
        return Err(invalid(&section, "start_hour", "start_hour must be between 0 and 23"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const MODES: [u32; 3] = [0, 4, 10];

    fn adapter(extra: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(&format!("[instance]\nsymbol = EURUSD\n{extra}")).unwrap()
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(validate_engine_config(&adapter(""), &MODES).is_ok());
    }

    #[test]
    fn missing_symbol() {
        let a = FileConfigAdapter::from_string("[instance]\nmode = 0\n").unwrap();
        let err = validate_engine_config(&a, &MODES).unwrap_err();
        assert!(matches!(err, PhasetraderError::ConfigMissing { .. }));
    }

    #[test]
    fn unknown_mode_rejected() {
        let err = validate_engine_config(&adapter("mode = 77\n"), &MODES).unwrap_err();
        match err {
            PhasetraderError::ConfigInvalid { key, .. } => assert_eq!(key, "mode"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn macro_trend_against_one_side_is_invalid_configuration() {
        let a = adapter("[risk]\nmacro_trend = 1\none_side = -1\n");
        let err = validate_engine_config(&a, &MODES).unwrap_err();
        assert!(matches!(err, PhasetraderError::InvalidConfiguration { .. }));

        let agreeing = adapter("[risk]\nmacro_trend = -1\none_side = -1\n");
        assert!(validate_engine_config(&agreeing, &MODES).is_ok());
    }

    #[test]
    fn non_positive_risk_rejected() {
        assert!(validate_engine_config(&adapter("[risk]\nrisk = 0\n"), &MODES).is_err());
        assert!(
            validate_engine_config(&adapter("[risk]\nmax_account_risk = -1\n"), &MODES).is_err()
        );
    }

    #[test]
    fn ma_periods_must_be_ordered() {
        let a = adapter("[indicators]\ndaily_ma_short = 8\ndaily_ma_long = 2\n");
        assert!(validate_engine_config(&a, &MODES).is_err());
    }

    #[test]
    fn unknown_smoothing_rejected() {
        let a = adapter("[indicators]\natr_smoothing = exponential\n");
        assert!(validate_engine_config(&a, &MODES).is_err());
    }

    #[test]
    fn capacity_must_cover_longest_lookback() {
        assert!(validate_engine_config(&adapter("capacity = 100\n"), &MODES).is_err());
        assert!(validate_engine_config(&adapter("capacity = 250\n"), &MODES).is_ok());
    }

    #[test]
    fn bad_policy_lot_step() {
        let a = adapter("[policy.EURUSD]\nlot_step = 0\n");
        assert!(validate_engine_config(&a, &MODES).is_err());
    }
}
