//! Per-instrument trading parameters.
//!
//! A small built-in table covers the instruments that need non-default
//! session or contract settings; `[policy.<SYMBOL>]` config sections override
//! individual fields.

use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPolicy {
    pub symbol: String,
    /// First trading hour of the broker day.
    pub start_hour: u32,
    pub risk_multiplier: f64,
    pub min_lot: f64,
    pub lot_step: f64,
    /// Account currency per one price unit per lot.
    pub value_per_point: f64,
}

impl Default for SymbolPolicy {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            start_hour: 0,
            risk_multiplier: 1.0,
            min_lot: 0.01,
            lot_step: 0.01,
            value_per_point: 100_000.0,
        }
    }
}

/// (symbol, value per point) for the commodity instruments.
const COMMODITIES: [(&str, f64); 5] = [
    ("XAUUSD", 100.0),
    ("XAGUSD", 5_000.0),
    ("XPDUSD", 100.0),
    ("XTIUSD", 1_000.0),
    ("SpotCrude", 1_000.0),
];

impl SymbolPolicy {
    /// Built-in policy for `symbol`, or the default policy.
    pub fn builtin(symbol: &str) -> Self {
        let base = Self {
            symbol: symbol.to_string(),
            ..Self::default()
        };
        match COMMODITIES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
        {
            Some(&(_, value_per_point)) => Self {
                start_hour: 1,
                value_per_point,
                ..base
            },
            None => base,
        }
    }

    /// Built-in policy with overrides from `[policy.<symbol>]`.
    pub fn from_port(config: &dyn ConfigPort, symbol: &str) -> Self {
        let section = format!("policy.{symbol}");
        let base = Self::builtin(symbol);
        let start_hour = config.get_int(&section, "start_hour", i64::from(base.start_hour));
        Self {
            start_hour: u32::try_from(start_hour).unwrap_or(base.start_hour),
            risk_multiplier: config.get_double(&section, "risk_multiplier", base.risk_multiplier),
            min_lot: config.get_double(&section, "min_lot", base.min_lot),
            lot_step: config.get_double(&section, "lot_step", base.lot_step),
            value_per_point: config.get_double(&section, "value_per_point", base.value_per_point),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn commodities_start_an_hour_late() {
        for symbol in ["XAUUSD", "XAGUSD", "XPDUSD", "XTIUSD", "SpotCrude"] {
            let policy = SymbolPolicy::builtin(symbol);
            assert_eq!(policy.start_hour, 1, "{symbol}");
            assert!(policy.value_per_point < 100_000.0, "{symbol}");
        }
    }

    #[test]
    fn unknown_symbol_uses_default() {
        let policy = SymbolPolicy::builtin("EURUSD");
        assert_eq!(policy.symbol, "EURUSD");
        assert_eq!(policy.start_hour, 0);
        assert_eq!(policy.value_per_point, 100_000.0);
        assert_eq!(policy.min_lot, 0.01);
    }

    #[test]
    fn config_section_overrides_fields() {
        let adapter = FileConfigAdapter::from_string(
            "[policy.XAUUSD]\nmin_lot = 0.1\nlot_step = 0.1\nrisk_multiplier = 0.5\n",
        )
        .unwrap();
        let policy = SymbolPolicy::from_port(&adapter, "XAUUSD");
        assert_eq!(policy.min_lot, 0.1);
        assert_eq!(policy.lot_step, 0.1);
        assert_eq!(policy.risk_multiplier, 0.5);
        assert_eq!(policy.start_hour, 1);
        assert_eq!(policy.value_per_point, 100.0);
    }
}
