// Schedule expressions are plain interval strings (`"30s"`, `"5m"`, `"1h"`,
// `"1d"`) rather than full cron syntax — connectors re-sync on a fixed
// cadence, not at calendar-specific times.

use anyhow::{bail, Result};
use std::time::Duration;

pub fn parse_schedule_expression(expr: &str) -> Result<Duration> {
    let expr = expr.trim();
    if expr.is_empty() {
        bail!("empty schedule expression");
    }
    let (digits, unit) = expr.split_at(expr.len() - 1);
    let Ok(amount) = digits.parse::<u64>() else {
        bail!("invalid schedule expression: {expr}");
    };
    let secs = match unit {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        _ => bail!("unknown schedule unit in {expr} (expected s/m/h/d)"),
    };
    if secs == 0 {
        bail!("schedule interval must be positive: {expr}");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_schedule_expression("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_schedule_expression("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_schedule_expression("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_schedule_expression("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_unknown_units_and_zero() {
        assert!(parse_schedule_expression("5x").is_err());
        assert!(parse_schedule_expression("0s").is_err());
        assert!(parse_schedule_expression("").is_err());
    }
}
