//! Human-readable arbitrage reports
//!
//! A report walks a notional amount of the first currency around the cycle,
//! one line per leg, and ends with the net gain.

use crate::core::Currency;
use crate::hot_path::detector::{ArbitrageCycle, Leg};
use std::fmt;

/// One leg with the running amount after the exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportStep {
    pub leg: Leg,
    pub amount: f64,
}

/// Formatted view of one detected cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageReport {
    path: String,
    start: Currency,
    notional: f64,
    steps: Vec<ReportStep>,
    gain: f64,
}

impl ArbitrageReport {
    /// Build a report walking `notional` units around `cycle`
    ///
    /// Returns `None` for an empty cycle.
    pub fn from_cycle(cycle: &ArbitrageCycle, notional: f64) -> Option<Self> {
        let start = cycle.currencies.first().copied()?;
        let mut amount = notional;
        let steps = cycle
            .legs
            .iter()
            .map(|leg| {
                amount *= leg.rate;
                ReportStep { leg: *leg, amount }
            })
            .collect();

        Some(Self {
            path: cycle.path_string(),
            start,
            notional,
            steps,
            gain: cycle.gain,
        })
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn steps(&self) -> &[ReportStep] {
        &self.steps
    }

    #[inline]
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Amount of the start currency after the last leg
    pub fn final_amount(&self) -> f64 {
        self.steps.last().map_or(self.notional, |s| s.amount)
    }

    pub fn profit(&self) -> f64 {
        self.final_amount() - self.notional
    }

    /// Net gain as a percentage of the notional
    pub fn gain_pct(&self) -> f64 {
        (self.gain - 1.0) * 100.0
    }

    /// Per-leg rates joined for the summary line
    pub fn rates_string(&self) -> String {
        self.steps
            .iter()
            .map(|s| format!("{}/{}={:.6}", s.leg.from, s.leg.to, s.leg.rate))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Log the report on the `arbitrage` target
    pub fn emit(&self) {
        crate::log_arbitrage!(
            tracing::Level::INFO,
            path = %self.path,
            rates = %self.rates_string(),
            gain = self.gain,
            profit = self.profit(),
            "ARBITRAGE\n{}",
            self
        );
    }
}

impl fmt::Display for ArbitrageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} gain {:.6} ({:+.4}%) rates {}",
            self.path,
            self.gain,
            self.gain_pct(),
            self.rates_string()
        )?;
        writeln!(f, "\tStart with {} {:.4}", self.start, self.notional)?;
        for step in &self.steps {
            writeln!(
                f,
                "\tExchange {} for {} at {:.6} --> {} {:.4}",
                step.leg.from, step.leg.to, step.leg.rate, step.leg.to, step.amount
            )?;
        }
        write!(
            f,
            "\tEnd with {} {:.4}, profit {:.4}",
            self.start,
            self.final_amount(),
            self.profit()
        )
    }
}
