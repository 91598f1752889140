//! Balance snapshot types.
//!
//! A snapshot maps portfolio identifiers to per-currency amounts. It is
//! replaced atomically on every inbound balance frame, never merged
//! field-by-field.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest balance-by-portfolio state for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceSnapshot {
    portfolios: HashMap<String, HashMap<String, Decimal>>,
}

impl BalanceSnapshot {
    /// Build a snapshot from a portfolio -> currency -> amount mapping.
    pub fn new(portfolios: HashMap<String, HashMap<String, Decimal>>) -> Self {
        Self { portfolios }
    }

    /// Per-currency balances for a portfolio.
    pub fn portfolio(&self, portfolio_id: &str) -> Option<&HashMap<String, Decimal>> {
        self.portfolios.get(portfolio_id)
    }

    /// Amount held in one currency of one portfolio.
    pub fn amount(&self, portfolio_id: &str, currency: &str) -> Option<Decimal> {
        self.portfolios.get(portfolio_id)?.get(currency).copied()
    }

    /// All known portfolio identifiers.
    pub fn portfolio_ids(&self) -> impl Iterator<Item = &str> {
        self.portfolios.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }
}
