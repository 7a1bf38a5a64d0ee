//! Add-on selection constraint engine.
//!
//! Pure functions over [`SelectionState`]: every mutation either yields an
//! accepted new state or a [`SelectionRejection`] with the old state left
//! untouched. Option quantities are never a rejection path; they are clamped
//! and repaired in place (see [`reclamp_options`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Addon, AddonId, AddonKind, ParentLink, SelectionContext, UsagePolicy};

/// One selected menu item.
///
/// Under [`UsagePolicy::Single`] and [`UsagePolicy::OptionalMulti`] the
/// quantity is `None` (implicit 1). Under the quantity policies it is
/// `Some(q)` with `q >= 1`; zero-quantity entries are removed, never kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    /// The selected menu add-on.
    pub id: AddonId,
    /// Explicit quantity under quantity-based policies.
    pub quantity: Option<u32>,
}

impl MenuEntry {
    /// The quantity this entry contributes, treating the implicit
    /// single-select case as 1.
    #[must_use]
    pub const fn effective_quantity(&self) -> u32 {
        match self.quantity {
            Some(q) => q,
            None => 1,
        }
    }
}

/// The current add-on selection for one shift/time slot.
///
/// Reset whenever the chosen time slot changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionState {
    /// Selected menus in insertion order.
    pub menus: Vec<MenuEntry>,
    /// Selected options with their quantities.
    pub options: BTreeMap<AddonId, u32>,
}

impl SelectionState {
    /// An empty selection.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the menu with the given id is currently selected.
    #[must_use]
    pub fn is_menu_selected(&self, id: &AddonId) -> bool {
        self.menus.iter().any(|entry| &entry.id == id)
    }

    /// The selected quantity for a menu id (0 when not selected).
    #[must_use]
    pub fn menu_quantity(&self, id: &AddonId) -> u32 {
        self.menus
            .iter()
            .find(|entry| &entry.id == id)
            .map_or(0, MenuEntry::effective_quantity)
    }

    /// Sum of all menu quantities.
    #[must_use]
    pub fn total_menu_quantity(&self) -> u32 {
        self.menus
            .iter()
            .map(MenuEntry::effective_quantity)
            .sum()
    }

    /// Number of distinct selected menu items.
    #[must_use]
    pub fn distinct_menu_count(&self) -> usize {
        self.menus.len()
    }
}

/// A proposed change to the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMutation {
    /// Pick a menu item: replace-select under [`UsagePolicy::Single`],
    /// toggle under [`UsagePolicy::OptionalMulti`], increment by one under
    /// the quantity policies.
    PickMenu(AddonId),
    /// Set a menu quantity under the quantity policies. Zero removes the
    /// entry. Under single/multi policies a non-zero quantity behaves like
    /// [`SelectionMutation::PickMenu`] on an unselected item and zero
    /// deselects.
    SetMenuQuantity(AddonId, u32),
    /// Set an option quantity. Zero removes. Never rejected: the quantity
    /// is clamped to the option's bounds, the party size, and the parent
    /// menu's quantity.
    SetOptionQuantity(AddonId, u32),
}

/// Why a proposed menu mutation was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum SelectionRejection {
    /// Usage policy 0: the shift offers no selectable menus.
    #[error("menus are not available for this time")]
    MenusNotAvailable,
    /// The referenced add-on is not in the slot's catalog.
    #[error("unknown add-on {0}")]
    UnknownAddon(AddonId),
    /// A menu mutation referenced an option, or vice versa.
    #[error("add-on {0} is not of the expected kind")]
    WrongKind(AddonId),
    /// Accepting the mutation would push the menu quantity total past the
    /// party size.
    #[error("selection would exceed the party size")]
    PartySizeExceeded,
    /// Accepting the mutation would exceed the configured distinct
    /// menu-type cap.
    #[error("maximum number of menu types exceeded")]
    MaxMenuTypesExceeded,
}

/// Why a selection is not yet complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncompleteReason {
    /// Single-select policy with no menu chosen yet.
    MenuRequired,
    /// Exact-quantity policy: the total does not match the party size.
    QuantityMismatch {
        /// Current menu quantity total.
        selected: u32,
        /// The party size the total must reach.
        required: u32,
    },
    /// Exact-quantity policy with party size 0: nothing selected yet.
    NoUnitsSelected,
    /// An option is selected while its required parent menu is not.
    OrphanOption(AddonId),
}

/// Verdict of the completion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// The selection satisfies the slot's policy; "proceed" may be offered.
    Complete,
    /// Not yet bookable, with the first blocking reason.
    Incomplete(IncompleteReason),
}

impl Completion {
    /// Whether the verdict is [`Completion::Complete`].
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Apply a mutation, producing the accepted new state or a rejection.
///
/// Accepted menu mutations re-clamp all option quantities before returning,
/// so the returned state never contains an option above its parent's
/// quantity or an orphan whose parent was just deselected.
///
/// # Errors
///
/// Returns a [`SelectionRejection`] when the mutation violates the slot's
/// usage policy. Option mutations never fail.
pub fn apply(
    ctx: &SelectionContext,
    covers: u32,
    state: &SelectionState,
    mutation: SelectionMutation,
) -> Result<SelectionState, SelectionRejection> {
    match mutation {
        SelectionMutation::PickMenu(id) => match ctx.usage {
            UsagePolicy::None => Err(SelectionRejection::MenusNotAvailable),
            UsagePolicy::Single => select_single(ctx, covers, state, &id),
            UsagePolicy::OptionalMulti => toggle_multi(ctx, covers, state, &id),
            UsagePolicy::Quantity | UsagePolicy::OptionalQuantity => {
                let next = state.menu_quantity(&id).saturating_add(1);
                set_menu_quantity(ctx, covers, state, &id, next)
            }
        },
        SelectionMutation::SetMenuQuantity(id, quantity) => match ctx.usage {
            UsagePolicy::None => Err(SelectionRejection::MenusNotAvailable),
            UsagePolicy::Quantity | UsagePolicy::OptionalQuantity => {
                set_menu_quantity(ctx, covers, state, &id, quantity)
            }
            UsagePolicy::Single => {
                if quantity == 0 {
                    let mut next = state.clone();
                    next.menus.retain(|entry| entry.id != id);
                    Ok(reclamp_options(ctx, covers, next))
                } else {
                    select_single(ctx, covers, state, &id)
                }
            }
            UsagePolicy::OptionalMulti => {
                if state.is_menu_selected(&id) == (quantity > 0) {
                    Ok(state.clone())
                } else {
                    toggle_multi(ctx, covers, state, &id)
                }
            }
        },
        SelectionMutation::SetOptionQuantity(id, quantity) => {
            Ok(set_option_quantity(ctx, covers, state, &id, quantity))
        }
    }
}

/// Policy 1: selecting a menu replaces the entire menu selection.
///
/// # Errors
///
/// Returns [`SelectionRejection::UnknownAddon`] or
/// [`SelectionRejection::WrongKind`] when the id does not resolve to a menu
/// in the slot's catalog.
pub fn select_single(
    ctx: &SelectionContext,
    covers: u32,
    state: &SelectionState,
    id: &AddonId,
) -> Result<SelectionState, SelectionRejection> {
    resolve_menu(ctx, id)?;
    let mut next = state.clone();
    next.menus = vec![MenuEntry {
        id: id.clone(),
        quantity: None,
    }];
    Ok(reclamp_options(ctx, covers, next))
}

/// Policy 3: toggle a checkbox-style optional menu.
///
/// # Errors
///
/// Selecting a new item is rejected with
/// [`SelectionRejection::MaxMenuTypesExceeded`] when the distinct count has
/// reached the effective cap (the lower of `max_menu_types` and the party
/// size, each ignored when unset/zero). Deselection always succeeds.
pub fn toggle_multi(
    ctx: &SelectionContext,
    covers: u32,
    state: &SelectionState,
    id: &AddonId,
) -> Result<SelectionState, SelectionRejection> {
    resolve_menu(ctx, id)?;
    let mut next = state.clone();
    if next.is_menu_selected(id) {
        next.menus.retain(|entry| &entry.id != id);
        return Ok(reclamp_options(ctx, covers, next));
    }

    let selected = next.distinct_menu_count() as u32;
    if let Some(cap) = ctx.max_menu_types {
        if selected >= cap {
            return Err(SelectionRejection::MaxMenuTypesExceeded);
        }
    }
    if covers > 0 && selected >= covers {
        return Err(SelectionRejection::PartySizeExceeded);
    }

    next.menus.push(MenuEntry {
        id: id.clone(),
        quantity: None,
    });
    Ok(reclamp_options(ctx, covers, next))
}

/// Policies 2 and 4: set the absolute quantity of a menu item.
///
/// Zero removes the entry. A non-zero target is accepted only if the new
/// quantity total stays within the party size, and, when the item is newly
/// selected, the distinct-type cap has room.
///
/// # Errors
///
/// Returns [`SelectionRejection::PartySizeExceeded`] or
/// [`SelectionRejection::MaxMenuTypesExceeded`] when either bound would be
/// violated, and lookup errors as in [`select_single`].
pub fn set_menu_quantity(
    ctx: &SelectionContext,
    covers: u32,
    state: &SelectionState,
    id: &AddonId,
    quantity: u32,
) -> Result<SelectionState, SelectionRejection> {
    resolve_menu(ctx, id)?;
    let mut next = state.clone();

    if quantity == 0 {
        next.menus.retain(|entry| &entry.id != id);
        return Ok(reclamp_options(ctx, covers, next));
    }

    let current = next.menu_quantity(id);
    let new_total = next.total_menu_quantity() - current + quantity;
    if covers > 0 && new_total > covers {
        return Err(SelectionRejection::PartySizeExceeded);
    }
    if current == 0 {
        if let Some(cap) = ctx.max_menu_types {
            if next.distinct_menu_count() as u32 >= cap {
                return Err(SelectionRejection::MaxMenuTypesExceeded);
            }
        }
    }

    if let Some(entry) = next.menus.iter_mut().find(|entry| &entry.id == id) {
        entry.quantity = Some(quantity);
    } else {
        next.menus.push(MenuEntry {
            id: id.clone(),
            quantity: Some(quantity),
        });
    }
    Ok(reclamp_options(ctx, covers, next))
}

/// Set an option quantity, clamping instead of rejecting.
///
/// The target is clamped to the option's configured maximum, the party size
/// (when > 0), and the parent menu's effective quantity (0 when the parent
/// is not selected). A clamped value below the option's minimum removes the
/// option entirely.
#[must_use]
pub fn set_option_quantity(
    ctx: &SelectionContext,
    covers: u32,
    state: &SelectionState,
    id: &AddonId,
    quantity: u32,
) -> SelectionState {
    let mut next = state.clone();
    let Some(addon) = ctx.addon(id).filter(|a| a.kind == AddonKind::Option) else {
        debug!(addon = %id, "ignoring quantity for unknown option");
        return next;
    };

    let clamped = clamp_option_quantity(ctx, covers, &next, addon, quantity);
    if clamped == 0 {
        next.options.remove(id);
    } else {
        next.options.insert(id.clone(), clamped);
    }
    next
}

/// Re-clamp every selected option after a menu or party-size change.
///
/// Options whose clamp drops below their minimum are removed rather than
/// stored out of bounds. Removal is logged, not surfaced as an error.
#[must_use]
pub fn reclamp_options(ctx: &SelectionContext, covers: u32, mut state: SelectionState) -> SelectionState {
    let selected: Vec<(AddonId, u32)> = state
        .options
        .iter()
        .map(|(id, qty)| (id.clone(), *qty))
        .collect();

    for (id, qty) in selected {
        let Some(addon) = ctx.addon(&id).filter(|a| a.kind == AddonKind::Option) else {
            debug!(addon = %id, "dropping option no longer in catalog");
            state.options.remove(&id);
            continue;
        };
        let clamped = clamp_option_quantity(ctx, covers, &state, addon, qty);
        if clamped == 0 {
            debug!(addon = %id, had = qty, "removing option after clamp");
            state.options.remove(&id);
        } else if clamped != qty {
            debug!(addon = %id, had = qty, now = clamped, "clamping option quantity");
            state.options.insert(id, clamped);
        }
    }
    state
}

fn clamp_option_quantity(
    ctx: &SelectionContext,
    covers: u32,
    state: &SelectionState,
    addon: &Addon,
    quantity: u32,
) -> u32 {
    let mut cap = u32::MAX;
    if addon.max_quantity > 0 {
        cap = cap.min(addon.max_quantity);
    }
    if covers > 0 {
        cap = cap.min(covers);
    }
    if let ParentLink::Menu(ordinal) = addon.parent {
        let parent_quantity = ctx
            .menu_at_ordinal(ordinal)
            .map_or(0, |parent| state.menu_quantity(&parent.id));
        cap = cap.min(parent_quantity);
    }

    let clamped = quantity.min(cap);
    let minimum = addon.min_quantity.max(1);
    if clamped < minimum {
        0
    } else {
        clamped
    }
}

/// The completion check: pure and deterministic in its three inputs.
///
/// Orphan options are checked first under every policy; then the
/// policy-specific rule decides whether "proceed" may be offered.
#[must_use]
pub fn completion(ctx: &SelectionContext, covers: u32, state: &SelectionState) -> Completion {
    for id in state.options.keys() {
        if let Some(addon) = ctx.addon(id) {
            if let ParentLink::Menu(ordinal) = addon.parent {
                let parent_selected = ctx
                    .menu_at_ordinal(ordinal)
                    .is_some_and(|parent| state.is_menu_selected(&parent.id));
                if !parent_selected {
                    return Completion::Incomplete(IncompleteReason::OrphanOption(id.clone()));
                }
            }
        }
    }

    match ctx.usage {
        UsagePolicy::None | UsagePolicy::OptionalMulti | UsagePolicy::OptionalQuantity => {
            Completion::Complete
        }
        UsagePolicy::Single => {
            if state.menus.is_empty() {
                Completion::Incomplete(IncompleteReason::MenuRequired)
            } else {
                Completion::Complete
            }
        }
        UsagePolicy::Quantity => {
            let total = state.total_menu_quantity();
            if covers == 0 {
                if total == 0 {
                    Completion::Incomplete(IncompleteReason::NoUnitsSelected)
                } else {
                    Completion::Complete
                }
            } else if total == covers {
                Completion::Complete
            } else {
                Completion::Incomplete(IncompleteReason::QuantityMismatch {
                    selected: total,
                    required: covers,
                })
            }
        }
    }
}

fn resolve_menu<'a>(
    ctx: &'a SelectionContext,
    id: &AddonId,
) -> Result<&'a Addon, SelectionRejection> {
    let addon = ctx
        .addon(id)
        .ok_or_else(|| SelectionRejection::UnknownAddon(id.clone()))?;
    if addon.kind != AddonKind::Menu {
        return Err(SelectionRejection::WrongKind(id.clone()));
    }
    Ok(addon)
}
