//! Catalog types: shifts, time slots, add-ons, and seating areas.
//!
//! These are the typed records every other module consumes. They are built
//! from the remote service's loosely-typed payloads at the boundary in
//! [`crate::wire`]; nothing past that boundary sees raw JSON.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Identifier for an add-on, issued by the remote booking service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddonId(pub String);

impl std::fmt::Display for AddonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AddonId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// How menu add-ons for a shift (or time slot) must be selected.
///
/// The policy is read from configuration and never transitions; each slot is
/// in exactly one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsagePolicy {
    /// Code 0: no menu item may be selected.
    None,
    /// Code 1: selecting a menu item replaces the entire menu selection.
    Single,
    /// Code 2: per-item quantities; the total must equal the party size.
    Quantity,
    /// Code 3: optional checkbox multi-select, capped by `max_menu_types`
    /// and party size.
    OptionalMulti,
    /// Code 4: per-item quantities; the total must not exceed the party
    /// size, zero is fine.
    OptionalQuantity,
}

impl UsagePolicy {
    /// Decode the wire integer. Unknown codes yield `None`.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Single),
            2 => Some(Self::Quantity),
            3 => Some(Self::OptionalMulti),
            4 => Some(Self::OptionalQuantity),
            _ => None,
        }
    }

    /// Policies where menu entries carry explicit quantities.
    #[must_use]
    pub const fn is_quantity_based(self) -> bool {
        matches!(self, Self::Quantity | Self::OptionalQuantity)
    }
}

/// Whether an add-on is a menu or an option attached to a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddonKind {
    /// A menu item, governed by the shift's usage policy.
    Menu,
    /// An option, gated by its parent menu's selection state.
    Option,
}

/// The per-unit pricing basis of an add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerBasis {
    /// Priced per guest; multiplied by the party size unless the usage
    /// policy is quantity-based (the quantity *is* the guest allocation).
    Guest,
    /// Priced per selected item.
    Item,
    /// Priced per some named unit (bottle, table, ...); treated like
    /// [`PerBasis::Item`] for arithmetic.
    Unit(String),
}

/// An option's link to its parent menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentLink {
    /// Selectable regardless of the menu selection.
    Unlinked,
    /// Selectable only while the n-th `Menu` add-on of the slot's catalog
    /// (0-based, counting menus only) is selected.
    Menu(usize),
}

/// A selectable menu or option item attached to a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    /// Unique id issued by the remote service.
    pub id: AddonId,
    /// Menu or Option.
    pub kind: AddonKind,
    /// Display name.
    pub name: String,
    /// Unit price in minor currency units.
    pub price: Money,
    /// Per-unit pricing basis.
    pub per: PerBasis,
    /// Minimum applicable party size (0 = no bound). Visibility only.
    pub min_covers: u32,
    /// Maximum applicable party size (0 = no bound). Visibility only.
    pub max_covers: u32,
    /// Minimum selectable quantity (options; 0 treated as 1).
    pub min_quantity: u32,
    /// Maximum selectable quantity (options; 0 = no bound).
    pub max_quantity: u32,
    /// Parent linkage (options only; menus are always `Unlinked`).
    pub parent: ParentLink,
}

impl Addon {
    /// Whether this add-on is visible for the given party size.
    #[must_use]
    pub const fn visible_for(&self, covers: u32) -> bool {
        (self.min_covers == 0 || covers >= self.min_covers)
            && (self.max_covers == 0 || covers <= self.max_covers)
    }
}

/// Distinguishes regular service periods from special events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftKind {
    /// A regular service period (lunch, dinner, ...).
    Standard,
    /// A special event; its times are restricted to those offered by the
    /// day's non-event shifts.
    Event,
}

/// A bookable time within a shift. Slots may override the shift's add-on
/// catalog and usage policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Service-defined time encoding; negative values are blocked and are
    /// filtered out at the wire boundary.
    pub time: i32,
    /// Usage policy override for this slot.
    pub usage: Option<UsagePolicy>,
    /// Add-on catalog override for this slot.
    pub addons: Option<Vec<Addon>>,
}

/// A service period with its add-on catalog and usage policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    /// Unique id issued by the remote service.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Regular shift or special event.
    pub kind: ShiftKind,
    /// Menu usage policy for the shift.
    pub usage: UsagePolicy,
    /// Cap on distinct menu types selectable (`None` = no cap).
    pub max_menu_types: Option<u32>,
    /// Whether the shift requires a deposit / no-show card; the hold's card
    /// code is authoritative, this only drives UI hints.
    pub charge: bool,
    /// Ordered add-on catalog.
    pub addons: Vec<Addon>,
    /// Bookable times for the day being viewed.
    pub times: Vec<TimeSlot>,
    /// Optional message from the service (sold-out notes etc.).
    pub message: Option<String>,
}

impl Shift {
    /// Resolve the effective selection context for one of this shift's
    /// slots, applying slot-level overrides.
    #[must_use]
    pub fn context_for(&self, slot: &TimeSlot) -> SelectionContext {
        SelectionContext {
            usage: slot.usage.unwrap_or(self.usage),
            max_menu_types: self.max_menu_types.filter(|cap| *cap > 0),
            addons: slot.addons.clone().unwrap_or_else(|| self.addons.clone()),
        }
    }

    /// Find a slot by its time value.
    #[must_use]
    pub fn slot_at(&self, time: i32) -> Option<&TimeSlot> {
        self.times.iter().find(|slot| slot.time == time)
    }
}

/// The inputs the constraint engine reads for one shift/slot: effective
/// usage policy, distinct-menu-type cap, and the add-on catalog in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionContext {
    /// Effective usage policy.
    pub usage: UsagePolicy,
    /// Distinct-menu-type cap, already normalized (`Some` implies > 0).
    pub max_menu_types: Option<u32>,
    /// Effective ordered add-on catalog.
    pub addons: Vec<Addon>,
}

impl SelectionContext {
    /// Look up an add-on by id.
    #[must_use]
    pub fn addon(&self, id: &AddonId) -> Option<&Addon> {
        self.addons.iter().find(|addon| &addon.id == id)
    }

    /// The n-th `Menu` add-on (counting menus only), used to resolve
    /// [`ParentLink::Menu`] ordinals.
    #[must_use]
    pub fn menu_at_ordinal(&self, ordinal: usize) -> Option<&Addon> {
        self.addons
            .iter()
            .filter(|addon| addon.kind == AddonKind::Menu)
            .nth(ordinal)
    }

    /// Add-ons visible for the given party size, in catalog order.
    pub fn visible_addons(&self, covers: u32) -> impl Iterator<Item = &Addon> {
        self.addons.iter().filter(move |addon| addon.visible_for(covers))
    }
}

/// A seating area offered for the selected day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatingArea {
    /// Area id, sent back on hold requests.
    pub id: String,
    /// Display name.
    pub name: String,
}
