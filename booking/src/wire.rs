//! Wire formats of the remote booking service.
//!
//! The service speaks a loosely-typed dialect: ids arrive as strings or
//! numbers, times as bare integers or objects, and most fields are
//! optional. Everything is normalized here into the typed catalog records;
//! the raw payload never flows past this module.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::availability::{sanitize_shifts, DayAvailability, MonthAvailability};
use crate::catalog::{
    Addon, AddonId, AddonKind, ParentLink, PerBasis, SeatingArea, Shift, ShiftKind, TimeSlot,
    UsagePolicy,
};
use crate::money::Money;
use crate::providers::{CardRequirement, Hold};
use crate::selection::SelectionState;

/// An id that may arrive as a JSON string or number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdDto {
    /// String form.
    Text(String),
    /// Numeric form, stringified on conversion.
    Number(i64),
}

impl IdDto {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// A time entry: bare integer or object with per-slot overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimeEntryDto {
    /// Bare time value.
    Bare(i32),
    /// Object form with optional overrides.
    Detailed {
        /// The time value.
        time: i32,
        /// Usage-policy override code.
        #[serde(default)]
        usage: Option<i64>,
        /// Add-on catalog override.
        #[serde(default)]
        addons: Option<Vec<AddonDto>>,
    },
}

/// Raw add-on record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonDto {
    /// Id, string or number.
    pub uid: IdDto,
    /// "Menu" or "Option"; anything else is treated as a menu.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Price in minor units; negative values are clamped to zero.
    #[serde(default)]
    pub price: i64,
    /// Per-unit basis name; missing means per item.
    #[serde(default)]
    pub per: Option<String>,
    /// Minimum applicable party size.
    #[serde(default)]
    pub min_covers: u32,
    /// Maximum applicable party size.
    #[serde(default)]
    pub max_covers: u32,
    /// Minimum selectable quantity.
    #[serde(default)]
    pub min_qty: u32,
    /// Maximum selectable quantity.
    #[serde(default)]
    pub max_qty: u32,
    /// Parent menu ordinal; missing or negative means unlinked.
    #[serde(default)]
    pub parent: Option<i64>,
}

impl AddonDto {
    fn into_domain(self) -> Addon {
        let kind = match self.kind.as_deref() {
            Some("Option") => AddonKind::Option,
            _ => AddonKind::Menu,
        };
        let parent = match (kind, self.parent) {
            (AddonKind::Option, Some(ordinal)) if ordinal >= 0 => {
                ParentLink::Menu(usize::try_from(ordinal).unwrap_or(usize::MAX))
            }
            _ => ParentLink::Unlinked,
        };
        let per = match self.per.as_deref() {
            None | Some("") | Some("Item") => PerBasis::Item,
            Some("Guest") => PerBasis::Guest,
            Some(unit) => PerBasis::Unit(unit.to_owned()),
        };
        Addon {
            id: AddonId(self.uid.into_string()),
            kind,
            name: self.name.unwrap_or_default(),
            price: Money::from_minor(u64::try_from(self.price).unwrap_or(0)),
            per,
            min_covers: self.min_covers,
            max_covers: self.max_covers,
            min_quantity: self.min_qty,
            max_quantity: self.max_qty,
            parent,
        }
    }
}

/// Raw shift record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDto {
    /// Id, string or number.
    pub uid: IdDto,
    /// "Event" marks a special event; anything else is a regular shift.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Usage-policy code; unknown codes fail closed to 0.
    #[serde(default)]
    pub usage: i64,
    /// Deposit/charge hint.
    #[serde(default)]
    pub charge: bool,
    /// Distinct-menu-type cap; 0 or missing means uncapped.
    #[serde(default)]
    pub max_menu_types: i64,
    /// Add-on catalog.
    #[serde(default)]
    pub addons: Vec<AddonDto>,
    /// Bookable times.
    #[serde(default)]
    pub times: Vec<TimeEntryDto>,
    /// Service message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ShiftDto {
    fn into_domain(self) -> Shift {
        let usage = UsagePolicy::from_code(self.usage).unwrap_or_else(|| {
            warn!(code = self.usage, "unknown usage policy code, treating as none");
            UsagePolicy::None
        });
        let times = self
            .times
            .into_iter()
            .map(|entry| match entry {
                TimeEntryDto::Bare(time) => TimeSlot {
                    time,
                    usage: None,
                    addons: None,
                },
                TimeEntryDto::Detailed {
                    time,
                    usage,
                    addons,
                } => TimeSlot {
                    time,
                    usage: usage.and_then(UsagePolicy::from_code),
                    addons: addons
                        .map(|list| list.into_iter().map(AddonDto::into_domain).collect()),
                },
            })
            .collect();
        Shift {
            id: self.uid.into_string(),
            name: self.name.unwrap_or_default(),
            kind: match self.kind.as_deref() {
                Some("Event") => ShiftKind::Event,
                _ => ShiftKind::Standard,
            },
            usage,
            max_menu_types: u32::try_from(self.max_menu_types).ok().filter(|cap| *cap > 0),
            charge: self.charge,
            addons: self.addons.into_iter().map(AddonDto::into_domain).collect(),
            times,
            message: self.message,
        }
    }
}

/// Raw seating-area record.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaDto {
    /// Id, string or number.
    pub uid: IdDto,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Raw day-availability payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DayAvailabilityDto {
    /// Open shifts.
    #[serde(default)]
    pub shifts: Vec<ShiftDto>,
    /// Seating areas offered.
    #[serde(default)]
    pub areas: Vec<AreaDto>,
    /// Service message.
    #[serde(default)]
    pub message: Option<String>,
}

impl DayAvailabilityDto {
    /// Normalize into the typed day record, sanitizing the slot lists.
    #[must_use]
    pub fn into_domain(self) -> DayAvailability {
        DayAvailability {
            shifts: sanitize_shifts(self.shifts.into_iter().map(ShiftDto::into_domain).collect()),
            areas: self
                .areas
                .into_iter()
                .map(|area| SeatingArea {
                    id: area.uid.into_string(),
                    name: area.name.unwrap_or_default(),
                })
                .collect(),
            message: self.message,
        }
    }
}

/// One day in a month-availability payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MonthDayDto {
    /// The calendar date.
    pub date: NaiveDate,
    /// Primary slot list; a day is closed when it is empty.
    #[serde(default)]
    pub times: Vec<serde_json::Value>,
}

/// Raw month-availability payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MonthAvailabilityDto {
    /// Per-day entries.
    #[serde(default)]
    pub days: Vec<MonthDayDto>,
}

impl MonthAvailabilityDto {
    /// Normalize into the list of closed dates.
    #[must_use]
    pub fn into_domain(self) -> MonthAvailability {
        MonthAvailability {
            closed_dates: self
                .days
                .into_iter()
                .filter(|day| day.times.is_empty())
                .map(|day| day.date)
                .collect(),
        }
    }
}

/// Raw hold payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldDto {
    /// Hold id, string or number.
    pub uid: IdDto,
    /// Creation time, Unix seconds.
    #[serde(default)]
    pub created: i64,
    /// Card requirement code (0 none, 1 no-show protection, 2 deposit).
    #[serde(default)]
    pub card: i64,
    /// Per-head charge amount in minor units.
    #[serde(default)]
    pub per_head: i64,
}

impl HoldDto {
    /// Normalize into a typed [`Hold`].
    #[must_use]
    pub fn into_domain(self) -> Hold {
        let card = match self.card {
            1 => CardRequirement::NoShowProtection,
            2 => CardRequirement::Deposit,
            0 => CardRequirement::None,
            other => {
                warn!(code = other, "unknown card requirement code, treating as none");
                CardRequirement::None
            }
        };
        Hold {
            id: self.uid.into_string(),
            created_at: DateTime::<Utc>::from_timestamp(self.created, 0)
                .unwrap_or_else(Utc::now),
            card,
            per_head: Money::from_minor(u64::try_from(self.per_head).unwrap_or(0)),
        }
    }
}

/// Encode a selection for the wire: comma-separated `uid` or `uid:qty`
/// tokens, menus in insertion order followed by options.
#[must_use]
pub fn encode_addons(state: &SelectionState) -> String {
    let mut tokens = Vec::with_capacity(state.menus.len() + state.options.len());
    for entry in &state.menus {
        tokens.push(token(&entry.id.0, entry.effective_quantity()));
    }
    for (id, quantity) in &state.options {
        tokens.push(token(&id.0, *quantity));
    }
    tokens.join(",")
}

fn token(uid: &str, quantity: u32) -> String {
    if quantity == 1 {
        uid.to_owned()
    } else {
        format!("{uid}:{quantity}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::selection::MenuEntry;

    #[test]
    fn day_payload_with_mixed_shapes_parses() {
        let payload = serde_json::json!({
            "shifts": [{
                "uid": 7,
                "name": "Dinner",
                "usage": 2,
                "maxMenuTypes": 2,
                "addons": [
                    {"uid": "m1", "type": "Menu", "name": "Tasting", "price": 4500, "per": "Guest"},
                    {"uid": 12, "type": "Option", "name": "Pairing", "price": 2500, "parent": 0, "maxQty": 4}
                ],
                "times": [1800, {"time": 1930, "usage": 1}, -2000]
            }],
            "areas": [{"uid": 3, "name": "Terrace"}]
        });
        let day: DayAvailability =
            serde_json::from_value::<DayAvailabilityDto>(payload).unwrap().into_domain();

        let shift = &day.shifts[0];
        assert_eq!(shift.id, "7");
        assert_eq!(shift.usage, UsagePolicy::Quantity);
        assert_eq!(shift.max_menu_types, Some(2));
        assert_eq!(shift.addons[0].per, PerBasis::Guest);
        assert_eq!(shift.addons[1].kind, AddonKind::Option);
        assert_eq!(shift.addons[1].parent, ParentLink::Menu(0));
        // Negative time dropped, object form keeps its override.
        assert_eq!(shift.times.len(), 2);
        assert_eq!(shift.times[1].usage, Some(UsagePolicy::Single));
        assert_eq!(day.areas[0].id, "3");
    }

    #[test]
    fn unknown_usage_code_fails_closed() {
        let payload = serde_json::json!({"shifts": [{"uid": "s", "usage": 9}]});
        let day = serde_json::from_value::<DayAvailabilityDto>(payload)
            .unwrap()
            .into_domain();
        assert_eq!(day.shifts[0].usage, UsagePolicy::None);
    }

    #[test]
    fn month_payload_marks_empty_days_closed() {
        let payload = serde_json::json!({
            "days": [
                {"date": "2025-06-14", "times": [1800]},
                {"date": "2025-06-15", "times": []},
                {"date": "2025-06-16"}
            ]
        });
        let month = serde_json::from_value::<MonthAvailabilityDto>(payload)
            .unwrap()
            .into_domain();
        assert_eq!(
            month.closed_dates,
            vec!["2025-06-15".parse().unwrap(), "2025-06-16".parse().unwrap()]
        );
    }

    #[test]
    fn hold_payload_normalizes_card_codes() {
        let payload = serde_json::json!({"uid": 99, "created": 1_748_779_200, "card": 2, "perHead": 2000});
        let hold = serde_json::from_value::<HoldDto>(payload).unwrap().into_domain();
        assert_eq!(hold.id, "99");
        assert_eq!(hold.card, CardRequirement::Deposit);
        assert_eq!(hold.per_head, Money::from_minor(2000));
    }

    #[test]
    fn addon_encoding_is_menus_then_options_with_implicit_one() {
        let mut state = SelectionState {
            menus: vec![
                MenuEntry {
                    id: "m1".into(),
                    quantity: Some(3),
                },
                MenuEntry {
                    id: "m2".into(),
                    quantity: None,
                },
            ],
            options: std::collections::BTreeMap::new(),
        };
        state.options.insert("opt".into(), 2);
        assert_eq!(encode_addons(&state), "m1:3,m2,opt:2");
    }
}
