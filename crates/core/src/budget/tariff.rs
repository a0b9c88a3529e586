use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::CatalogItem;

/// The three hourly tariff fields a catalog item may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TariffField {
    #[serde(rename = "valor_de_la_hora_equipos")]
    Equipment,
    #[serde(rename = "valor_hora_aliado_basico")]
    BasicAlly,
    #[serde(rename = "valor_hora_aliado_especializado")]
    SpecializedAlly,
}

impl TariffField {
    /// Resolution order when more than one field is populated.
    pub const PREFERENCE: [TariffField; 3] =
        [Self::SpecializedAlly, Self::BasicAlly, Self::Equipment];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Equipment => "valor_de_la_hora_equipos",
            Self::BasicAlly => "valor_hora_aliado_basico",
            Self::SpecializedAlly => "valor_hora_aliado_especializado",
        }
    }

    pub fn rate_of(self, item: &CatalogItem) -> Option<Decimal> {
        match self {
            Self::Equipment => item.equipment_rate,
            Self::BasicAlly => item.basic_ally_rate,
            Self::SpecializedAlly => item.specialized_ally_rate,
        }
    }
}

impl fmt::Display for TariffField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedTariff {
    pub field: TariffField,
    pub rate: Decimal,
}

/// First strictly positive tariff in [`TariffField::PREFERENCE`] order.
/// `None` means the item cannot be budgeted.
pub fn resolve_tariff(item: &CatalogItem) -> Option<ResolvedTariff> {
    TariffField::PREFERENCE.into_iter().find_map(|field| {
        field
            .rate_of(item)
            .filter(|rate| *rate > Decimal::ZERO)
            .map(|rate| ResolvedTariff { field, rate })
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{resolve_tariff, TariffField};
    use crate::domain::catalog::CatalogItem;

    fn item(
        equipment: Option<i64>,
        basic: Option<i64>,
        specialized: Option<i64>,
    ) -> CatalogItem {
        CatalogItem {
            category: "DIFERENCIAL".to_string(),
            equipment_rate: equipment.map(Decimal::from),
            basic_ally_rate: basic.map(Decimal::from),
            specialized_ally_rate: specialized.map(Decimal::from),
            ..CatalogItem::default()
        }
    }

    #[test]
    fn single_populated_field_is_used() {
        let resolved = resolve_tariff(&item(Some(120_000), None, None)).expect("tariff");
        assert_eq!(resolved.field, TariffField::Equipment);
        assert_eq!(resolved.rate, Decimal::from(120_000));
    }

    #[test]
    fn specialized_wins_over_basic_and_equipment() {
        let resolved =
            resolve_tariff(&item(Some(50_000), Some(80_000), Some(150_000))).expect("tariff");
        assert_eq!(resolved.field, TariffField::SpecializedAlly);

        let resolved = resolve_tariff(&item(Some(50_000), Some(80_000), Some(0))).expect("tariff");
        assert_eq!(resolved.field, TariffField::BasicAlly);
    }

    #[test]
    fn zero_and_missing_tariffs_do_not_resolve() {
        assert_eq!(resolve_tariff(&item(Some(0), None, Some(0))), None);
        assert_eq!(resolve_tariff(&item(None, None, None)), None);
    }
}
