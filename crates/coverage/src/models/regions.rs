use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::models::columns::normalize_column_name;
use crate::models::coverage::CoverageResult;
use crate::models::ratio::{mean_defined, Ratio};

/// Brazilian macro-region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Norte,
    Nordeste,
    #[serde(rename = "Centro-Oeste")]
    CentroOeste,
    Sudeste,
    Sul,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Norte => "Norte",
            Region::Nordeste => "Nordeste",
            Region::CentroOeste => "Centro-Oeste",
            Region::Sudeste => "Sudeste",
            Region::Sul => "Sul",
        };
        write!(f, "{}", name)
    }
}

/// Region and representative coordinate of a DSEI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DseiLocation {
    pub region: Region,
    pub latitude: f64,
    pub longitude: f64,
}

impl DseiLocation {
    const fn new(region: Region, latitude: f64, longitude: f64) -> Self {
        Self {
            region,
            latitude,
            longitude,
        }
    }
}

const DSEI_TABLE: &[(&str, DseiLocation)] = &[
    ("ALAGOAS E SERGIPE", DseiLocation::new(Region::Nordeste, -10.9, -37.1)),
    ("ALTAMIRA", DseiLocation::new(Region::Norte, -3.2, -52.2)),
    ("ALTO RIO JURUÁ", DseiLocation::new(Region::Norte, -7.6, -72.7)),
    ("ALTO RIO NEGRO", DseiLocation::new(Region::Norte, 0.6, -65.0)),
    ("ALTO RIO SOLIMÕES", DseiLocation::new(Region::Norte, -3.5, -68.7)),
    ("AMANÃ", DseiLocation::new(Region::Norte, -2.5, -63.1)),
    ("AMAPÁ E NORTE DO PARÁ", DseiLocation::new(Region::Norte, 1.4, -52.0)),
    ("ARAGUAIA", DseiLocation::new(Region::CentroOeste, -12.0, -51.8)),
    ("BAHIA", DseiLocation::new(Region::Nordeste, -12.9, -38.5)),
    ("CEARÁ", DseiLocation::new(Region::Nordeste, -4.3, -38.9)),
    ("CUIABÁ", DseiLocation::new(Region::CentroOeste, -15.6, -56.1)),
    ("GUAMÁ-TOCANTINS", DseiLocation::new(Region::Norte, -1.7, -47.9)),
    ("INTERIOR SUL", DseiLocation::new(Region::Sul, -29.9, -50.3)),
    ("KAIAPÓ DO PARÁ", DseiLocation::new(Region::Norte, -5.3, -51.2)),
    ("KAIAPÓ DO MATO GROSSO", DseiLocation::new(Region::CentroOeste, -10.0, -53.0)),
    ("LITORAL SUL", DseiLocation::new(Region::Sul, -27.6, -48.6)),
    ("MANAUS", DseiLocation::new(Region::Norte, -3.1, -60.0)),
    ("MATO GROSSO DO SUL", DseiLocation::new(Region::CentroOeste, -20.4, -54.6)),
    ("MÉDIO RIO PURUS", DseiLocation::new(Region::Norte, -7.7, -64.9)),
    ("MÉDIO RIO SOLIMÕES E AFLUENTES", DseiLocation::new(Region::Norte, -3.6, -65.1)),
    ("MINAS GERAIS E ESPÍRITO SANTO", DseiLocation::new(Region::Sudeste, -18.8, -41.9)),
    ("PARINTINS", DseiLocation::new(Region::Norte, -2.6, -56.0)),
    ("PERNAMBUCO", DseiLocation::new(Region::Nordeste, -8.0, -34.9)),
    ("PORTO VELHO", DseiLocation::new(Region::Norte, -8.8, -63.9)),
    ("POTIGUARA", DseiLocation::new(Region::Nordeste, -6.6, -34.9)),
    ("RIO TAPAJÓS", DseiLocation::new(Region::Norte, -4.2, -55.0)),
    ("TOCANTINS", DseiLocation::new(Region::Norte, -10.2, -48.3)),
    ("VALE DO JURUA", DseiLocation::new(Region::Norte, -7.6, -72.5)),
    ("VILHENA", DseiLocation::new(Region::Norte, -12.7, -60.1)),
    ("XAVANTE", DseiLocation::new(Region::CentroOeste, -14.5, -52.2)),
    ("XINGU", DseiLocation::new(Region::CentroOeste, -11.0, -52.0)),
    ("YANOMAMI", DseiLocation::new(Region::Norte, 3.2, -64.7)),
    ("LESTE DE RORAIMA", DseiLocation::new(Region::Norte, 2.8, -60.7)),
];

/// DSEI locations keyed by normalized name, so spelling with or without
/// accents resolves to the same district
pub static DSEI_LOCATIONS: Lazy<HashMap<String, DseiLocation>> = Lazy::new(|| {
    DSEI_TABLE
        .iter()
        .map(|(name, location)| (normalize_column_name(name), *location))
        .collect()
});

/// Look up a district by name, ignoring case, accents and spacing
///
/// # Example
/// ```rust
/// use coverage::models::regions::{locate_dsei, Region};
///
/// assert_eq!(locate_dsei("Alto Rio Solimoes").unwrap().region, Region::Norte);
/// assert!(locate_dsei("ATLÂNTIDA").is_none());
/// ```
pub fn locate_dsei(name: &str) -> Option<DseiLocation> {
    DSEI_LOCATIONS.get(&normalize_column_name(name)).copied()
}

/// Mean district coverage for one region and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalMean {
    pub region: Region,
    pub period: Option<i32>,
    pub mean_coverage: Ratio,
    pub districts: usize,
}

/// Average district coverage per (region, period), sorted by region then period.
///
/// Districts with no known region are skipped and logged. Undefined coverages
/// do not count toward the mean.
pub fn regional_means(results: &[CoverageResult]) -> Vec<RegionalMean> {
    let mut buckets: HashMap<(Region, Option<i32>), Vec<Ratio>> = HashMap::new();
    for result in results {
        match locate_dsei(&result.group_key) {
            Some(location) => buckets
                .entry((location.region, result.period))
                .or_default()
                .push(result.coverage),
            None => log::warn!("No region known for DSEI '{}'", result.group_key),
        }
    }

    let mut means: Vec<RegionalMean> = buckets
        .into_iter()
        .map(|((region, period), values)| RegionalMean {
            region,
            period,
            districts: values.iter().filter(|v| v.is_defined()).count(),
            mean_coverage: mean_defined(values),
        })
        .collect();
    means.sort_by_key(|m| (m.region, m.period));
    means
}

/// A district positioned for the map layer of the presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub group_key: String,
    pub region: Region,
    pub latitude: f64,
    pub longitude: f64,
    pub prenatal: Ratio,
    pub ultrasound: Ratio,
}

/// Join prenatal and ultrasound coverage (left join on prenatal) with district
/// locations. Districts without a known location are left out.
pub fn map_points(prenatal: &[CoverageResult], ultrasound: &[CoverageResult]) -> Vec<MapPoint> {
    prenatal
        .iter()
        .filter_map(|p| {
            let location = locate_dsei(&p.group_key)?;
            let ultrasound = ultrasound
                .iter()
                .find(|u| u.group_key == p.group_key)
                .map(|u| u.coverage)
                .unwrap_or(Ratio::UNDEFINED);
            Some(MapPoint {
                group_key: p.group_key.clone(),
                region: location.region,
                latitude: location.latitude,
                longitude: location.longitude,
                prenatal: p.coverage,
                ultrasound,
            })
        })
        .collect()
}
