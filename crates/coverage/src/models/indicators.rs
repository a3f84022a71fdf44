use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::columns::FieldSpec;
use crate::models::config::FieldCatalog;

/// The health indicators the pipeline computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Pregnant women with six or more prenatal consultations
    Prenatal,
    /// Pregnant women with access to an ultrasound exam
    Ultrasound,
    /// Infant deaths per live birth
    Mortality,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Indicator::Prenatal, Indicator::Ultrasound, Indicator::Mortality];

    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Prenatal => "Pré-natal (6+ consultas)",
            Indicator::Ultrasound => "Ultrassonografia",
            Indicator::Mortality => "Mortalidade infantil",
        }
    }

    /// Coverage indicators are compared against the benchmark and mapped;
    /// mortality is a rate where lower is better
    pub fn is_coverage(&self) -> bool {
        !matches!(self, Indicator::Mortality)
    }

    pub fn numerator<'a>(&self, catalog: &'a FieldCatalog) -> &'a FieldSpec {
        match self {
            Indicator::Prenatal => &catalog.prenatal_visits,
            Indicator::Ultrasound => &catalog.ultrasound,
            Indicator::Mortality => &catalog.infant_deaths,
        }
    }

    pub fn denominator<'a>(&self, catalog: &'a FieldCatalog) -> &'a FieldSpec {
        match self {
            Indicator::Prenatal | Indicator::Ultrasound => &catalog.pregnant,
            Indicator::Mortality => &catalog.live_births,
        }
    }

    /// Every field a source of this indicator is resolved against: district,
    /// numerator, denominator, then any extra counts carried into the report
    pub fn fields<'a>(&self, catalog: &'a FieldCatalog) -> Vec<&'a FieldSpec> {
        let mut fields = vec![&catalog.district, self.numerator(catalog), self.denominator(catalog)];
        if let Indicator::Mortality = self {
            fields.push(&catalog.maternal_deaths);
        }
        fields
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_per_indicator() {
        let catalog = FieldCatalog::default();
        let names = |indicator: Indicator| -> Vec<String> {
            indicator.fields(&catalog).iter().map(|f| f.name.clone()).collect()
        };
        assert_eq!(names(Indicator::Prenatal), vec!["district", "prenatal_visits", "pregnant"]);
        assert_eq!(names(Indicator::Ultrasound), vec!["district", "ultrasound", "pregnant"]);
        assert_eq!(
            names(Indicator::Mortality),
            vec!["district", "infant_deaths", "live_births", "maternal_deaths"]
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Indicator::Ultrasound).unwrap(), "\"ultrasound\"");
        let parsed: Indicator = serde_json::from_str("\"mortality\"").unwrap();
        assert_eq!(parsed, Indicator::Mortality);
        assert!(!parsed.is_coverage());
    }
}
