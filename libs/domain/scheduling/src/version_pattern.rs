// [libs/domain/scheduling/src/version_pattern.rs]
/*!
 * =================================================================
 * APARATO: VERSION PATTERN GRAMMAR (V11.0 - TOTAL PARSE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA Y REGLA DE COMPATIBILIDAD DE VERSIONES
 *
 * # Mathematical Proof (Subsumption Lattice):
 * Los patrones forman un retículo por especificidad:
 * default ⊒ M.x ⊒ M.N.x ⊒ M.N.P ⊒ M.N.P-sufijo. Dos patrones son
 * compatibles sii coinciden en cada componente que ambos especifican;
 * el comodín del lado más permisivo subsume al valor concreto del otro.
 * =================================================================
 */

use crate::errors::SchedulingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patrón de versión de binario dentro de la gramática reconocida.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum VersionPattern {
    /// Acepta cualquier versión.
    Default,
    /// `M.x`: fija la componente mayor.
    Major(u32),
    /// `M.N.x`: fija mayor y menor.
    MajorMinor(u32, u32),
    /// `M.N.P` o `M.N.P-sufijo`: versión exacta, sufijo opcional.
    Exact {
        /// Componente mayor.
        major: u32,
        /// Componente menor.
        minor: u32,
        /// Componente de parche.
        patch: u32,
        /// Sufijo de build. Un patrón exacto sin sufijo acepta
        /// cualquier sufijo; dos sufijos presentes deben ser idénticos.
        suffix: Option<String>,
    },
}

impl VersionPattern {
    /**
     * Regla de compatibilidad simétrica entre dos patrones.
     *
     * # Logic:
     * - `default` en cualquiera de los lados ⇒ compatibles.
     * - Ambos lados deben coincidir en cada componente especificada;
     *   la componente no especificada (comodín) subsume cualquier valor.
     * - Sufijos: sólo restringen cuando ambos lados los declaran.
     */
    #[must_use]
    pub fn is_compatible_with(&self, other: &VersionPattern) -> bool {
        if matches!(self, Self::Default) || matches!(other, Self::Default) {
            return true;
        }

        let (self_major, self_minor, self_patch, self_suffix) = self.components();
        let (other_major, other_minor, other_patch, other_suffix) = other.components();

        if !component_agrees(self_major, other_major) {
            return false;
        }
        if !component_agrees(self_minor, other_minor) {
            return false;
        }
        if !component_agrees(self_patch, other_patch) {
            return false;
        }

        // Sufijos: restricción únicamente cuando ambos lados declaran uno.
        match (self_suffix, other_suffix) {
            (Some(left_suffix), Some(right_suffix)) => left_suffix == right_suffix,
            _ => true,
        }
    }

    /// Proyección de componentes especificadas (None = comodín).
    fn components(&self) -> (Option<u32>, Option<u32>, Option<u32>, Option<&str>) {
        match self {
            Self::Default => (None, None, None, None),
            Self::Major(major) => (Some(*major), None, None, None),
            Self::MajorMinor(major, minor) => (Some(*major), Some(*minor), None, None),
            Self::Exact { major, minor, patch, suffix } => (
                Some(*major),
                Some(*minor),
                Some(*patch),
                suffix.as_deref(),
            ),
        }
    }
}

/// Dos componentes concuerdan si alguna es comodín o si son iguales.
fn component_agrees(left: Option<u32>, right: Option<u32>) -> bool {
    match (left, right) {
        (Some(left_value), Some(right_value)) => left_value == right_value,
        _ => true,
    }
}

impl FromStr for VersionPattern {
    type Err = SchedulingError;

    /// Parse total dentro de la gramática; todo lo demás es rechazo.
    fn from_str(raw_pattern: &str) -> Result<Self, Self::Err> {
        let trimmed_pattern = raw_pattern.trim();

        if trimmed_pattern.eq_ignore_ascii_case("default") || trimmed_pattern.is_empty() {
            return Ok(Self::Default);
        }

        let malformed = || SchedulingError::MalformedVersionPattern(raw_pattern.to_string());

        let segments: Vec<&str> = trimmed_pattern.splitn(3, '.').collect();

        match segments.as_slice() {
            [major_raw, "x"] => {
                let major = major_raw.parse::<u32>().map_err(|_| malformed())?;
                Ok(Self::Major(major))
            }
            [major_raw, minor_raw, "x"] => {
                let major = major_raw.parse::<u32>().map_err(|_| malformed())?;
                let minor = minor_raw.parse::<u32>().map_err(|_| malformed())?;
                Ok(Self::MajorMinor(major, minor))
            }
            [major_raw, minor_raw, patch_segment] => {
                let major = major_raw.parse::<u32>().map_err(|_| malformed())?;
                let minor = minor_raw.parse::<u32>().map_err(|_| malformed())?;

                // El segmento de parche puede arrastrar un sufijo de build.
                let (patch_raw, suffix) = match patch_segment.split_once('-') {
                    Some((patch_raw, suffix_raw)) if !suffix_raw.is_empty() => {
                        (patch_raw, Some(suffix_raw.to_string()))
                    }
                    Some(_) => return Err(malformed()),
                    None => (*patch_segment, None),
                };

                let patch = patch_raw.parse::<u32>().map_err(|_| malformed())?;
                Ok(Self::Exact { major, minor, patch, suffix })
            }
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(formatter, "default"),
            Self::Major(major) => write!(formatter, "{}.x", major),
            Self::MajorMinor(major, minor) => write!(formatter, "{}.{}.x", major, minor),
            Self::Exact { major, minor, patch, suffix: None } => {
                write!(formatter, "{}.{}.{}", major, minor, patch)
            }
            Self::Exact { major, minor, patch, suffix: Some(suffix) } => {
                write!(formatter, "{}.{}.{}-{}", major, minor, patch, suffix)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> VersionPattern {
        raw.parse().expect("pattern inside grammar")
    }

    #[test]
    fn certify_grammar_total_parse() {
        assert_eq!(pattern("default"), VersionPattern::Default);
        assert_eq!(pattern("7.x"), VersionPattern::Major(7));
        assert_eq!(pattern("7.1.x"), VersionPattern::MajorMinor(7, 1));
        assert_eq!(
            pattern("7.1.2"),
            VersionPattern::Exact { major: 7, minor: 1, patch: 2, suffix: None }
        );
        assert_eq!(
            pattern("7.1.2-NTLMv3"),
            VersionPattern::Exact {
                major: 7,
                minor: 1,
                patch: 2,
                suffix: Some("NTLMv3".to_string())
            }
        );

        assert!("7".parse::<VersionPattern>().is_err());
        assert!("7.1".parse::<VersionPattern>().is_err());
        assert!("x.1.2".parse::<VersionPattern>().is_err());
        assert!("7.1.2-".parse::<VersionPattern>().is_err());
    }

    #[test]
    fn certify_compatibility_lattice() {
        // default subsume todo
        assert!(pattern("default").is_compatible_with(&pattern("7.1.2-NTLMv3")));

        // comodín mayor subsume versiones concretas del mismo mayor
        assert!(pattern("7.x").is_compatible_with(&pattern("7.1.2")));
        assert!(!pattern("6.x").is_compatible_with(&pattern("7.1.2")));

        // menor fijado
        assert!(pattern("7.1.x").is_compatible_with(&pattern("7.1.9")));
        assert!(!pattern("7.1.x").is_compatible_with(&pattern("7.2.0")));

        // exacto sin sufijo acepta cualquier sufijo
        assert!(pattern("7.1.2").is_compatible_with(&pattern("7.1.2-NTLMv3")));

        // dos sufijos deben ser idénticos
        assert!(!pattern("7.1.2-alpha").is_compatible_with(&pattern("7.1.2-beta")));
        assert!(pattern("7.1.2-alpha").is_compatible_with(&pattern("7.1.2-alpha")));

        // simetría
        assert!(pattern("7.1.2").is_compatible_with(&pattern("7.x")));
    }

    #[test]
    fn certify_display_roundtrip() {
        for raw in ["default", "7.x", "7.1.x", "7.1.2", "7.1.2-NTLMv3"] {
            assert_eq!(pattern(raw).to_string(), raw);
        }
    }
}
