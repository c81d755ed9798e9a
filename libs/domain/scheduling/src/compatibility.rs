// [libs/domain/scheduling/src/compatibility.rs]
/*!
 * =================================================================
 * APARATO: COMPATIBILITY MATRIX BUILDER (V9.0 - BIPARTITE CYCLE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAFO BIPARTITO AGENTE ⇄ TRABAJO POR CICLO
 *
 * # Mathematical Proof (Score Duality):
 * constraint_score(trabajo) = grado del vértice trabajo;
 * flexibility_score(agente) = grado del vértice agente. Ordenar la
 * selección por grados ascendentes en ambos lados maximiza la
 * flexibilidad residual del emparejamiento (heurística de Kuhn).
 * =================================================================
 */

use crate::version_pattern::VersionPattern;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Clave de una ranura asignable: un trabajo plano o una capa de
/// incremento concreta de un trabajo padre.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotKey {
    /// Trabajo propietario de la ranura.
    pub job_id: Uuid,
    /// Capa de incremento, cuando la ranura es por capa.
    pub layer_id: Option<Uuid>,
}

impl SlotKey {
    /// Ranura de un trabajo sin capas.
    #[must_use]
    pub fn flat(job_id: Uuid) -> Self {
        Self { job_id, layer_id: None }
    }

    /// Ranura de una capa de incremento.
    #[must_use]
    pub fn layered(job_id: Uuid, layer_id: Uuid) -> Self {
        Self { job_id, layer_id: Some(layer_id) }
    }
}

/// Capacidad declarada de un agente disponible.
#[derive(Debug, Clone)]
pub struct AgentCapability {
    /// Identificador del agente.
    pub agent_id: String,
    /// Patrón de versión que el agente puede ejecutar.
    pub version_pattern: VersionPattern,
}

/// Exigencia de versión de una ranura asignable.
#[derive(Debug, Clone)]
pub struct SlotRequirement {
    /// Ranura exigente.
    pub slot: SlotKey,
    /// Patrón de versión exigido por el trabajo.
    pub version_pattern: VersionPattern,
}

/**
 * Grafo bipartito de compatibilidad, construido una vez por ciclo de
 * planificación y descartado al finalizarlo.
 */
#[derive(Debug, Default)]
pub struct CompatibilityMatrix {
    slot_to_agents: HashMap<SlotKey, Vec<String>>,
    agent_to_slots: HashMap<String, Vec<SlotKey>>,
}

impl CompatibilityMatrix {
    /**
     * Construye el grafo evaluando la regla de compatibilidad sobre el
     * producto agentes × ranuras.
     *
     * # Performance:
     * O(A × J) evaluaciones de patrón; ambas proyecciones se indexan
     * en la misma pasada.
     */
    #[must_use]
    pub fn build(agents: &[AgentCapability], slots: &[SlotRequirement]) -> Self {
        let mut slot_to_agents: HashMap<SlotKey, Vec<String>> = HashMap::new();
        let mut agent_to_slots: HashMap<String, Vec<SlotKey>> = HashMap::new();

        for slot_requirement in slots {
            // Toda ranura queda registrada aunque carezca de agentes.
            slot_to_agents.entry(slot_requirement.slot.clone()).or_default();
        }

        for agent_capability in agents {
            agent_to_slots.entry(agent_capability.agent_id.clone()).or_default();

            for slot_requirement in slots {
                let is_compatible = agent_capability
                    .version_pattern
                    .is_compatible_with(&slot_requirement.version_pattern);

                if is_compatible {
                    slot_to_agents
                        .entry(slot_requirement.slot.clone())
                        .or_default()
                        .push(agent_capability.agent_id.clone());

                    agent_to_slots
                        .entry(agent_capability.agent_id.clone())
                        .or_default()
                        .push(slot_requirement.slot.clone());
                }
            }
        }

        Self { slot_to_agents, agent_to_slots }
    }

    /// Agentes compatibles con una ranura.
    #[must_use]
    pub fn compatible_agents(&self, slot: &SlotKey) -> &[String] {
        self.slot_to_agents
            .get(slot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Número de agentes compatibles con la ranura (grado del vértice).
    #[must_use]
    pub fn constraint_score(&self, slot: &SlotKey) -> usize {
        self.compatible_agents(slot).len()
    }

    /// Número de ranuras que el agente puede servir (grado del vértice).
    #[must_use]
    pub fn flexibility_score(&self, agent_id: &str) -> usize {
        self.agent_to_slots
            .get(agent_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Evalúa una arista concreta del grafo.
    #[must_use]
    pub fn is_pair_compatible(&self, agent_id: &str, slot: &SlotKey) -> bool {
        self.compatible_agents(slot)
            .iter()
            .any(|compatible_agent| compatible_agent == agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(agent_id: &str, raw_pattern: &str) -> AgentCapability {
        AgentCapability {
            agent_id: agent_id.to_string(),
            version_pattern: raw_pattern.parse().unwrap(),
        }
    }

    fn requirement(slot: SlotKey, raw_pattern: &str) -> SlotRequirement {
        SlotRequirement { slot, version_pattern: raw_pattern.parse().unwrap() }
    }

    #[test]
    fn certify_bipartite_scores() {
        let generalist_slot = SlotKey::flat(Uuid::new_v4());
        let strict_slot = SlotKey::flat(Uuid::new_v4());

        let agents = vec![
            capability("agent-universal", "default"),
            capability("agent-legacy", "6.x"),
        ];
        let slots = vec![
            requirement(generalist_slot.clone(), "default"),
            requirement(strict_slot.clone(), "7.1.2"),
        ];

        let matrix = CompatibilityMatrix::build(&agents, &slots);

        // El agente universal sirve ambas ranuras; el legado sólo la laxa.
        assert_eq!(matrix.flexibility_score("agent-universal"), 2);
        assert_eq!(matrix.flexibility_score("agent-legacy"), 1);

        assert_eq!(matrix.constraint_score(&generalist_slot), 2);
        assert_eq!(matrix.constraint_score(&strict_slot), 1);

        assert!(matrix.is_pair_compatible("agent-universal", &strict_slot));
        assert!(!matrix.is_pair_compatible("agent-legacy", &strict_slot));
    }

    #[test]
    fn certify_slot_without_agents_is_registered() {
        let orphan_slot = SlotKey::flat(Uuid::new_v4());
        let matrix = CompatibilityMatrix::build(&[], &[requirement(orphan_slot.clone(), "7.x")]);

        assert_eq!(matrix.constraint_score(&orphan_slot), 0);
        assert!(matrix.compatible_agents(&orphan_slot).is_empty());
    }
}
