// [libs/domain/scheduling/src/reservation.rs]
/*!
 * =================================================================
 * APARATO: RESERVATION SELECTOR (V13.0 - RESIDUAL FLEXIBILITY)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: RESOLUCIÓN DE CONTEOS A AGENTES CONCRETOS
 *
 * # Mathematical Proof (Greedy Matching):
 * Dentro de cada bucket de prioridad, atender primero a los trabajos
 * más restringidos (constraint_score ASC) eligiendo agentes
 * especialistas (flexibility_score ASC) preserva el máximo de aristas
 * del grafo bipartito para los trabajos menos restringidos.
 * =================================================================
 */

use crate::allocator::{AllocationCandidate, AllocationPlan};
use crate::compatibility::{CompatibilityMatrix, SlotKey};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Reserva concreta: un agente comprometido con una ranura durante el
/// ciclo vigente. El mapa de reservas no persiste; se reconstruye en
/// cada ciclo y se libera al finalizarlo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Ranura beneficiaria.
    pub slot: SlotKey,
    /// Agente físicamente seleccionado.
    pub agent_id: String,
}

/**
 * Materializa el plan de conteos en reservas concretas.
 *
 * # Logic:
 * 1. Buckets en orden de prioridad descendente; dentro del bucket,
 *    ranuras por constraint_score ascendente (restringidas primero).
 * 2. Por ranura: primero los agentes preferidos (benchmark forzado
 *    recién completado para ese trabajo), luego los compatibles
 *    restantes por flexibility_score ascendente (especialistas primero).
 */
#[must_use]
pub fn reserve(
    plan: &AllocationPlan,
    candidates: &[AllocationCandidate],
    matrix: &CompatibilityMatrix,
    available_agents: &[String],
    preferred_agents: &HashMap<SlotKey, Vec<String>>,
) -> Vec<Reservation> {
    let mut reservations: Vec<Reservation> = Vec::new();
    let mut unclaimed_agents: HashSet<&str> =
        available_agents.iter().map(String::as_str).collect();

    let priority_of: HashMap<&SlotKey, i64> = candidates
        .iter()
        .map(|candidate| (&candidate.slot, candidate.priority))
        .collect();

    // Orden de servicio: prioridad DESC, luego restricción ASC.
    let mut ordered_grants: Vec<(&SlotKey, u32)> = plan
        .grants
        .iter()
        .map(|grant| (&grant.slot, grant.intended_agent_count))
        .collect();
    ordered_grants.sort_by(|(left_slot, _), (right_slot, _)| {
        let left_priority = priority_of.get(left_slot).copied().unwrap_or(0);
        let right_priority = priority_of.get(right_slot).copied().unwrap_or(0);
        right_priority
            .cmp(&left_priority)
            .then_with(|| {
                matrix
                    .constraint_score(left_slot)
                    .cmp(&matrix.constraint_score(right_slot))
            })
    });

    for (slot, intended_count) in ordered_grants {
        let mut picked_for_slot: u32 = 0;

        // 1. Preferencia: agentes que completaron un benchmark forzado
        //    para este trabajo en la fase previa del ciclo.
        if let Some(preferred_list) = preferred_agents.get(slot) {
            for preferred_agent in preferred_list {
                if picked_for_slot >= intended_count {
                    break;
                }
                if unclaimed_agents.contains(preferred_agent.as_str())
                    && matrix.is_pair_compatible(preferred_agent, slot)
                {
                    unclaimed_agents.remove(preferred_agent.as_str());
                    reservations.push(Reservation {
                        slot: slot.clone(),
                        agent_id: preferred_agent.clone(),
                    });
                    picked_for_slot += 1;
                }
            }
        }

        // 2. Resto: compatibles no reclamados, especialistas primero.
        let mut compatible_pool: Vec<&String> = matrix
            .compatible_agents(slot)
            .iter()
            .filter(|agent_id| unclaimed_agents.contains(agent_id.as_str()))
            .collect();
        compatible_pool.sort_by_key(|agent_id| matrix.flexibility_score(agent_id));

        for agent_id in compatible_pool {
            if picked_for_slot >= intended_count {
                break;
            }
            unclaimed_agents.remove(agent_id.as_str());
            reservations.push(Reservation {
                slot: slot.clone(),
                agent_id: agent_id.clone(),
            });
            picked_for_slot += 1;
        }

        if picked_for_slot < intended_count {
            debug!(
                "⚖️ [RESERVATION]: Slot {:?} under-served ({}/{} agents materialized).",
                slot, picked_for_slot, intended_count
            );
        }
    }

    reservations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocationGrant;
    use crate::compatibility::{AgentCapability, SlotRequirement};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn certify_specialists_are_spent_first() {
        // Un agente especialista (sólo sirve al trabajo estricto) y uno
        // universal: el trabajo estricto debe consumir al especialista,
        // dejando al universal para el trabajo laxo.
        let strict_slot = SlotKey::flat(Uuid::new_v4());
        let lax_slot = SlotKey::flat(Uuid::new_v4());

        let agents = vec![
            AgentCapability {
                agent_id: "agent-universal".to_string(),
                version_pattern: "default".parse().unwrap(),
            },
            AgentCapability {
                agent_id: "agent-specialist".to_string(),
                version_pattern: "7.1.2".parse().unwrap(),
            },
        ];
        let slots = vec![
            SlotRequirement { slot: strict_slot.clone(), version_pattern: "7.1.x".parse().unwrap() },
            SlotRequirement { slot: lax_slot.clone(), version_pattern: "6.x".parse().unwrap() },
        ];
        let matrix = CompatibilityMatrix::build(&agents, &slots);

        let candidates = vec![
            AllocationCandidate {
                slot: strict_slot.clone(),
                parent_job_id: strict_slot.job_id,
                priority: 100,
                max_agents: 1,
                created_at: Utc::now(),
                parent_active_agents: 0,
                has_undispatched_work: true,
            },
            AllocationCandidate {
                slot: lax_slot.clone(),
                parent_job_id: lax_slot.job_id,
                priority: 100,
                max_agents: 1,
                created_at: Utc::now(),
                parent_active_agents: 0,
                has_undispatched_work: true,
            },
        ];

        let plan = AllocationPlan {
            grants: vec![
                AllocationGrant { slot: strict_slot.clone(), intended_agent_count: 1 },
                AllocationGrant { slot: lax_slot.clone(), intended_agent_count: 1 },
            ],
        };

        let available = vec!["agent-universal".to_string(), "agent-specialist".to_string()];
        let reservations = reserve(&plan, &candidates, &matrix, &available, &HashMap::new());

        let strict_reservation = reservations
            .iter()
            .find(|reservation| reservation.slot == strict_slot)
            .expect("strict slot must be served");
        assert_eq!(strict_reservation.agent_id, "agent-specialist");

        let lax_reservation = reservations
            .iter()
            .find(|reservation| reservation.slot == lax_slot)
            .expect("lax slot must be served");
        assert_eq!(lax_reservation.agent_id, "agent-universal");
    }

    #[test]
    fn certify_preferred_agent_wins_the_slot() {
        let slot = SlotKey::flat(Uuid::new_v4());

        let agents = vec![
            AgentCapability {
                agent_id: "agent-a".to_string(),
                version_pattern: "default".parse().unwrap(),
            },
            AgentCapability {
                agent_id: "agent-b".to_string(),
                version_pattern: "default".parse().unwrap(),
            },
        ];
        let slots = vec![SlotRequirement {
            slot: slot.clone(),
            version_pattern: "default".parse().unwrap(),
        }];
        let matrix = CompatibilityMatrix::build(&agents, &slots);

        let candidates = vec![AllocationCandidate {
            slot: slot.clone(),
            parent_job_id: slot.job_id,
            priority: 100,
            max_agents: 1,
            created_at: Utc::now(),
            parent_active_agents: 0,
            has_undispatched_work: true,
        }];

        let plan = AllocationPlan {
            grants: vec![AllocationGrant { slot: slot.clone(), intended_agent_count: 1 }],
        };

        let mut preferred = HashMap::new();
        preferred.insert(slot.clone(), vec!["agent-b".to_string()]);

        let available = vec!["agent-a".to_string(), "agent-b".to_string()];
        let reservations = reserve(&plan, &candidates, &matrix, &available, &preferred);

        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].agent_id, "agent-b");
    }
}
