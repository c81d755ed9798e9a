// [libs/domain/scheduling/src/allocator.rs]
/*!
 * =================================================================
 * APARATO: AGENT ALLOCATOR ENGINE (V22.0 - PRIORITY MONOPOLY)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: DISTRIBUCIÓN DE CONTEOS POR BUCKETS DE PRIORIDAD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TWO-PHASE FILL: Fase 1 respeta topes por trabajo en orden FIFO;
 *    Fase 2 distribuye el excedente sobre trabajos sin tope según la
 *    política configurada (fifo | round-robin).
 * 2. SHARED PARENT CAP: Las capas de incremento comparten el tope del
 *    trabajo padre mediante contabilidad por-padre.
 * 3. STRICT OVERRIDE: Mientras un nivel conserve trabajo despachable
 *    con agentes compatibles, ningún nivel inferior recibe agentes.
 *
 * # Mathematical Proof (Count Conservation):
 * Σ intended ≤ |pool|. La fase de conteo nunca retira agentes
 * concretos; la selección física ocurre en la reserva, garantizando
 * que la suma de concesiones jamás exceda el inventario disponible.
 * =================================================================
 */

use crate::compatibility::{CompatibilityMatrix, SlotKey};
use chrono::{DateTime, Utc};
use hashforge_domain_models::OverflowAllocationMode;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Ranura candidata a recibir agentes en este ciclo. Los trabajos en
/// modo incremento llegan pre-expandidos: una entrada por capa con
/// keyspace exacto y trabajo sin despachar, heredando prioridad, tope
/// y antigüedad del padre.
#[derive(Debug, Clone)]
pub struct AllocationCandidate {
    /// Ranura destino (trabajo plano o capa concreta).
    pub slot: SlotKey,
    /// Trabajo padre; coincide con `slot.job_id`.
    pub parent_job_id: Uuid,
    /// Prioridad heredada; mayor gana.
    pub priority: i64,
    /// Tope de agentes del padre. Cero = ilimitado.
    pub max_agents: u32,
    /// Antigüedad del padre; gobierna el orden FIFO del bucket.
    pub created_at: DateTime<Utc>,
    /// Agentes actualmente activos en el padre (todas sus capas).
    pub parent_active_agents: u32,
    /// Si la ranura conserva keyspace o reglas sin despachar.
    pub has_undispatched_work: bool,
}

/// Concesión de conteo para una ranura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationGrant {
    /// Ranura beneficiaria.
    pub slot: SlotKey,
    /// Número de agentes que la reserva debe materializar.
    pub intended_agent_count: u32,
}

/// Plan de conteos del ciclo: mapa ranura → conteo previsto.
#[derive(Debug, Default)]
pub struct AllocationPlan {
    /// Concesiones en el orden de procesamiento de buckets.
    pub grants: Vec<AllocationGrant>,
}

impl AllocationPlan {
    /// Conteo previsto para una ranura concreta.
    #[must_use]
    pub fn intended_for(&self, slot: &SlotKey) -> u32 {
        self.grants
            .iter()
            .find(|grant| &grant.slot == slot)
            .map(|grant| grant.intended_agent_count)
            .unwrap_or(0)
    }

    /// Total de agentes comprometidos por el plan.
    #[must_use]
    pub fn total_intended(&self) -> u32 {
        self.grants.iter().map(|grant| grant.intended_agent_count).sum()
    }
}

/**
 * Distribuye el inventario de agentes disponibles entre las ranuras
 * candidatas, procesando buckets de prioridad de mayor a menor.
 *
 * # Logic:
 * 1. Fase 1 (tope-respetuosa): en orden FIFO, cada trabajo con tope
 *    recibe `min(tope − activos_del_padre, compatibles, pool)`.
 * 2. Fase 2 (excedente): si restan agentes, los trabajos sin tope del
 *    nivel los absorben según la política configurada, acotados por su
 *    conteo de agentes compatibles.
 * 3. Monopolio: si el nivel conserva trabajo despachable con agentes
 *    compatibles, el descenso se detiene.
 */
#[must_use]
pub fn allocate(
    candidates: &[AllocationCandidate],
    matrix: &CompatibilityMatrix,
    available_agent_count: usize,
    overflow_mode: OverflowAllocationMode,
) -> AllocationPlan {
    let mut plan = AllocationPlan::default();
    let mut remaining_pool = available_agent_count as u32;

    if candidates.is_empty() || remaining_pool == 0 {
        return plan;
    }

    // Contabilidad compartida por padre: activos + concedidos.
    let mut parent_committed: HashMap<Uuid, u32> = HashMap::new();
    for candidate in candidates {
        parent_committed
            .entry(candidate.parent_job_id)
            .or_insert(candidate.parent_active_agents);
    }

    // Buckets de prioridad en orden descendente.
    let mut priority_levels: Vec<i64> = candidates.iter().map(|c| c.priority).collect();
    priority_levels.sort_unstable_by(|a, b| b.cmp(a));
    priority_levels.dedup();

    for priority_level in priority_levels {
        let mut bucket: Vec<&AllocationCandidate> = candidates
            .iter()
            .filter(|candidate| candidate.priority == priority_level)
            .collect();
        bucket.sort_by_key(|candidate| candidate.created_at);

        let mut bucket_grants: HashMap<SlotKey, u32> = HashMap::new();

        // --- FASE 1: ASIGNACIÓN RESPETUOSA DE TOPES (FIFO) ---
        for candidate in bucket.iter().filter(|c| c.max_agents > 0) {
            if remaining_pool == 0 {
                break;
            }
            if !candidate.has_undispatched_work {
                continue;
            }

            let committed = parent_committed
                .get(&candidate.parent_job_id)
                .copied()
                .unwrap_or(0);
            let needed = candidate.max_agents.saturating_sub(committed);
            let compatible_available = matrix.constraint_score(&candidate.slot) as u32;

            let granted = needed.min(compatible_available).min(remaining_pool);
            if granted == 0 {
                continue;
            }

            *bucket_grants.entry(candidate.slot.clone()).or_insert(0) += granted;
            *parent_committed.entry(candidate.parent_job_id).or_insert(0) += granted;
            remaining_pool -= granted;
        }

        // --- FASE 2: DISTRIBUCIÓN DEL EXCEDENTE (TRABAJOS SIN TOPE) ---
        if remaining_pool > 0 {
            let overflow_targets: Vec<&AllocationCandidate> = bucket
                .iter()
                .filter(|candidate| {
                    candidate.max_agents == 0
                        && candidate.has_undispatched_work
                        && matrix.constraint_score(&candidate.slot) > 0
                })
                .copied()
                .collect();

            match overflow_mode {
                OverflowAllocationMode::Fifo => {
                    // Volcado sobre el más antiguo, hasta su conteo de
                    // compatibles; el remanente cae al siguiente.
                    for candidate in &overflow_targets {
                        if remaining_pool == 0 {
                            break;
                        }
                        let already_granted =
                            bucket_grants.get(&candidate.slot).copied().unwrap_or(0);
                        let compatible_available =
                            matrix.constraint_score(&candidate.slot) as u32;
                        let capacity = compatible_available.saturating_sub(already_granted);

                        let granted = capacity.min(remaining_pool);
                        if granted == 0 {
                            continue;
                        }

                        *bucket_grants.entry(candidate.slot.clone()).or_insert(0) += granted;
                        *parent_committed.entry(candidate.parent_job_id).or_insert(0) += granted;
                        remaining_pool -= granted;
                    }
                }
                OverflowAllocationMode::RoundRobin => {
                    // Incrementos de uno en uno hasta agotar pool o capacidad.
                    let mut any_progress = true;
                    while remaining_pool > 0 && any_progress {
                        any_progress = false;
                        for candidate in &overflow_targets {
                            if remaining_pool == 0 {
                                break;
                            }
                            let already_granted =
                                bucket_grants.get(&candidate.slot).copied().unwrap_or(0);
                            let compatible_available =
                                matrix.constraint_score(&candidate.slot) as u32;

                            if already_granted >= compatible_available {
                                continue;
                            }

                            *bucket_grants.entry(candidate.slot.clone()).or_insert(0) += 1;
                            *parent_committed.entry(candidate.parent_job_id).or_insert(0) += 1;
                            remaining_pool -= 1;
                            any_progress = true;
                        }
                    }
                }
            }
        }

        // Cristalización de las concesiones del bucket en orden FIFO.
        for candidate in &bucket {
            if let Some(granted) = bucket_grants.get(&candidate.slot) {
                if *granted > 0 {
                    plan.grants.push(AllocationGrant {
                        slot: candidate.slot.clone(),
                        intended_agent_count: *granted,
                    });
                }
            }
        }

        // --- MONOPOLIO DE PRIORIDAD ---
        // Mientras el nivel conserve trabajo despachable con agentes
        // compatibles, los niveles inferiores no reciben nada.
        let level_still_hungry = bucket.iter().any(|candidate| {
            candidate.has_undispatched_work && matrix.constraint_score(&candidate.slot) > 0
        });

        if level_still_hungry {
            debug!(
                "🛑 [ALLOCATOR]: Priority level {} monopolizes the cycle. Descent halted.",
                priority_level
            );
            break;
        }

        if remaining_pool == 0 {
            break;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::{AgentCapability, SlotRequirement};
    use chrono::Duration;

    fn matrix_for(agent_ids: &[&str], slots: &[SlotKey]) -> CompatibilityMatrix {
        let agents: Vec<AgentCapability> = agent_ids
            .iter()
            .map(|agent_id| AgentCapability {
                agent_id: agent_id.to_string(),
                version_pattern: "default".parse().unwrap(),
            })
            .collect();
        let requirements: Vec<SlotRequirement> = slots
            .iter()
            .map(|slot| SlotRequirement {
                slot: slot.clone(),
                version_pattern: "default".parse().unwrap(),
            })
            .collect();
        CompatibilityMatrix::build(&agents, &requirements)
    }

    fn candidate(
        slot: SlotKey,
        priority: i64,
        max_agents: u32,
        age_seconds: i64,
    ) -> AllocationCandidate {
        AllocationCandidate {
            parent_job_id: slot.job_id,
            slot,
            priority,
            max_agents,
            created_at: Utc::now() - Duration::seconds(age_seconds),
            parent_active_agents: 0,
            has_undispatched_work: true,
        }
    }

    #[test]
    fn certify_empty_pool_yields_empty_plan() {
        let slot = SlotKey::flat(Uuid::new_v4());
        let matrix = matrix_for(&[], &[slot.clone()]);
        let plan = allocate(
            &[candidate(slot, 100, 1, 0)],
            &matrix,
            0,
            OverflowAllocationMode::Fifo,
        );
        assert!(plan.grants.is_empty());
    }

    #[test]
    fn certify_fifo_tiebreak_same_priority() {
        // Un agente, dos trabajos de igual prioridad y tope 1: gana el más antiguo.
        let older_slot = SlotKey::flat(Uuid::new_v4());
        let newer_slot = SlotKey::flat(Uuid::new_v4());
        let matrix = matrix_for(&["agent-1"], &[older_slot.clone(), newer_slot.clone()]);

        let plan = allocate(
            &[
                candidate(newer_slot.clone(), 500, 1, 10),
                candidate(older_slot.clone(), 500, 1, 60),
            ],
            &matrix,
            1,
            OverflowAllocationMode::Fifo,
        );

        assert_eq!(plan.intended_for(&older_slot), 1);
        assert_eq!(plan.intended_for(&newer_slot), 0);
    }

    #[test]
    fn certify_priority_override_monopoly() {
        // Dos agentes, prioridades 1000 y 900: el nivel 1000 se lleva ambos.
        let high_slot = SlotKey::flat(Uuid::new_v4());
        let low_slot = SlotKey::flat(Uuid::new_v4());
        let matrix = matrix_for(&["agent-1", "agent-2"], &[high_slot.clone(), low_slot.clone()]);

        let plan = allocate(
            &[
                candidate(high_slot.clone(), 1000, 0, 30),
                candidate(low_slot.clone(), 900, 0, 60),
            ],
            &matrix,
            2,
            OverflowAllocationMode::Fifo,
        );

        assert_eq!(plan.intended_for(&high_slot), 2);
        assert_eq!(plan.intended_for(&low_slot), 0);
    }

    #[test]
    fn certify_uncapped_job_absorbs_full_fleet() {
        // Diez agentes, trabajo con tope cero: los diez quedan previstos.
        let greedy_slot = SlotKey::flat(Uuid::new_v4());
        let agent_names: Vec<String> = (0..10).map(|index| format!("agent-{}", index)).collect();
        let agent_refs: Vec<&str> = agent_names.iter().map(String::as_str).collect();
        let matrix = matrix_for(&agent_refs, &[greedy_slot.clone()]);

        let plan = allocate(
            &[candidate(greedy_slot.clone(), 100, 0, 0)],
            &matrix,
            10,
            OverflowAllocationMode::Fifo,
        );

        assert_eq!(plan.intended_for(&greedy_slot), 10);
    }

    #[test]
    fn certify_round_robin_spreads_one_each() {
        let first_slot = SlotKey::flat(Uuid::new_v4());
        let second_slot = SlotKey::flat(Uuid::new_v4());
        let matrix = matrix_for(
            &["agent-1", "agent-2", "agent-3"],
            &[first_slot.clone(), second_slot.clone()],
        );

        let plan = allocate(
            &[
                candidate(first_slot.clone(), 100, 0, 60),
                candidate(second_slot.clone(), 100, 0, 30),
            ],
            &matrix,
            3,
            OverflowAllocationMode::RoundRobin,
        );

        // 3 agentes sobre 2 trabajos: 2 al más antiguo, 1 al siguiente.
        assert_eq!(plan.intended_for(&first_slot), 2);
        assert_eq!(plan.intended_for(&second_slot), 1);
        assert_eq!(plan.total_intended(), 3);
    }

    #[test]
    fn certify_shared_parent_cap_across_layers() {
        // Dos capas del mismo padre con tope 2: la suma no excede el tope.
        let parent_job_id = Uuid::new_v4();
        let first_layer = SlotKey::layered(parent_job_id, Uuid::new_v4());
        let second_layer = SlotKey::layered(parent_job_id, Uuid::new_v4());
        let matrix = matrix_for(
            &["agent-1", "agent-2", "agent-3"],
            &[first_layer.clone(), second_layer.clone()],
        );

        let mut first_candidate = candidate(first_layer.clone(), 100, 2, 60);
        first_candidate.parent_job_id = parent_job_id;
        let mut second_candidate = candidate(second_layer.clone(), 100, 2, 60);
        second_candidate.parent_job_id = parent_job_id;

        let plan = allocate(
            &[first_candidate, second_candidate],
            &matrix,
            3,
            OverflowAllocationMode::Fifo,
        );

        assert_eq!(plan.total_intended(), 2, "parent cap must be shared across layers");
    }

    #[test]
    fn certify_saturated_cap_respected() {
        // Trabajo con tope 2 y dos agentes ya activos: no recibe más.
        let slot = SlotKey::flat(Uuid::new_v4());
        let matrix = matrix_for(&["agent-1"], &[slot.clone()]);

        let mut saturated = candidate(slot.clone(), 100, 2, 60);
        saturated.parent_active_agents = 2;

        let plan = allocate(&[saturated], &matrix, 1, OverflowAllocationMode::Fifo);
        assert_eq!(plan.intended_for(&slot), 0);
    }
}
