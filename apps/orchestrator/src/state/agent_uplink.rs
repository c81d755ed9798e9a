// [apps/orchestrator/src/state/agent_uplink.rs]
/*!
 * =================================================================
 * APARATO: AGENT UPLINK REGISTRY (V13.0 - DIRECTIVE CHANNELS)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: CANALES DE DIRECTIVAS HACIA LA FLOTA CONECTADA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NON-FATAL SENDS: Un fallo de envío jamás mata el ciclo; el
 *    agente puede seguir operando por sondeo y la directiva se
 *    replanifica en el siguiente ciclo.
 * 2. BOUNDED QUEUES: Cada agente posee una cola acotada; la
 *    saturación se reporta como fallo transitorio, no bloquea.
 * 3. FRAMING EXTERNO: El framing WebSocket y la autenticación del
 *    canal son responsabilidad del transporte perimetral.
 * =================================================================
 */

use hashforge_domain_models::messages::AgentDirective;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacidad de la cola de directivas por agente.
const DIRECTIVE_QUEUE_CAPACITY: usize = 64;

/// Fallos transitorios del enlace hacia un agente.
#[derive(Error, Debug)]
pub enum UplinkFault {
    /// El agente no mantiene un canal de directivas abierto.
    #[error("[L4_UPLINK_FAULT]: AGENT_CHANNEL_ABSENT -> {0}")]
    AgentChannelAbsent(String),

    /// La cola del agente está saturada o cerrada.
    #[error("[L4_UPLINK_FAULT]: AGENT_CHANNEL_CONGESTED -> {0}")]
    AgentChannelCongested(String),
}

/**
 * Registro de canales de directivas de la flota conectada.
 */
pub struct AgentUplinkRegistry {
    directive_channels: RwLock<HashMap<String, mpsc::Sender<AgentDirective>>>,
}

impl AgentUplinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            directive_channels: RwLock::new(HashMap::new()),
        }
    }

    /**
     * Abre (o reemplaza) el canal de directivas de un agente.
     * El receptor retornado alimenta el stream del handler perimetral.
     */
    pub fn register(&self, agent_id: &str) -> mpsc::Receiver<AgentDirective> {
        let (directive_sender, directive_receiver) = mpsc::channel(DIRECTIVE_QUEUE_CAPACITY);

        let mut channels_guard = self
            .directive_channels
            .write()
            .expect("FATAL: Uplink registry poisoned.");

        if channels_guard.insert(agent_id.to_string(), directive_sender).is_some() {
            debug!("🔁 [UPLINK]: Channel for agent {} replaced.", agent_id);
        } else {
            info!("📡 [UPLINK]: Agent {} channel established.", agent_id);
        }

        directive_receiver
    }

    /// Cierra el canal de un agente desconectado.
    pub fn unregister(&self, agent_id: &str) {
        let mut channels_guard = self
            .directive_channels
            .write()
            .expect("FATAL: Uplink registry poisoned.");
        if channels_guard.remove(agent_id).is_some() {
            info!("📴 [UPLINK]: Agent {} channel dismantled.", agent_id);
        }
    }

    /**
     * Encola una directiva hacia un agente concreto.
     *
     * # Errors:
     * Fallo transitorio si el canal no existe o está saturado; el
     * llamador registra y continúa (el reintento es el próximo ciclo).
     */
    pub fn dispatch(&self, agent_id: &str, directive: AgentDirective) -> Result<(), UplinkFault> {
        let channels_guard = self
            .directive_channels
            .read()
            .expect("FATAL: Uplink registry poisoned.");

        let directive_sender = channels_guard
            .get(agent_id)
            .ok_or_else(|| UplinkFault::AgentChannelAbsent(agent_id.to_string()))?;

        directive_sender.try_send(directive).map_err(|send_fault| {
            warn!("📵 [UPLINK_CONGESTION]: Directive to {} rejected: {}.", agent_id, send_fault);
            UplinkFault::AgentChannelCongested(agent_id.to_string())
        })
    }

    /// Agentes con canal vivo (telemetría).
    #[must_use]
    pub fn connected_agents(&self) -> Vec<String> {
        self.directive_channels
            .read()
            .expect("FATAL: Uplink registry poisoned.")
            .keys()
            .cloned()
            .collect()
    }

    /// Evalúa la presencia de canal para un agente.
    #[must_use]
    pub fn is_connected(&self, agent_id: &str) -> bool {
        self.directive_channels
            .read()
            .expect("FATAL: Uplink registry poisoned.")
            .contains_key(agent_id)
    }
}

impl Default for AgentUplinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
