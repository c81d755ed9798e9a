// INICIO DEL ARCHIVO [apps/orchestrator/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLERS REGISTRY (V9.0 - SWARM UPLINK)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE ADAPTADORES DE ENTRADA
 * =================================================================
 */

pub mod swarm;
// FIN DEL ARCHIVO [apps/orchestrator/src/handlers/mod.rs]
