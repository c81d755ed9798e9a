// [libs/domain/models-rs/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V9.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DEL CONTRATO UPLINK
 *
 * # Mathematical Proof (Keyspace Stringification):
 * Los rangos de keyspace viajan como enteros de 64 bits sin signo.
 * JSON preserva u64 sin pérdida dentro del rango del dominio, por lo
 * que el sobre de asignación es bit-perfecto en tránsito.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use hashforge_domain_models::messages::{AgentDirective, JobAssignmentPayload};
    use hashforge_domain_models::job::{AttackMode, JobStatus};
    use hashforge_domain_models::task::TaskStatus;
    use uuid::Uuid;

    /**
     * CERTIFICACIÓN: Roundtrip del sobre de asignación de chunk.
     * Valida la cadena completa: Struct -> JSON -> Struct.
     */
    #[test]
    fn certify_assignment_envelope_roundtrip() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating uplink envelope parity...");

        let task_identifier = Uuid::new_v4();

        let directive_instance = AgentDirective::JobAssignment(JobAssignmentPayload {
            task_id: task_identifier,
            attack_cmd: "-a 0 -m 1000 hashes.txt rockyou.txt --skip 0 --limit 600000".to_string(),
            keyspace_start: 0,
            keyspace_end: 600_000,
            effective_keyspace_start: 0,
            effective_keyspace_end: 600_000,
            binary_reference: "hashcat-6.2.6".to_string(),
            file_references: vec!["rockyou.txt".to_string(), "hashes.txt".to_string()],
        });

        let serialized_json = serde_json::to_string_pretty(&directive_instance)
            .expect("CRITICAL_FAULT: Serialization strata collapsed.");

        // Auditoría de firma de protocolo: el discriminador debe ser exacto.
        assert!(serialized_json.contains("\"directive_type\": \"job_assignment\""));
        assert!(serialized_json.contains(&task_identifier.to_string()));

        let recovered_directive: AgentDirective = serde_json::from_str(&serialized_json)
            .expect("CRITICAL_FAULT: Deserialization failed. Schema drift detected.");

        match recovered_directive {
            AgentDirective::JobAssignment(payload) => {
                assert_eq!(payload.task_id, task_identifier);
                assert_eq!(payload.keyspace_end, 600_000);
                assert_eq!(payload.file_references.len(), 2);
            }
            _ => panic!("INTEGRITY_COLLAPSE: Directive variant corrupted during transit."),
        }

        println!("   ✅ [SUCCESS]: Uplink envelope parity confirmed.");
    }

    /**
     * CERTIFICACIÓN: Paridad textual de los enums de estado con el Ledger.
     */
    #[test]
    fn certify_status_string_parity() {
        assert_eq!(JobStatus::parse("running"), Some(JobStatus::Running));
        assert_eq!(JobStatus::Running.as_str(), "running");
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());

        assert_eq!(
            TaskStatus::parse("reconnect_pending"),
            Some(TaskStatus::ReconnectPending)
        );
        assert!(TaskStatus::Stopping.holds_agent());
        assert!(!TaskStatus::Completed.holds_agent());

        assert_eq!(AttackMode::HybridMaskWordlist.binary_mode_flag(), 7);
        assert_eq!(AttackMode::parse("association"), Some(AttackMode::Association));

        println!("✅ MODELS: Status string parity certified.");
    }
}
