// Ejemplo mínimo de uso del motor con el repositorio en memoria: se crea
// una plantilla de dos pasos, se registra un documento y se lo lleva por el
// ciclo completo recepción → actividad → fin, imprimiendo el estado
// derivado en cada paso.
use doc_domain::{Admin, Process, ProcessActivity};
use std::error::Error;
use std::sync::Arc;
use tracker::engine::EngineConfig;
use tracker::stubs::InMemoryTrackRepository;
use tracker::{FinishTarget, TrackService};

fn main() -> Result<(), Box<dyn Error>> {
    let repo = Arc::new(InMemoryTrackRepository::new());
    let service = TrackService::new(repo, EngineConfig::default());

    service.upsert_admin(&Admin::new("ADM001", "Admin Oficina Central", "Central", "Capital")?)?;

    let process = Process::new("REV", "Revisión de expediente")?;
    let activities = vec![ProcessActivity::step(process.id(), "Registro", 1),
                          ProcessActivity::step(process.id(), "Análisis", 2)];
    service.create_process(process, activities)?;

    let document = service.register_document("ADM001", "REV", None)?;
    println!("documento registrado: {}", document.id);

    service.accept_document(&document.id)?;
    let (state, _) = service.document_state(&document.id)?;
    println!("tras la recepción:\n{}", serde_json::to_string_pretty(&state)?);

    loop {
        let started = service.start_activity(&document.id, None)?;
        println!("actividad iniciada: {} (espera {}s, reposo {}s)",
                 started.scan_id, started.waiting_seconds, started.resting_seconds);
        let finished = service.finish_activity(FinishTarget::Scan(started.scan_id), None, None)?;
        println!("actividad finalizada en {}s", finished.duration_seconds);
        if finished.done {
            break;
        }
    }

    let summary = service.document_summary(&document.id)?;
    println!("resumen final:\n{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
