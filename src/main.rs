use doc_domain::Decision;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tracker::engine::EngineConfig;
use tracker::{DocumentFilter, FinishTarget, TrackService};
use uuid::Uuid;

mod seed;

/// Pequeño menú interactivo para administrar el seguimiento documental
/// usando el repositorio proporcionado por `doc-persistence`.
///
/// Opciones soportadas:
/// 1) Ver procesos
/// 2) Sembrar datos de ejemplo
/// 3) Registrar documento
/// 4) Ver estado de un documento
/// 5) Recibir documento
/// 6) Iniciar la siguiente actividad
/// 7) Finalizar la actividad en curso
/// 8) Resumen de un documento
/// 9) Listar documentos
/// 10) Eliminar documento
/// 11) Salir
fn main() -> Result<(), Box<dyn Error>> {
    // Inicializar repo (aplica migraciones embebidas si procede)
    let repo = doc_persistence::new_from_env().map_err(|e| Box::new(e) as Box<dyn Error>)?;
    let service = TrackService::new(Arc::new(repo), EngineConfig::default());

    loop {
        println!("\n== DocTrack CLI ==");
        println!("1) Ver procesos");
        println!("2) Sembrar datos de ejemplo");
        println!("3) Registrar documento");
        println!("4) Ver estado de un documento");
        println!("5) Recibir documento");
        println!("6) Iniciar la siguiente actividad");
        println!("7) Finalizar la actividad en curso");
        println!("8) Resumen de un documento");
        println!("9) Listar documentos");
        println!("10) Eliminar documento");
        println!("11) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        match choice.trim() {
            "1" => {
                match service.list_processes() {
                    Ok(processes) => {
                        println!("\nCÓDIGO | NOMBRE");
                        println!("----------------------------------------------");
                        for p in &processes {
                            println!("{:6} | {}", p.code(), p.name());
                            match service.process_activities(&p.id()) {
                                Ok(acts) => {
                                    for a in acts {
                                        let marker = if a.is_decision { " [decisión]" } else { "" };
                                        println!("       |   {}. {}{}", a.order_no, a.name, marker);
                                    }
                                }
                                Err(e) => eprintln!("Error listando actividades: {}", e),
                            }
                        }
                    }
                    Err(e) => eprintln!("Error listando procesos: {}", e),
                }
            }
            "2" => {
                match seed::seed_examples(&service) {
                    Ok(()) => println!("Datos de ejemplo sembrados."),
                    Err(e) => eprintln!("Error sembrando datos: {}", e),
                }
            }
            "3" => {
                let admin = prompt("Id de administrador (ej: ADM001): ")?;
                let doc_type = prompt("Tipo de documento / código de proceso: ")?;
                match service.register_document(admin.trim(), doc_type.trim(), None) {
                    Ok(doc) => println!("Documento registrado: {}", doc.id),
                    Err(e) => eprintln!("Error registrando documento: {}", e),
                }
            }
            "4" => {
                let Some(id) = prompt_uuid("Id del documento (UUID): ")? else { continue };
                match service.document_state(&id) {
                    Ok((state, _activities)) => match serde_json::to_string_pretty(&state) {
                        Ok(s) => println!("{}", s),
                        Err(e) => eprintln!("Error serializando estado: {}", e),
                    },
                    Err(e) => eprintln!("Error consultando estado: {}", e),
                }
            }
            "5" => {
                let Some(id) = prompt_uuid("Id del documento (UUID): ")? else { continue };
                match service.accept_document(&id) {
                    Ok(out) => println!("Documento recibido: estado {} (aceptado {})", out.status, out.accepted_at),
                    Err(e) => eprintln!("Error recibiendo documento: {}", e),
                }
            }
            "6" => {
                let Some(id) = prompt_uuid("Id del documento (UUID): ")? else { continue };
                match service.start_activity(&id, None) {
                    Ok(out) => println!("Actividad iniciada: {} (espera {}s, reposo {}s)",
                                        out.scan_id, out.waiting_seconds, out.resting_seconds),
                    Err(e) => eprintln!("Error iniciando actividad: {}", e),
                }
            }
            "7" => {
                let Some(id) = prompt_uuid("Id del documento (UUID): ")? else { continue };
                let raw = prompt("Decisión (accept/reject, enter si no aplica): ")?;
                let decision = match raw.trim() {
                    "" => None,
                    other => match Decision::parse(other) {
                        Ok(d) => Some(d),
                        Err(e) => {
                            eprintln!("{}", e);
                            continue;
                        }
                    },
                };
                match service.finish_activity(FinishTarget::Document(id), decision, None) {
                    Ok(out) => {
                        println!("Actividad finalizada en {}s", out.duration_seconds);
                        if out.done {
                            println!("Proceso completo: el documento quedó en DONE");
                        }
                    }
                    Err(e) => eprintln!("Error finalizando actividad: {}", e),
                }
            }
            "8" => {
                let Some(id) = prompt_uuid("Id del documento (UUID): ")? else { continue };
                match service.document_summary(&id) {
                    Ok(summary) => match serde_json::to_string_pretty(&summary) {
                        Ok(s) => println!("{}", s),
                        Err(e) => eprintln!("Error serializando resumen: {}", e),
                    },
                    Err(e) => eprintln!("Error consultando resumen: {}", e),
                }
            }
            "9" => {
                let q = prompt("Filtro de texto (enter para todos): ")?;
                let filter = DocumentFilter { query: if q.trim().is_empty() { None } else { Some(q.trim().to_string()) },
                                              ..Default::default() };
                match service.list_documents(&filter) {
                    Ok(items) => {
                        println!("\nID                                   | ESTADO      | PROCESO | ACTUAL / SIGUIENTE");
                        println!("--------------------------------------------------------------------------------");
                        for item in items {
                            let position = item.current_activity
                                               .or(item.next_activity)
                                               .unwrap_or_else(|| "-".into());
                            println!("{} | {:11} | {} | {}",
                                     item.document.id, item.document.status, item.process_name, position);
                        }
                    }
                    Err(e) => eprintln!("Error listando documentos: {}", e),
                }
            }
            "10" => {
                let Some(id) = prompt_uuid("Id del documento a eliminar (UUID): ")? else { continue };
                let confirm = prompt(&format!("Confirma borrado de {}? escribir 'yes' para confirmar: ", id))?;
                if confirm.trim().to_lowercase() == "yes" {
                    match service.purge_document(&id) {
                        Ok(()) => println!("Documento eliminado: {}", id),
                        Err(e) => eprintln!("Error eliminando documento: {}", e),
                    }
                } else {
                    println!("Borrado cancelado");
                }
            }
            "11" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}

fn prompt_uuid(msg: &str) -> io::Result<Option<Uuid>> {
    let raw = prompt(msg)?;
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Ok(Some(id)),
        Err(_) => {
            eprintln!("UUID inválido");
            Ok(None)
        }
    }
}
