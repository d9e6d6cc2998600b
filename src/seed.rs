// Siembra de datos de ejemplo: dos administradores y dos procesos con un
// punto de decisión inicial cuyo rechazo vuelve a la misma actividad
// (bucle de reproceso). Es idempotente: un proceso ya sembrado se salta.
use doc_domain::{Admin, Process, ProcessActivity};
use tracker::{Result, TrackRepository, TrackService};

pub fn seed_examples<R>(service: &TrackService<R>) -> Result<()>
    where R: TrackRepository + 'static
{
    service.upsert_admin(&Admin::new("ADM001", "Admin Oficina Central", "Central", "Capital")?)?;
    service.upsert_admin(&Admin::new("ADM002", "Admin Regional Norte", "Regional", "Norte")?)?;

    seed_process(service,
                 "SUB",
                 "Subdivisión de Parcela",
                 "Verificación de Expediente",
                 ("Verificación aprobada", "Verificación rechazada"),
                 &["Medición", "Emisión de Documento"])?;
    seed_process(service,
                 "CHG",
                 "Cancelación de Hipoteca",
                 "Validación de Documento",
                 ("Validación aprobada", "Validación rechazada"),
                 &["Cancelación Registral", "Entrega de Documento"])?;
    Ok(())
}

fn seed_process<R>(service: &TrackService<R>,
                   code: &str,
                   name: &str,
                   decision_name: &str,
                   labels: (&str, &str),
                   steps: &[&str])
                   -> Result<()>
    where R: TrackRepository + 'static
{
    if service.list_processes()?.iter().any(|p| p.code() == code) {
        return Ok(());
    }

    let process = Process::new(code, name)?;
    let mut rest = Vec::new();
    for (i, step_name) in steps.iter().enumerate() {
        rest.push(ProcessActivity::step(process.id(), step_name, i as i32 + 2));
    }

    // La decisión abre el proceso: aceptar avanza al primer paso siguiente,
    // rechazar repite la verificación.
    let mut decision = ProcessActivity::step(process.id(), decision_name, 1).as_decision(labels.0, labels.1);
    let decision_id = decision.id;
    decision = decision.with_branches(rest.first().map(|a| a.id), Some(decision_id));

    let mut activities = vec![decision];
    activities.extend(rest);
    service.create_process(process, activities)?;
    Ok(())
}
