//! CSV import and export of the roster.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::guest::model::{CreateGuestRequest, GuestRecord};

pub const IMPORT_HEADER: [&str; 9] = [
    "nombre_completo",
    "caracter_invitacion",
    "nota",
    "puesto_completo",
    "institucion",
    "abreviacion_org",
    "es_invitado_especial",
    "es_asesor_t1",
    "es_asesor_t2",
];

const EXPORT_EXTRA: [&str; 2] = ["puede_ser_jurado_protocolo", "puede_ser_jurado_informe"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV inválido: {0}")]
    Csv(#[from] csv::Error),
    #[error("falta la columna obligatoria '{0}'")]
    MissingColumn(&'static str),
    #[error("valor booleano no reconocido '{value}' en la columna '{column}' (línea {line})")]
    InvalidBool {
        line: u64,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

/// Rows accepted for insertion plus the ones that were left out.
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub guests: Vec<CreateGuestRequest>,
    pub skipped: Vec<SkippedRow>,
}

/// `1/0`, `true/false`, `si/sí/no`, `x`; case-insensitive, empty is false.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "" | "0" | "false" | "no" => Some(false),
        "1" | "true" | "si" | "sí" | "x" => Some(true),
        _ => None,
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an uploaded CSV. Columns are found by header name, in any order;
/// only the name and rationale columns are mandatory.
pub fn parse_import(data: &[u8]) -> Result<ParsedImport, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };
    let indices: Vec<Option<usize>> = IMPORT_HEADER.iter().map(|name| column(name)).collect();
    for (name, index) in IMPORT_HEADER.iter().zip(&indices).take(2) {
        if index.is_none() {
            return Err(ImportError::MissingColumn(*name));
        }
    }

    let mut parsed = ParsedImport::default();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cell = |i: usize| indices[i].and_then(|index| record.get(index));
        let flag = |i: usize| -> Result<bool, ImportError> {
            let value = cell(i).unwrap_or("");
            parse_flag(value).ok_or_else(|| ImportError::InvalidBool {
                line,
                column: IMPORT_HEADER[i],
                value: value.to_string(),
            })
        };

        if record.iter().all(|value| value.is_empty()) {
            continue;
        }

        let nombre = cell(0).unwrap_or("").to_string();
        let caracter = cell(1).unwrap_or("").to_string();
        if nombre.is_empty() || caracter.is_empty() {
            let reason = if nombre.is_empty() {
                "falta nombre_completo"
            } else {
                "falta caracter_invitacion"
            };
            log::warn!("Skipping CSV line {}: {}", line, reason);
            parsed.skipped.push(SkippedRow {
                line,
                reason: reason.to_string(),
            });
            continue;
        }

        parsed.guests.push(CreateGuestRequest {
            nombre_completo: nombre,
            caracter_invitacion: caracter,
            nota: optional(cell(2)),
            puesto_completo: optional(cell(3)),
            institucion: optional(cell(4)),
            abreviacion_org: optional(cell(5)),
            es_invitado_especial: flag(6)?,
            es_asesor_t1: flag(7)?,
            es_asesor_t2: flag(8)?,
        });
    }

    Ok(parsed)
}

fn flag_cell(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Export the roster, including ids and the derived jury flags.
pub fn export_csv(guests: &[GuestRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["id"];
    header.extend(IMPORT_HEADER);
    header.extend(EXPORT_EXTRA);
    writer.write_record(&header)?;

    for guest in guests {
        let id = guest.id.to_string();
        writer.write_record([
            id.as_str(),
            guest.nombre_completo.as_str(),
            guest.caracter_invitacion.as_str(),
            guest.nota.as_deref().unwrap_or(""),
            guest.puesto_completo.as_deref().unwrap_or(""),
            guest.institucion.as_deref().unwrap_or(""),
            guest.abreviacion_org.as_deref().unwrap_or(""),
            flag_cell(guest.es_invitado_especial),
            flag_cell(guest.es_asesor_t1()),
            flag_cell(guest.es_asesor_t2()),
            flag_cell(guest.puede_ser_jurado_protocolo()),
            flag_cell(guest.puede_ser_jurado_informe()),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Empty import file, header only.
pub fn import_template() -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(IMPORT_HEADER)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_spellings() {
        for yes in ["1", "true", "TRUE", "si", "Sí", "x", " X "] {
            assert_eq!(parse_flag(yes), Some(true), "{yes}");
        }
        for no in ["", "0", "false", "No"] {
            assert_eq!(parse_flag(no), Some(false), "{no}");
        }
        assert_eq!(parse_flag("quizá"), None);
    }

    #[test]
    fn test_import_skips_incomplete_rows_with_line_numbers() {
        let csv = "nombre_completo,caracter_invitacion,es_asesor_t1\n\
                   Ana Ruiz,Jurado,1\n\
                   ,Ponente,0\n\
                   Beto Gil,,0\n\
                   Carla Díaz,Invitada,no\n";
        let parsed = parse_import(csv.as_bytes()).unwrap();

        let names: Vec<&str> = parsed.guests.iter().map(|g| g.nombre_completo.as_str()).collect();
        assert_eq!(names, ["Ana Ruiz", "Carla Díaz"]);
        assert!(parsed.guests[0].es_asesor_t1);
        assert_eq!(
            parsed.skipped,
            vec![
                SkippedRow { line: 3, reason: "falta nombre_completo".into() },
                SkippedRow { line: 4, reason: "falta caracter_invitacion".into() },
            ]
        );
    }

    #[test]
    fn test_import_requires_name_column() {
        let result = parse_import(b"caracter_invitacion\nJurado\n");
        assert!(matches!(result, Err(ImportError::MissingColumn("nombre_completo"))));
    }

    #[test]
    fn test_import_rejects_unknown_flag() {
        let csv = "nombre_completo,caracter_invitacion,es_invitado_especial\nAna,Jurado,tal vez\n";
        assert!(matches!(
            parse_import(csv.as_bytes()),
            Err(ImportError::InvalidBool { line: 2, .. })
        ));
    }

    #[test]
    fn test_export_then_import_keeps_flags() {
        let mut guest = GuestRecord::new(5, "Dr. Juan Pérez García", "Jurado").with_advisory(false, true);
        guest.abreviacion_org = Some("ITM".into());
        guest.es_invitado_especial = true;

        let exported = export_csv(&[guest]).unwrap();
        let text = String::from_utf8(exported.clone()).unwrap();
        assert!(text.starts_with("id,nombre_completo,"));
        assert!(text.contains("puede_ser_jurado_protocolo,puede_ser_jurado_informe"));

        let parsed = parse_import(&exported).unwrap();
        let back = parsed.guests[0].clone().into_record(5);
        assert!(back.es_invitado_especial);
        assert!(back.es_asesor_t2());
        assert!(back.puede_ser_jurado_protocolo());
        assert!(!back.puede_ser_jurado_informe());
        assert_eq!(back.abreviacion_org.as_deref(), Some("ITM"));
    }

    #[test]
    fn test_template_is_header_only() {
        let template = String::from_utf8(import_template().unwrap()).unwrap();
        assert_eq!(template.trim_end(), IMPORT_HEADER.join(","));
    }
}
