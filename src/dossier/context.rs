//! Event-wide data and the flattened context fed to the letter template.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::validation::ValidationErrors;
use super::DossierError;
use crate::guest::model::GuestRecord;

/// Guest fields forwarded to the template. Nothing else from the guest
/// record ever reaches it.
pub const GUEST_KEYS: [&str; 4] = [
    "nombre_completo",
    "puesto_completo",
    "institucion",
    "caracter_invitacion",
];

pub const EVENT_KEYS: [&str; 7] = [
    "anio",
    "periodo",
    "edicion_evento",
    "fecha_evento",
    "fecha_carta",
    "firmante",
    "cargo_firmante",
];

const MESES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Datos del evento, shared by every guest of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EventContext {
    #[schema(example = "2025")]
    pub anio: String,
    #[schema(example = "1")]
    pub periodo: String,
    #[schema(example = "XV Foro de Proyectos de Investigación Tecnológica")]
    pub edicion_evento: String,
    #[schema(example = "2025-06-12")]
    pub fecha_evento: String,
    #[schema(example = "2025-03-05")]
    pub fecha_carta: String,
    pub firmante: String,
    pub cargo_firmante: String,
}

impl EventContext {
    /// Every field is required, and the year and period must be usable in
    /// file names. Runs before anything touches the filesystem.
    pub fn validate(&self) -> Result<(), DossierError> {
        let mut errors = ValidationErrors::new();

        errors.require_year("anio", &self.anio);
        errors.require_path_segment("periodo", &self.periodo);
        errors.require("edicion_evento", &self.edicion_evento);
        errors.require("fecha_evento", &self.fecha_evento);
        errors.require("fecha_carta", &self.fecha_carta);
        errors.require("firmante", &self.firmante);
        errors.require("cargo_firmante", &self.cargo_firmante);

        errors.into_result().map_err(DossierError::Validation)
    }

    pub fn anio(&self) -> &str {
        self.anio.trim()
    }

    pub fn periodo(&self) -> &str {
        self.periodo.trim()
    }
}

/// The guest-level fields a letter cannot do without.
pub fn validate_guest(guest: &GuestRecord) -> Result<(), DossierError> {
    let mut errors = ValidationErrors::new();
    errors.require("nombre_completo", &guest.nombre_completo);
    errors.require("caracter_invitacion", &guest.caracter_invitacion);
    errors.into_result().map_err(DossierError::Validation)
}

/// Format a date in Spanish long form (e.g. "5 de marzo de 2025").
pub fn format_spanish_date(date: NaiveDate) -> String {
    let month = MESES[(date.month0() as usize).min(MESES.len() - 1)];
    format!("{} de {} de {}", date.day(), month, date.year())
}

/// ISO dates (`YYYY-MM-DD`) become Spanish long form; any other text is
/// taken as already written out and kept as is.
pub fn render_date(value: &str) -> String {
    let trimmed = value.trim();
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => format_spanish_date(date),
        Err(_) => trimmed.to_string(),
    }
}

/// Flattened key/value data substituted into the letter template.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    entries: BTreeMap<&'static str, String>,
}

impl RenderContext {
    pub fn build(guest: &GuestRecord, event: &EventContext) -> Self {
        let mut entries = BTreeMap::new();

        let guest_values = [
            guest.nombre_completo.trim().to_string(),
            guest.puesto_completo.clone().unwrap_or_default(),
            guest.institucion.clone().unwrap_or_default(),
            guest.caracter_invitacion.trim().to_string(),
        ];
        for (key, value) in GUEST_KEYS.iter().zip(guest_values) {
            entries.insert(*key, value);
        }

        let event_values = [
            event.anio().to_string(),
            event.periodo().to_string(),
            event.edicion_evento.trim().to_string(),
            render_date(&event.fecha_evento),
            render_date(&event.fecha_carta),
            event.firmante.trim().to_string(),
            event.cargo_firmante.trim().to_string(),
        ];
        for (key, value) in EVENT_KEYS.iter().zip(event_values) {
            entries.insert(*key, value);
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dossier::validation::{FieldViolation, ViolationKind};

    fn sample_event() -> EventContext {
        EventContext {
            anio: "2025".into(),
            periodo: "1".into(),
            edicion_evento: "XV Foro".into(),
            fecha_evento: "2025-06-12".into(),
            fecha_carta: "2025-03-05".into(),
            firmante: "Mtra. Laura Gómez".into(),
            cargo_firmante: "Coordinadora".into(),
        }
    }

    #[test]
    fn test_spanish_long_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_spanish_date(date), "5 de marzo de 2025");
        assert_eq!(render_date("2025-12-31"), "31 de diciembre de 2025");
        assert_eq!(render_date(" 12 de junio "), "12 de junio");
    }

    #[test]
    fn test_event_validation_lists_missing_fields() {
        let mut event = sample_event();
        event.firmante = "  ".into();
        event.fecha_carta.clear();

        match event.validate() {
            Err(DossierError::Validation(errors)) => {
                assert_eq!(errors.fields(), vec!["fecha_carta", "firmante"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(sample_event().validate().is_ok());
    }

    #[test]
    fn test_period_with_separator_is_rejected() {
        let mut event = sample_event();
        event.periodo = "1/2".into();

        match event.validate() {
            Err(DossierError::Validation(errors)) => assert_eq!(
                errors.violations(),
                &[FieldViolation {
                    field: "periodo",
                    kind: ViolationKind::UnsafeForPath
                }]
            ),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_guest_validation() {
        let guest = GuestRecord::new(3, "  ", "Ponente");
        assert!(matches!(validate_guest(&guest), Err(DossierError::Validation(_))));
        assert!(validate_guest(&GuestRecord::new(3, "Ana", "Jurado")).is_ok());
    }

    #[test]
    fn test_render_context_uses_fixed_keys_only() {
        let mut guest = GuestRecord::new(7, "Dr. Juan Pérez", "Conferencista");
        guest.puesto_completo = Some("Director".into());
        guest.nota = Some("no debe aparecer".into());

        let context = RenderContext::build(&guest, &sample_event());
        assert_eq!(context.len(), GUEST_KEYS.len() + EVENT_KEYS.len());
        assert_eq!(context.get("puesto_completo"), Some("Director"));
        assert_eq!(context.get("institucion"), Some(""));
        assert_eq!(context.get("fecha_carta"), Some("5 de marzo de 2025"));
        assert!(context.get("nota").is_none());
        assert!(context.iter().all(|(_, v)| !v.contains("no debe aparecer")));
    }

    #[test]
    fn test_guest_and_event_keys_do_not_collide() {
        for key in GUEST_KEYS {
            assert!(!EVENT_KEYS.contains(&key));
        }
    }
}
