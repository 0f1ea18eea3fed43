use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which jury roles a guest may take, derived from the two advisory flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct JuryEligibility {
    pub protocolo: bool,
    pub informe: bool,
}

impl JuryEligibility {
    /// Fixed business table, (asesor T1, asesor T2) -> (protocolo, informe).
    pub fn from_advisory(es_asesor_t1: bool, es_asesor_t2: bool) -> Self {
        let (protocolo, informe) = match (es_asesor_t1, es_asesor_t2) {
            (false, false) => (true, true),
            (true, false) => (false, true),
            (false, true) => (true, false),
            (true, true) => (false, false),
        };
        Self { protocolo, informe }
    }
}

/// Invitado as kept in the roster.
///
/// The advisory flags can only change through the setters, which keep the
/// two jury flags in sync. Jury flags present in stored JSON are ignored and
/// recomputed on load.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(from = "StoredGuest")]
pub struct GuestRecord {
    pub id: i64,
    #[schema(example = "Dr. Juan Pérez García")]
    pub nombre_completo: String,
    /// Motivo de la invitación
    pub caracter_invitacion: String,
    pub nota: Option<String>,
    /// Cargo o puesto
    pub puesto_completo: Option<String>,
    pub institucion: Option<String>,
    #[schema(example = "ITM")]
    pub abreviacion_org: Option<String>,
    pub es_invitado_especial: bool,
    es_asesor_t1: bool,
    es_asesor_t2: bool,
    puede_ser_jurado_protocolo: bool,
    puede_ser_jurado_informe: bool,
}

impl GuestRecord {
    pub fn new(id: i64, nombre_completo: impl Into<String>, caracter_invitacion: impl Into<String>) -> Self {
        let jury = JuryEligibility::from_advisory(false, false);
        Self {
            id,
            nombre_completo: nombre_completo.into(),
            caracter_invitacion: caracter_invitacion.into(),
            nota: None,
            puesto_completo: None,
            institucion: None,
            abreviacion_org: None,
            es_invitado_especial: false,
            es_asesor_t1: false,
            es_asesor_t2: false,
            puede_ser_jurado_protocolo: jury.protocolo,
            puede_ser_jurado_informe: jury.informe,
        }
    }

    pub fn es_asesor_t1(&self) -> bool {
        self.es_asesor_t1
    }

    pub fn es_asesor_t2(&self) -> bool {
        self.es_asesor_t2
    }

    pub fn set_asesor_t1(&mut self, value: bool) {
        self.es_asesor_t1 = value;
        self.recompute_jury();
    }

    pub fn set_asesor_t2(&mut self, value: bool) {
        self.es_asesor_t2 = value;
        self.recompute_jury();
    }

    pub fn with_advisory(mut self, es_asesor_t1: bool, es_asesor_t2: bool) -> Self {
        self.es_asesor_t1 = es_asesor_t1;
        self.es_asesor_t2 = es_asesor_t2;
        self.recompute_jury();
        self
    }

    pub fn puede_ser_jurado_protocolo(&self) -> bool {
        self.puede_ser_jurado_protocolo
    }

    pub fn puede_ser_jurado_informe(&self) -> bool {
        self.puede_ser_jurado_informe
    }

    pub fn jury(&self) -> JuryEligibility {
        JuryEligibility {
            protocolo: self.puede_ser_jurado_protocolo,
            informe: self.puede_ser_jurado_informe,
        }
    }

    fn recompute_jury(&mut self) {
        let jury = JuryEligibility::from_advisory(self.es_asesor_t1, self.es_asesor_t2);
        self.puede_ser_jurado_protocolo = jury.protocolo;
        self.puede_ser_jurado_informe = jury.informe;
    }
}

/// On-disk / wire shape of a guest; the derived flags are not read back.
#[derive(Deserialize)]
struct StoredGuest {
    id: i64,
    nombre_completo: String,
    caracter_invitacion: String,
    #[serde(default)]
    nota: Option<String>,
    #[serde(default)]
    puesto_completo: Option<String>,
    #[serde(default)]
    institucion: Option<String>,
    #[serde(default)]
    abreviacion_org: Option<String>,
    #[serde(default)]
    es_invitado_especial: bool,
    #[serde(default)]
    es_asesor_t1: bool,
    #[serde(default)]
    es_asesor_t2: bool,
}

impl From<StoredGuest> for GuestRecord {
    fn from(stored: StoredGuest) -> Self {
        let mut guest = GuestRecord::new(stored.id, stored.nombre_completo, stored.caracter_invitacion)
            .with_advisory(stored.es_asesor_t1, stored.es_asesor_t2);
        guest.nota = stored.nota;
        guest.puesto_completo = stored.puesto_completo;
        guest.institucion = stored.institucion;
        guest.abreviacion_org = stored.abreviacion_org;
        guest.es_invitado_especial = stored.es_invitado_especial;
        guest
    }
}

#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
pub struct CreateGuestRequest {
    pub nombre_completo: String,
    pub caracter_invitacion: String,
    pub nota: Option<String>,
    pub puesto_completo: Option<String>,
    pub institucion: Option<String>,
    pub abreviacion_org: Option<String>,
    #[serde(default)]
    pub es_invitado_especial: bool,
    #[serde(default)]
    pub es_asesor_t1: bool,
    #[serde(default)]
    pub es_asesor_t2: bool,
}

impl CreateGuestRequest {
    pub fn into_record(self, id: i64) -> GuestRecord {
        let mut guest = GuestRecord::new(id, self.nombre_completo.trim(), self.caracter_invitacion.trim())
            .with_advisory(self.es_asesor_t1, self.es_asesor_t2);
        guest.nota = non_empty(self.nota);
        guest.puesto_completo = non_empty(self.puesto_completo);
        guest.institucion = non_empty(self.institucion);
        guest.abreviacion_org = non_empty(self.abreviacion_org);
        guest.es_invitado_especial = self.es_invitado_especial;
        guest
    }
}

#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
pub struct UpdateGuestRequest {
    pub nombre_completo: Option<String>,
    pub caracter_invitacion: Option<String>,
    pub nota: Option<String>,
    pub puesto_completo: Option<String>,
    pub institucion: Option<String>,
    pub abreviacion_org: Option<String>,
    pub es_invitado_especial: Option<bool>,
    pub es_asesor_t1: Option<bool>,
    pub es_asesor_t2: Option<bool>,
}

impl UpdateGuestRequest {
    pub fn apply(&self, guest: &mut GuestRecord) {
        if let Some(nombre) = &self.nombre_completo {
            guest.nombre_completo = nombre.trim().to_string();
        }
        if let Some(caracter) = &self.caracter_invitacion {
            guest.caracter_invitacion = caracter.trim().to_string();
        }
        if let Some(nota) = &self.nota {
            guest.nota = non_empty(Some(nota.clone()));
        }
        if let Some(puesto) = &self.puesto_completo {
            guest.puesto_completo = non_empty(Some(puesto.clone()));
        }
        if let Some(institucion) = &self.institucion {
            guest.institucion = non_empty(Some(institucion.clone()));
        }
        if let Some(abreviacion) = &self.abreviacion_org {
            guest.abreviacion_org = non_empty(Some(abreviacion.clone()));
        }
        if let Some(especial) = self.es_invitado_especial {
            guest.es_invitado_especial = especial;
        }
        if let Some(t1) = self.es_asesor_t1 {
            guest.set_asesor_t1(t1);
        }
        if let Some(t2) = self.es_asesor_t2 {
            guest.set_asesor_t2(t2);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Roster counters shown on the statistics page.
#[derive(Serialize, Debug, Default, PartialEq, ToSchema)]
pub struct RosterStats {
    pub total: usize,
    pub especiales: usize,
    pub asesores_t1: usize,
    pub asesores_t2: usize,
    pub jurados_protocolo: usize,
    pub jurados_informe: usize,
    pub jurados_ambos: usize,
}

impl RosterStats {
    pub fn from_guests(guests: &[GuestRecord]) -> Self {
        let count = |pred: fn(&GuestRecord) -> bool| guests.iter().filter(|g| pred(g)).count();
        Self {
            total: guests.len(),
            especiales: count(|g| g.es_invitado_especial),
            asesores_t1: count(|g| g.es_asesor_t1()),
            asesores_t2: count(|g| g.es_asesor_t2()),
            jurados_protocolo: count(|g| g.puede_ser_jurado_protocolo()),
            jurados_informe: count(|g| g.puede_ser_jurado_informe()),
            jurados_ambos: count(|g| g.puede_ser_jurado_protocolo() && g.puede_ser_jurado_informe()),
        }
    }
}
