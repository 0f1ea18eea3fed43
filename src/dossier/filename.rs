//! Output file naming for dossiers.
//!
//! Format: `{anio}.{periodo}-FPiT-DOSSIER-{abreviacion}-{nombre}.pdf`, with the
//! abbreviation segment dropped when the guest has none.

use lazy_static::lazy_static;
use regex::Regex;

use crate::guest::model::GuestRecord;

/// Longest guest-name segment, in characters.
pub const MAX_NAME_CHARS: usize = 50;
/// Used when a guest name is empty once cleaned.
pub const NAME_PLACEHOLDER: &str = "INVITADO";

lazy_static! {
    static ref ILLEGAL_CHARS: Regex = Regex::new(r#"[\\/*?:"<>|]"#).unwrap();
}

/// Remove characters that are illegal in file names on common filesystems.
pub fn strip_illegal(value: &str) -> String {
    ILLEGAL_CHARS.replace_all(value, "").into_owned()
}

/// Whether `value` can be used as one path component as is.
pub fn is_path_safe(value: &str) -> bool {
    !ILLEGAL_CHARS.is_match(value) && !value.contains("..")
}

/// Year or period as it appears in names. Normally already validated; the
/// cleaning keeps a stray separator from turning into a subdirectory.
fn run_segment(value: &str) -> String {
    strip_illegal(value).trim().to_string()
}

fn underscore_spaces(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Cleaned, truncated and underscored guest-name segment.
pub fn name_segment(nombre: &str) -> String {
    let cleaned = strip_illegal(nombre);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return NAME_PLACEHOLDER.to_string();
    }

    let truncated: String = cleaned.chars().take(MAX_NAME_CHARS).collect();
    underscore_spaces(truncated.trim_end())
}

/// Cleaned abbreviation segment, `None` when nothing usable is left.
pub fn abbreviation_segment(abreviacion: Option<&str>) -> Option<String> {
    let cleaned = strip_illegal(abreviacion?);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(underscore_spaces(cleaned))
    }
}

/// Build the dossier file name for a guest.
///
/// Deterministic: the same guest, year and period always give the same name.
/// Two guests that clean to the same name and abbreviation get the same file
/// name; the caller decides what to do about it.
pub fn derive_filename(guest: &GuestRecord, anio: &str, periodo: &str) -> String {
    let name = name_segment(&guest.nombre_completo);
    let (anio, periodo) = (run_segment(anio), run_segment(periodo));

    match abbreviation_segment(guest.abreviacion_org.as_deref()) {
        Some(abbr) => format!("{anio}.{periodo}-FPiT-DOSSIER-{abbr}-{name}.pdf"),
        None => format!("{anio}.{periodo}-FPiT-DOSSIER-{name}.pdf"),
    }
}

/// Name of the per-run output folder, e.g. `2025.1-invitaciones`.
pub fn output_folder_name(anio: &str, periodo: &str) -> String {
    format!("{}.{}-invitaciones", run_segment(anio), run_segment(periodo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(nombre: &str, abreviacion: Option<&str>) -> GuestRecord {
        let mut guest = GuestRecord::new(1, nombre, "Ponente");
        guest.abreviacion_org = abreviacion.map(str::to_string);
        guest
    }

    #[test]
    fn test_reference_example() {
        let g = guest("Dr. Juan Pérez García", Some("ITM"));
        assert_eq!(
            derive_filename(&g, "2025", "1"),
            "2025.1-FPiT-DOSSIER-ITM-Dr._Juan_Pérez_García.pdf"
        );
    }

    #[test]
    fn test_without_abbreviation() {
        let g = guest("Ana Ruiz", None);
        assert_eq!(derive_filename(&g, "2024", "2"), "2024.2-FPiT-DOSSIER-Ana_Ruiz.pdf");

        let g = guest("Ana Ruiz", Some(" ?* "));
        assert_eq!(derive_filename(&g, "2024", "2"), "2024.2-FPiT-DOSSIER-Ana_Ruiz.pdf");
    }

    #[test]
    fn test_illegal_characters_removed() {
        let g = guest(r#"A\B/C*D?E:F"G<H>I|J"#, Some("U/N:AM"));
        let name = derive_filename(&g, "2025", "1");
        assert_eq!(name, "2025.1-FPiT-DOSSIER-UNAM-ABCDEFGHIJ.pdf");
        for c in ['\\', '/', '*', '?', ':', '"', '<', '>', '|'] {
            assert!(!name.contains(c), "{name} contains {c}");
        }
    }

    #[test]
    fn test_name_truncated_to_fifty_chars() {
        let long = "Á".repeat(80);
        let segment = name_segment(&long);
        assert_eq!(segment.chars().count(), MAX_NAME_CHARS);

        let spaced = format!("{} {}", "a".repeat(49), "bcdef");
        let segment = name_segment(&spaced);
        assert!(segment.chars().count() <= MAX_NAME_CHARS);
        assert!(!segment.ends_with('_'));
    }

    #[test]
    fn test_empty_name_uses_placeholder() {
        for nombre in ["", "   ", "???", " <> "] {
            let g = guest(nombre, Some("ITM"));
            assert_eq!(
                derive_filename(&g, "2025", "1"),
                "2025.1-FPiT-DOSSIER-ITM-INVITADO.pdf"
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let g = guest("María  José", Some("Tec de Monterrey"));
        let first = derive_filename(&g, "2025", "1");
        let second = derive_filename(&g, "2025", "1");
        assert_eq!(first, second);
        assert_eq!(first, "2025.1-FPiT-DOSSIER-Tec_de_Monterrey-María__José.pdf");
    }

    #[test]
    fn test_output_folder_name() {
        assert_eq!(output_folder_name("2025", "1"), "2025.1-invitaciones");
    }

    #[test]
    fn test_period_never_adds_a_path_component() {
        let g = guest("Ana Ruiz", Some("ITM"));
        assert_eq!(
            derive_filename(&g, "2025", "1/2"),
            "2025.12-FPiT-DOSSIER-ITM-Ana_Ruiz.pdf"
        );

        let folder = output_folder_name("2025", "../../escape");
        assert!(!folder.contains('/'));
        assert_eq!(std::path::Path::new(&folder).components().count(), 1);
    }

    #[test]
    fn test_path_safety() {
        assert!(is_path_safe("1"));
        assert!(is_path_safe("Primavera"));
        assert!(!is_path_safe("1/2"));
        assert!(!is_path_safe(".."));
        assert!(!is_path_safe("a:b"));
    }
}
