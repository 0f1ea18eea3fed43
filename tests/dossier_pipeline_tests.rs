mod common;

use common::{event, guest, page_markers, pages_have_media_box, Fixture, StubConverter, StubRasterizer};
use fpit_invitaciones::dossier::{AssetKind, DossierError, FieldViolation, Stage, Step, ViolationKind};
use std::fs;
use std::sync::Arc;

#[cfg(test)]
mod dossier_pipeline_tests {
    use super::*;

    #[test]
    fn test_dossier_pages_are_letter_then_convocatoria_then_cronograma() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::new()));

        let outcome = generator.generate_one(&guest(7, "Ana Ruiz", Some("UNAM")), &event(), &fixture.out_dir());
        let output = outcome.result.unwrap();

        assert_eq!(
            page_markers(&output),
            ["letter-7", "convocatoria-1", "convocatoria-2", "cronograma-1"]
        );
        assert!(pages_have_media_box(&output));
        assert_eq!(outcome.stage, Stage::Done);
    }

    #[test]
    fn test_reference_filename_end_to_end() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::new()));

        let outcome = generator.generate_one(
            &guest(1, "Dr. Juan Pérez García", Some("ITM")),
            &event(),
            &fixture.out_dir(),
        );

        assert_eq!(
            outcome.result.unwrap(),
            fixture.out_dir().join("2025.1-FPiT-DOSSIER-ITM-Dr._Juan_Pérez_García.pdf")
        );
    }

    #[test]
    fn test_one_failing_guest_does_not_stop_the_batch() {
        let fixture = Fixture::new();
        let converter = Arc::new(StubConverter::failing_for(&[2]));
        let generator = fixture.generator(converter.clone());
        let guests = vec![
            guest(1, "Ana Ruiz", Some("UNAM")),
            guest(2, "Beto Gil", Some("IPN")),
            guest(3, "Carla Díaz", None),
        ];

        let report = generator.generate_batch(&guests, &event(), &fixture.out_dir()).unwrap();

        assert!(!report.success);
        assert_eq!(report.generated_count, 2);
        assert_eq!(report.total, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].guest_name, "Beto Gil");
        assert!(report.errors[0].error_message.contains("guest 2"));
        assert_eq!(converter.calls(), 3);

        let mut written: Vec<String> = fs::read_dir(fixture.out_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        written.sort();
        assert_eq!(
            written,
            [
                "2025.1-FPiT-DOSSIER-Carla_Díaz.pdf",
                "2025.1-FPiT-DOSSIER-UNAM-Ana_Ruiz.pdf"
            ]
        );
    }

    #[test]
    fn test_report_serialises_camel_case() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::failing_for(&[1])));

        let report = generator
            .generate_batch(&[guest(1, "Ana Ruiz", None)], &event(), &fixture.out_dir())
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["generatedCount"], 0);
        assert_eq!(json["total"], 1);
        assert_eq!(json["errors"][0]["guestName"], "Ana Ruiz");
        assert!(json["errors"][0]["errorMessage"].is_string());
    }

    #[test]
    fn test_no_scratch_files_remain_after_success_or_failure() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::failing_for(&[2])));
        fs::write(fixture.scratch_dir().join("filled_11.typ"), b"other run").unwrap();

        let guests = vec![guest(1, "Ana Ruiz", None), guest(2, "Beto Gil", None)];
        generator.generate_batch(&guests, &event(), &fixture.out_dir()).unwrap();

        assert_eq!(fixture.scratch_files(), ["filled_11.typ"]);
    }

    #[test]
    fn test_failed_outcome_records_the_failing_step() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::failing_for(&[4])));

        let outcome = generator.generate_one(&guest(4, "Ana Ruiz", None), &event(), &fixture.out_dir());

        assert!(matches!(outcome.result, Err(DossierError::Conversion(_))));
        assert!(matches!(outcome.stage, Stage::Failed { at: Step::Convert, .. }));
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_invalid_event_fails_before_touching_the_filesystem() {
        let fixture = Fixture::new();
        let converter = Arc::new(StubConverter::new());
        let generator = fixture.generator(converter.clone());
        let mut incomplete = event();
        incomplete.firmante = "  ".into();

        let result = generator.generate_batch(&[guest(1, "Ana Ruiz", None)], &incomplete, &fixture.out_dir());

        match result {
            Err(DossierError::Validation(errors)) => assert_eq!(errors.fields(), vec!["firmante"]),
            other => panic!("expected a validation error, got {:?}", other),
        }
        assert_eq!(converter.calls(), 0);
        assert!(!fixture.out_dir().exists());
        assert!(fixture.scratch_files().is_empty());
    }

    #[test]
    fn test_period_with_path_separator_is_refused_up_front() {
        let fixture = Fixture::new();
        let converter = Arc::new(StubConverter::new());
        let generator = fixture.generator(converter.clone());
        let mut event = event();
        event.periodo = "1/2".into();

        let result = generator.generate_batch(&[guest(1, "Ana Ruiz", Some("ITM"))], &event, &fixture.out_dir());

        match result {
            Err(DossierError::Validation(errors)) => assert_eq!(
                errors.violations(),
                &[FieldViolation {
                    field: "periodo",
                    kind: ViolationKind::UnsafeForPath
                }]
            ),
            other => panic!("expected a validation error, got {:?}", other),
        }
        assert_eq!(converter.calls(), 0);
        assert!(!fixture.out_dir().exists());
    }

    #[test]
    fn test_failed_merge_still_cleans_scratch() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::new()));
        // The output folder cannot be created under a regular file.
        fs::write(fixture.root.path().join("out"), b"not a directory").unwrap();

        let outcome = generator.generate_one(&guest(6, "Ana Ruiz", None), &event(), &fixture.out_dir());

        assert!(matches!(outcome.result, Err(DossierError::MergeWrite { .. })));
        assert!(matches!(outcome.stage, Stage::Failed { at: Step::Merge, .. }));
        assert!(fixture.scratch_files().is_empty());
    }

    #[test]
    fn test_missing_attachment_is_reported_at_asset_resolution() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.writable_dir().join("convocatoria.pdf")).unwrap();
        let generator = fixture.generator(Arc::new(StubConverter::new()));

        let outcome = generator.generate_one(&guest(1, "Ana Ruiz", None), &event(), &fixture.out_dir());

        assert!(matches!(outcome.result, Err(DossierError::MissingAsset(AssetKind::Convocatoria))));
        assert!(matches!(outcome.stage, Stage::Failed { at: Step::ResolveAssets, .. }));
    }

    #[test]
    fn test_missing_attachment_aborts_the_run() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.writable_dir().join("cronograma.pdf")).unwrap();
        let converter = Arc::new(StubConverter::new());
        let generator = fixture.generator(converter.clone());

        let result = generator.generate_batch(&[guest(1, "Ana Ruiz", None)], &event(), &fixture.out_dir());

        assert!(matches!(result, Err(DossierError::MissingAsset(AssetKind::Cronograma))));
        assert_eq!(converter.calls(), 0);
    }

    #[test]
    fn test_missing_template_aborts_the_run() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.bundled_dir().join("plantilla_base.typ")).unwrap();
        let generator = fixture.generator(Arc::new(StubConverter::new()));

        let result = generator.generate_batch(&[guest(1, "Ana Ruiz", None)], &event(), &fixture.out_dir());

        assert!(matches!(result, Err(DossierError::TemplateNotFound(_))));
    }

    #[test]
    fn test_guest_without_rationale_is_reported_not_fatal() {
        let fixture = Fixture::new();
        let converter = Arc::new(StubConverter::new());
        let generator = fixture.generator(converter.clone());
        let mut incomplete = guest(2, "Beto Gil", None);
        incomplete.caracter_invitacion = String::new();

        let report = generator
            .generate_batch(&[guest(1, "Ana Ruiz", None), incomplete], &event(), &fixture.out_dir())
            .unwrap();

        assert_eq!(report.generated_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].guest_name, "Beto Gil");
        assert_eq!(converter.calls(), 1);
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::new()));

        let report = generator.generate_batch(&[], &event(), &fixture.out_dir()).unwrap();

        assert!(report.success);
        assert_eq!((report.generated_count, report.total), (0, 0));
    }

    #[test]
    fn test_colliding_filenames_keep_the_later_dossier() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::new()));
        let guests = vec![guest(1, "Ana Ruiz", Some("ITM")), guest(2, "Ana Ruiz", Some("ITM"))];

        let report = generator.generate_batch(&guests, &event(), &fixture.out_dir()).unwrap();

        assert_eq!(report.generated_count, 2);
        let output = fixture.out_dir().join("2025.1-FPiT-DOSSIER-ITM-Ana_Ruiz.pdf");
        assert_eq!(page_markers(&output)[0], "letter-2");
        assert_eq!(fs::read_dir(fixture.out_dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_preview_returns_png_and_cleans_up() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::new()));

        let image = generator.preview(&guest(5, "Ana Ruiz", None), &event()).unwrap();

        assert!(image.is_file());
        assert_eq!(image.file_name().unwrap(), "preview_5.png");
        assert!(fixture.scratch_files().is_empty());
    }

    #[test]
    fn test_preview_is_none_when_conversion_fails() {
        let fixture = Fixture::new();
        let generator = fixture.generator(Arc::new(StubConverter::failing_for(&[5])));

        assert!(generator.preview(&guest(5, "Ana Ruiz", None), &event()).is_none());
        assert!(fixture.scratch_files().is_empty());
    }

    #[test]
    fn test_preview_is_none_when_rasterising_fails() {
        let fixture = Fixture::new();
        let generator = fixture.generator_with(
            Arc::new(StubConverter::new()),
            Arc::new(StubRasterizer { fail: true }),
        );

        assert!(generator.preview(&guest(5, "Ana Ruiz", None), &event()).is_none());
        assert!(fixture.scratch_files().is_empty());
    }
}
