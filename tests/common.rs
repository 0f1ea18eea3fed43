#![allow(dead_code)]

use fpit_invitaciones::dossier::{
    AssetResolver, DocumentConverter, DossierError, DossierGenerator, EventContext, Rasterizer, ScratchDir,
};
use fpit_invitaciones::guest::GuestRecord;
use lopdf::{dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TEMPLATE: &str = "= Invitación\n\nEstimado #nombre_completo, #caracter_invitacion.\n";

/// Write a PDF with one page per marker. The marker is stored under a
/// custom `Marker` key of each page, and the media box lives on the page
/// tree root so it has to be inherited.
pub fn write_marked_pdf(path: &Path, markers: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for marker in markers {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Marker" => Object::string_literal(*marker),
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => markers.len() as i64,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Page markers of a PDF, in page order.
pub fn page_markers(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc.get_dictionary(*page_id).unwrap();
            let marker = page.get(b"Marker").unwrap().as_str().unwrap();
            String::from_utf8_lossy(marker).into_owned()
        })
        .collect()
}

pub fn pages_have_media_box(path: &Path) -> bool {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .all(|page_id| doc.get_dictionary(*page_id).unwrap().has(b"MediaBox"))
}

fn guest_id_of(input: &Path) -> Option<i64> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit_once('_'))
        .and_then(|(_, id)| id.parse().ok())
}

/// Converter stand-in: writes a one-page PDF marked `letter-<id>`, or leaves
/// a truncated file behind and fails for the configured guest ids.
#[derive(Default)]
pub struct StubConverter {
    failing: HashSet<i64>,
    calls: Mutex<Vec<PathBuf>>,
}

impl StubConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: &[i64]) -> Self {
        Self {
            failing: ids.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

impl DocumentConverter for StubConverter {
    fn convert_to_fixed_layout(&self, input: &Path, output: &Path) -> Result<(), DossierError> {
        self.calls.lock().push(input.to_path_buf());
        assert!(input.is_file(), "filled template must exist before conversion");

        let id = guest_id_of(input).unwrap_or(-1);
        if self.failing.contains(&id) {
            fs::write(output, b"%PDF-1.5 trunc").unwrap();
            return Err(DossierError::Conversion(format!("engine crashed on guest {}", id)));
        }
        let marker = format!("letter-{}", id);
        write_marked_pdf(output, &[marker.as_str()]);
        Ok(())
    }
}

#[derive(Default)]
pub struct StubRasterizer {
    pub fail: bool,
}

impl Rasterizer for StubRasterizer {
    fn rasterize_first_page(&self, pdf: &Path, png_out: &Path, _dpi: u32) -> Result<(), DossierError> {
        if self.fail {
            return Err(DossierError::Rasterize("no rasteriser".into()));
        }
        assert!(pdf.is_file());
        fs::write(png_out, b"\x89PNG\r\n\x1a\n").unwrap();
        Ok(())
    }
}

/// Isolated directories for one test: writable and bundled asset dirs,
/// scratch and output.
pub struct Fixture {
    pub root: TempDir,
}

impl Fixture {
    /// Template in the bundled dir, attachments in the writable dir.
    pub fn new() -> Self {
        let fixture = Self::empty();
        fs::write(fixture.bundled_dir().join("plantilla_base.typ"), TEMPLATE).unwrap();
        write_marked_pdf(&fixture.writable_dir().join("convocatoria.pdf"), &["convocatoria-1", "convocatoria-2"]);
        write_marked_pdf(&fixture.writable_dir().join("cronograma.pdf"), &["cronograma-1"]);
        fixture
    }

    pub fn empty() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("data")).unwrap();
        fs::create_dir_all(root.path().join("bundled")).unwrap();
        Self { root }
    }

    pub fn writable_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    pub fn bundled_dir(&self) -> PathBuf {
        self.root.path().join("bundled")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.path().join("out").join("2025.1-invitaciones")
    }

    pub fn resolver(&self) -> AssetResolver {
        AssetResolver::new(self.writable_dir(), self.bundled_dir())
    }

    pub fn generator(&self, converter: Arc<StubConverter>) -> DossierGenerator {
        self.generator_with(converter, Arc::new(StubRasterizer::default()))
    }

    pub fn generator_with(&self, converter: Arc<StubConverter>, rasterizer: Arc<StubRasterizer>) -> DossierGenerator {
        DossierGenerator::new(
            self.resolver(),
            ScratchDir::open(self.scratch_dir()).unwrap(),
            converter,
            rasterizer,
            Duration::ZERO,
        )
    }

    /// Files left directly in the scratch directory.
    pub fn scratch_files(&self) -> Vec<String> {
        match fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn event() -> EventContext {
    EventContext {
        anio: "2025".into(),
        periodo: "1".into(),
        edicion_evento: "XV Foro de Proyectos de Investigación Tecnológica".into(),
        fecha_evento: "2025-06-12".into(),
        fecha_carta: "2025-03-05".into(),
        firmante: "Dra. Marta Salas".into(),
        cargo_firmante: "Coordinadora del FPiT".into(),
    }
}

pub fn guest(id: i64, nombre: &str, abreviacion: Option<&str>) -> GuestRecord {
    let mut guest = GuestRecord::new(id, nombre, "Jurado evaluador");
    guest.abreviacion_org = abreviacion.map(str::to_string);
    guest
}
