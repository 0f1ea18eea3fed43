//! Concatenating the letter with the two attachments.
//!
//! Page order is fixed: letter, convocatoria, cronograma.

use lopdf::{dictionary, Document, Object, ObjectId};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::DossierError;

/// Page attributes a page may inherit from its ancestors in the page tree.
/// They are copied onto the page before the original tree is dropped.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Default, Clone, Copy)]
pub struct DossierAssembler;

impl DossierAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Merge the three PDFs into `out_dir/filename`.
    ///
    /// The output is written to a temporary file in `out_dir` and renamed into
    /// place, so a failed write never leaves a truncated dossier behind. An
    /// existing file with the same name is replaced.
    pub fn assemble(
        &self,
        letter: &Path,
        convocatoria: &Path,
        cronograma: &Path,
        out_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, DossierError> {
        let target = out_dir.join(filename);

        let mut merged = merge_documents(&[letter, convocatoria, cronograma])
            .map_err(|reason| DossierError::merge_write(&target, reason))?;

        fs::create_dir_all(out_dir).map_err(|e| DossierError::merge_write(&target, e))?;
        write_atomically(&mut merged, out_dir, &target)?;

        log::info!("Dossier written to {}", target.display());
        Ok(target)
    }
}

/// Concatenate the pages of `paths`, in order, into a new document.
pub fn merge_documents(paths: &[&Path]) -> Result<Document, String> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();

    for path in paths {
        let mut doc = Document::load(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(format!("{} has no pages", path.display()));
        }
        for &page_id in &pages {
            inherit_page_attributes(&mut doc, page_id)
                .map_err(|e| format!("malformed page tree in {}: {}", path.display(), e))?;
        }

        log::debug!("Appending {} page(s) from {}", pages.len(), path.display());
        page_ids.extend(pages);
        merged.objects.extend(doc.objects);
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();

    for &page_id in &page_ids {
        merged
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| format!("page {:?} lost while merging: {}", page_id, e))?
            .set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_ids.len() as i64,
    };
    merged.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    // The source catalogs and page trees are no longer referenced.
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();

    Ok(merged)
}

fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<()> {
    let mut inherited: Vec<(&'static [u8], Object)> = Vec::new();
    let mut parent = doc
        .get_dictionary(page_id)?
        .get(b"Parent")
        .and_then(Object::as_reference)
        .ok();

    let mut depth = 0;
    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_dictionary(node_id)?;
        for key in INHERITABLE {
            if inherited.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                inherited.push((key, value.clone()));
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
    for (key, value) in inherited {
        if !page.has(key) {
            page.set(key, value);
        }
    }
    Ok(())
}

fn write_atomically(doc: &mut Document, out_dir: &Path, target: &Path) -> Result<(), DossierError> {
    let mut temp = NamedTempFile::new_in(out_dir).map_err(|e| DossierError::merge_write(target, e))?;

    doc.save_to(&mut temp)
        .map_err(|e| DossierError::merge_write(target, e))?;
    temp.flush().map_err(|e| DossierError::merge_write(target, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| DossierError::merge_write(target, e))?;

    // On failure the temporary file is dropped and deleted with the error.
    temp.persist(target)
        .map_err(|e| DossierError::merge_write(target, e.error))?;
    Ok(())
}
