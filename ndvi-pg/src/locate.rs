//! Recherche des dossiers clients et des shapefiles d'intersection
//!
//! Arborescence attendue :
//! `<racine>/<id>_<NOM>/3_intersect_ndvi/INTERSECT_NDVI..._<janela>_<safra>.shp`

use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Entrées d'un dossier, triées par nom
fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Dossier du client `id` : premier sous-dossier nommé `<id>_...`
pub fn client_folder(root: &Path, id: i64) -> io::Result<Option<PathBuf>> {
    let prefix = format!("{}_", id);
    Ok(sorted_entries(root)?.into_iter().find(|path| {
        path.is_dir() && file_name(path).is_some_and(|name| name.starts_with(&prefix))
    }))
}

/// Shapefile d'intersection d'une janela et d'une safra, s'il existe
pub fn intersect_shapefile(folder: &Path, janela: &str, safra: i32) -> io::Result<Option<PathBuf>> {
    if !folder.is_dir() {
        return Ok(None);
    }
    let pattern = format!(
        r"(?i)^INTERSECT_NDVI.*_{}_{}\.shp$",
        regex::escape(janela),
        safra
    );
    let re = Regex::new(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    Ok(sorted_entries(folder)?
        .into_iter()
        .find(|path| path.is_file() && file_name(path).is_some_and(|name| re.is_match(name))))
}
