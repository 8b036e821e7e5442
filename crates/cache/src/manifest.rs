//! The fixed list of resources pre-fetched at install time.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lectern_fetch::Url;
use serde::{Deserialize, Serialize};

const SHELL: [&str; 6] = ["/", "/index.html", "/welcome.html", "/style.css", "/script.js", "/fallbackPdf.js"];
const PDFS: [&str; 9] = [
    "/pdfs/04A/Sujet04A-RobotLaveurDeVitre.pdf",
    "/pdfs/04B/Sujet04B-RobotLaveurDeVitres.pdf",
    "/pdfs/04C/Sujet04C_RobotLaveurDeVitre.pdf",
    "/pdfs/15A/Sujet15A-Barrière automatique.pdf",
    "/pdfs/15B/Sujet15B-Barrière automatique.pdf",
    "/pdfs/15C/Sujet15C-Barrière automatique.pdf",
    "/pdfs/30A/Sujet30A-TravellingMotorise.pdf",
    "/pdfs/30B/Sujet30B_TravellingMotorise.pdf",
    "/pdfs/30C/Sujet30C-TravellingMotorise.pdf",
];
const SUBJECTS: [&str; 9] = ["04A", "04B", "04C", "15A", "15B", "15C", "30A", "30B", "30C"];

/// Site-relative paths of everything the offline cache installs.
///
/// Split into the site shell, the PDF catalog and the per-subject pages so
/// configuration can override one group without restating the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub shell: Vec<String>,
    pub pdfs: Vec<String>,
    pub pages: Vec<String>,
}
impl Default for Manifest {
    fn default() -> Self {
        Self {
            shell: SHELL.iter().map(|path| path.to_string()).collect(),
            pdfs: PDFS.iter().map(|path| path.to_string()).collect(),
            pages: SUBJECTS.iter().map(|id| format!("/projet_{id}.html")).collect(),
        }
    }
}
impl Manifest {
    /// Every path, shell first, without duplicates.
    pub fn entries(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.shell.len() + self.pdfs.len() + self.pages.len());
        for path in self.shell.iter().chain(&self.pdfs).chain(&self.pages) {
            if !seen.contains(&path.as_str()) {
                seen.push(path.as_str());
            }
        }
        seen
    }

    /// Number of distinct entries, as installed.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every entry against the site origin.
    ///
    /// Entries must stay on the origin; an absolute URL pointing elsewhere is
    /// rejected, since install can only vouch for the site's own resources.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>> {
        self.entries()
            .into_iter()
            .map(|path| {
                let url = origin.join(path).or_raise(|| ErrorKind::InvalidManifest(path.to_string()))?;
                if url.origin() != origin.origin() {
                    exn::bail!(ErrorKind::InvalidManifest(format!("{path} is not on {}", origin.origin().ascii_serialization())));
                }
                Ok(url)
            })
            .collect()
    }
}
