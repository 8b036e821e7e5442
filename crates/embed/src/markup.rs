//! HTML produced for the reader: the viewer shell and the two fallbacks.
//!
//! All markup is rendered through [upon] templates with HTML escaping as the
//! default formatter, so titles, authors and URLs taken from the page can
//! never inject markup of their own.
//!
//! | Template  | Variables                                                     |
//! |-----------|---------------------------------------------------------------|
//! | viewer    | `id`, `src`, `title`, `byline`, `strings.*`                   |
//! | object    | `src`, `strings.*`                                            |
//! | preview   | `src`, `strings.*`                                            |

use crate::consts::{DEFAULT_AUTHOR, DEFAULT_TITLE};
use crate::error::{ErrorKind, Result};
use crate::target::EmbedTarget;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::instrument;
use upon::{Engine, Template, Value, fmt as upon_fmt};

const VIEWER_TEMPLATE: &str = r#"<div class="scribd-viewer" id="{{ id }}">
<div class="scribd-header"><div class="scribd-title">{{ title }}</div><div class="scribd-author">{{ byline }}</div></div>
<div class="scribd-document">
<div class="scribd-loading"><div class="scribd-loading-spinner"></div><p>{{ strings.loading }}</p></div>
<iframe class="scribd-iframe" src="{{ src }}" type="application/pdf" allowfullscreen loading="lazy"><p>{{ strings.unsupported }} <a href="{{ src }}" target="_blank">{{ strings.open_in_tab }}</a></p></iframe>
</div>
<div class="scribd-actions"><a class="scribd-button scribd-view" href="{{ src }}" target="_blank">{{ strings.view_fullscreen }}</a><a class="scribd-button scribd-download" href="{{ src }}" download>{{ strings.download }}</a></div>
</div>"#;

const OBJECT_TEMPLATE: &str = r#"<object data="{{ src }}" type="application/pdf" width="100%" height="100%">
<div class="pdf-fallback"><p>{{ strings.object_message }}</p><a class="pdf-button view-button" href="{{ src }}" target="_blank">{{ strings.open_in_tab }}</a><a class="pdf-button download-button" href="{{ src }}" download>{{ strings.download_pdf }}</a></div>
</object>"#;

const PREVIEW_TEMPLATE: &str = r#"<div class="scribd-preview-container"><div class="scribd-preview-message"><p>{{ strings.preview_message }}</p><a href="{{ src }}" target="_blank" class="scribd-button scribd-view">{{ strings.open_document }}</a></div></div>"#;

/// Every piece of reader-facing text. Defaults are French.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Strings {
    pub default_title: String,
    pub default_author: String,
    /// Word placed before the author in the header.
    pub byline: String,
    pub loading: String,
    pub load_error: String,
    pub view_fullscreen: String,
    pub download: String,
    pub object_message: String,
    pub open_in_tab: String,
    pub download_pdf: String,
    pub preview_message: String,
    pub open_document: String,
    pub unsupported: String,
}
impl Default for Strings {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_TITLE.to_string(),
            default_author: DEFAULT_AUTHOR.to_string(),
            byline: "par".to_string(),
            loading: "Chargement du document...".to_string(),
            load_error: "Erreur de chargement. Veuillez télécharger le document.".to_string(),
            view_fullscreen: "Voir en plein écran".to_string(),
            download: "Télécharger".to_string(),
            object_message: "Le PDF ne peut pas être affiché directement. Veuillez utiliser les liens ci-dessous."
                .to_string(),
            open_in_tab: "Ouvrir le PDF dans un nouvel onglet".to_string(),
            download_pdf: "Télécharger le PDF".to_string(),
            preview_message: "Pour une meilleure expérience, veuillez ouvrir ce document.".to_string(),
            open_document: "Ouvrir le document".to_string(),
            unsupported: "Votre navigateur ne prend pas en charge l'affichage des PDF.".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ViewerContext<'a> {
    id: &'a str,
    src: &'a str,
    title: &'a str,
    byline: &'a str,
    strings: &'a Strings,
}

#[derive(Serialize)]
struct LinkContext<'a> {
    src: &'a str,
    strings: &'a Strings,
}

/// Default formatter: strings are written HTML-escaped, everything else as
/// upon would write it.
fn escape_html(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
    match value {
        Value::String(s) => {
            for c in s.chars() {
                match c {
                    '&' => f.write_str("&amp;")?,
                    '<' => f.write_str("&lt;")?,
                    '>' => f.write_str("&gt;")?,
                    '"' => f.write_str("&quot;")?,
                    '\'' => f.write_str("&#39;")?,
                    c => f.write_char(c)?,
                }
            }
        },
        v => upon_fmt::default(f, v)?,
    };
    Ok(())
}

/// Compiled templates plus the strings they are rendered with.
///
/// Templates are compiled once, at construction, so a broken template fails
/// fast instead of at the first fallback.
pub struct Markup {
    engine: Engine<'static>,
    viewer: Template<'static>,
    object: Template<'static>,
    preview: Template<'static>,
    strings: Strings,
}
impl Markup {
    pub fn new(strings: Strings) -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_default_formatter(&escape_html);
        let viewer = engine.compile(VIEWER_TEMPLATE).or_raise(|| ErrorKind::Template)?;
        let object = engine.compile(OBJECT_TEMPLATE).or_raise(|| ErrorKind::Template)?;
        let preview = engine.compile(PREVIEW_TEMPLATE).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, viewer, object, preview, strings })
    }

    pub fn strings(&self) -> &Strings {
        &self.strings
    }

    /// The viewer shell for a container: header, document region and actions.
    #[instrument(level = "trace", skip(self, target), fields(id = %target.id))]
    pub fn viewer(&self, target: &EmbedTarget) -> Result<String> {
        let header = target.header(&self.strings);
        let context = ViewerContext {
            id: &target.id,
            src: &target.src,
            title: &header.title,
            byline: &header.byline,
            strings: &self.strings,
        };
        self.viewer.render(&self.engine, &context).to_string().or_raise(|| ErrorKind::Template)
    }

    /// The native object element with "open" and "download" links inside.
    pub fn object_fallback(&self, src: &str) -> Result<String> {
        let context = LinkContext { src, strings: &self.strings };
        self.object.render(&self.engine, &context).to_string().or_raise(|| ErrorKind::Template)
    }

    /// The plain-link preview for devices without an inline viewer.
    pub fn link_preview(&self, src: &str) -> Result<String> {
        let context = LinkContext { src, strings: &self.strings };
        self.preview.render(&self.engine, &context).to_string().or_raise(|| ErrorKind::Template)
    }
}

/// Render the viewer shell for `target` with the given strings.
///
/// # Examples
///
/// ```
/// use lectern_embed::{EmbedTarget, Strings, render_viewer};
///
/// let target = EmbedTarget::new("sujet-15a", "/pdfs/15A/Sujet15A.pdf");
/// let html = render_viewer(&target, &Strings::default()).unwrap();
/// assert!(html.contains("par SI Sujet 2025"));
/// ```
pub fn render_viewer(target: &EmbedTarget, strings: &Strings) -> Result<String> {
    Markup::new(strings.clone())?.viewer(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup() -> Markup {
        Markup::new(Strings::default()).unwrap()
    }

    #[test]
    fn test_viewer_contains_shell_parts() {
        let target = EmbedTarget::new("sujet-04a", "/pdfs/04A/Sujet04A.pdf");
        let html = markup().viewer(&target).unwrap();
        assert!(html.contains(r#"<div class="scribd-title">Document PDF</div>"#));
        assert!(html.contains(r#"<div class="scribd-author">par SI Sujet 2025</div>"#));
        assert!(html.contains("Chargement du document..."));
        assert!(html.contains("Sujet04A.pdf"));
        assert!(html.contains("Voir en plein écran"));
        assert!(html.contains("Télécharger"));
    }

    #[test]
    fn test_viewer_escapes_page_metadata() {
        let target = EmbedTarget::new("x", "/a.pdf").with_title(Some("<script>alert(1)</script>"));
        let html = markup().viewer(&target).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_viewer_escapes_attribute_values() {
        let target = EmbedTarget::new("x\" onload=\"alert(1)", "/a.pdf?x=1&y='2'")
            .with_author(Some("Tom & Jerry"));
        let html = markup().viewer(&target).unwrap();
        assert!(!html.contains(r#"x" onload"#));
        assert!(html.contains(r#"id="x&quot; onload=&quot;alert(1)""#));
        assert!(html.contains("/a.pdf?x=1&amp;y=&#39;2&#39;"));
        assert!(html.contains("par Tom &amp; Jerry"));
    }

    #[test]
    fn test_object_fallback_has_both_links() {
        let html = markup().object_fallback("https://si.example/pdfs/30A/Sujet30A.pdf").unwrap();
        assert!(html.starts_with("<object"));
        assert!(html.contains("Ouvrir le PDF dans un nouvel onglet"));
        assert!(html.contains("Télécharger le PDF"));
        assert!(html.contains("download>"));
    }

    #[test]
    fn test_link_preview() {
        let html = markup().link_preview("/pdfs/30A/Sujet30A.pdf").unwrap();
        assert!(html.contains("Pour une meilleure expérience, veuillez ouvrir ce document."));
        assert!(html.contains("Ouvrir le document"));
        assert!(!html.contains("<object"));
    }

    #[test]
    fn test_custom_strings() {
        let strings = Strings { byline: "by".into(), default_author: "Staff".into(), ..Strings::default() };
        let html = render_viewer(&EmbedTarget::new("x", "/a.pdf"), &strings).unwrap();
        assert!(html.contains("by Staff"));
    }
}
