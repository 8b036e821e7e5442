//! Finding embed targets in page HTML.

use crate::consts::{CONTAINER_SELECTOR, ID_SELECTOR, IFRAME_SELECTOR, PDF_MIME};
use crate::target::{EmbedTarget, TargetKind};
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tracing::instrument;

/// Returns the embed targets of a page, containers first, then stand-alone
/// PDF iframes, each in document order.
///
/// A container is any element with a non-empty `data-pdf-src`; its optional
/// `data-pdf-title` and `data-pdf-author` become the header metadata. An
/// iframe counts when its `type` is `application/pdf` or its `src` mentions
/// `.pdf`, unless it sits inside a container (the container owns it) or
/// already shows an object URL. Elements without an `id` get a generated
/// `pdf-embed-N` that no element of the page already uses.
///
/// # Examples
///
/// ```
/// use lectern_embed::discover;
///
/// let html = r#"<div data-pdf-src="/pdfs/04A/Sujet04A.pdf"></div>"#;
/// let targets = discover(html);
/// assert_eq!(targets.len(), 1);
/// assert_eq!(targets[0].src, "/pdfs/04A/Sujet04A.pdf");
/// ```
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn discover(html: &str) -> Vec<EmbedTarget> {
    let document = Html::parse_document(html);
    let mut targets = Vec::new();
    let mut ids = Ids::of(&document);

    for element in document.select(&CONTAINER_SELECTOR) {
        let Some(src) = element.value().attr("data-pdf-src").map(str::trim).filter(|s| !s.is_empty()) else {
            tracing::debug!("Skipping container with empty data-pdf-src");
            continue;
        };
        let target = EmbedTarget::new(ids.for_element(&element, targets.len()), src)
            .with_title(element.value().attr("data-pdf-title"))
            .with_author(element.value().attr("data-pdf-author"));
        targets.push(target);
    }

    for element in document.select(&IFRAME_SELECTOR) {
        let Some(src) = element.value().attr("src").map(str::trim) else {
            continue;
        };
        if !is_pdf_frame(&element, src) || src.starts_with("blob:") || inside_container(&element) {
            continue;
        }
        let target = EmbedTarget::new(ids.for_element(&element, targets.len()), src)
            .with_kind(TargetKind::Iframe)
            .with_title(element.value().attr("title"));
        targets.push(target);
    }

    tracing::debug!(count = targets.len(), "Discovered embed targets");
    targets
}

/// Ids taken so far: the page's own plus every one generated.
struct Ids {
    taken: HashSet<String>,
}
impl Ids {
    fn of(document: &Html) -> Self {
        let taken = document.select(&ID_SELECTOR).filter_map(|element| element.value().id()).map(String::from).collect();
        Self { taken }
    }

    fn for_element(&mut self, element: &ElementRef<'_>, index: usize) -> String {
        if let Some(id) = element.value().id()
            && !id.is_empty()
        {
            return id.to_string();
        }
        let mut n = index + 1;
        loop {
            let candidate = format!("pdf-embed-{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn is_pdf_frame(element: &ElementRef<'_>, src: &str) -> bool {
    let typed = element.value().attr("type").is_some_and(|t| t.trim().eq_ignore_ascii_case(PDF_MIME));
    typed || src.to_lowercase().contains(".pdf")
}

fn inside_container(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().attr("data-pdf-src").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div class="scribd-pdf-container" id="sujet-15a"
                 data-pdf-src="/pdfs/15A/Sujet15A-Barrière automatique.pdf"
                 data-pdf-title="Barrière automatique" data-pdf-author="Académie">
                <iframe src="/pdfs/15A/Sujet15A-Barrière automatique.pdf" type="application/pdf"></iframe>
            </div>
            <div class="scribd-pdf-container" data-pdf-src="/pdfs/04A/Sujet04A.pdf"></div>
            <div class="scribd-pdf-container" data-pdf-src="   "></div>
            <iframe id="legacy" src="/pdfs/30A/Sujet30A.PDF"></iframe>
            <iframe src="/viewer?doc=30B" type="application/pdf"></iframe>
            <iframe src="https://video.example/embed/123"></iframe>
            <iframe src="blob:https://si.example/0000-1111.pdf"></iframe>
        </body></html>
    "#;

    #[test]
    fn test_discover_page() {
        let targets = discover(PAGE);
        let summary: Vec<_> = targets.iter().map(|t| (t.id.as_str(), t.kind, t.src.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                ("sujet-15a", TargetKind::Container, "/pdfs/15A/Sujet15A-Barrière automatique.pdf"),
                ("pdf-embed-2", TargetKind::Container, "/pdfs/04A/Sujet04A.pdf"),
                ("legacy", TargetKind::Iframe, "/pdfs/30A/Sujet30A.PDF"),
                ("pdf-embed-4", TargetKind::Iframe, "/viewer?doc=30B"),
            ]
        );
    }

    #[test]
    fn test_container_metadata() {
        let targets = discover(PAGE);
        assert_eq!(targets[0].title.as_deref(), Some("Barrière automatique"));
        assert_eq!(targets[0].author.as_deref(), Some("Académie"));
        assert_eq!(targets[1].title, None);
        assert_eq!(targets[1].author, None);
    }

    #[test]
    fn test_generated_ids_avoid_page_ids() {
        let html = r#"
            <div data-pdf-src="/a.pdf"></div>
            <div id="pdf-embed-1" data-pdf-src="/b.pdf"></div>
            <p id="pdf-embed-2"></p>
            <div data-pdf-src="/c.pdf"></div>
        "#;
        let ids: Vec<_> = discover(html).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["pdf-embed-3", "pdf-embed-1", "pdf-embed-4"]);
    }

    #[test]
    fn test_discover_empty_page() {
        assert!(discover("<html><body><p>Rien ici</p></body></html>").is_empty());
    }
}
