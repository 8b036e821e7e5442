//! A page: its controllers, their concurrent resolution and their lifetime.

use crate::discover::discover;
use crate::error::Result;
use crate::resolver::{EmbedController, Resolver, State};
use crate::surface::Surface;
use crate::target::{EmbedTarget, TargetKind};
use futures::future::join_all;
use futures::{Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use tracing::instrument;

/// Structural changes the page reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The element with this id was removed from the page.
    Detached(String),
    /// The page is going away.
    Unload,
}

/// Every embed on one page, sharing one [`Resolver`].
pub struct Page {
    resolver: Arc<Resolver>,
    controllers: Vec<Arc<EmbedController>>,
}
impl Page {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver, controllers: Vec::new() }
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn controllers(&self) -> &[Arc<EmbedController>] {
        &self.controllers
    }

    pub fn controller(&self, id: &str) -> Option<&Arc<EmbedController>> {
        self.controllers.iter().find(|c| c.target().id == id)
    }

    /// Take ownership of `target`, which renders into `surface`. Containers
    /// get the viewer shell; stand-alone frames are used as they are.
    pub fn mount(&mut self, target: EmbedTarget, surface: Arc<dyn Surface>) -> Result<Arc<EmbedController>> {
        let controller = Arc::new(self.resolver.controller(target, surface)?);
        let target = controller.target();
        if target.kind == TargetKind::Container {
            match self.resolver.markup().viewer(target) {
                Ok(html) => controller.surface().mount_shell(&html),
                Err(err) => tracing::warn!(id = %target.id, error = %err, "Viewer shell failed to render"),
            }
        }
        self.controllers.push(controller.clone());
        Ok(controller)
    }

    /// Discover the targets of `html` and mount each on the surface built for
    /// it. Targets whose source cannot be resolved are skipped.
    #[instrument(skip_all, fields(html_size = html.len()))]
    pub fn mount_html<F>(&mut self, html: &str, mut surface_for: F) -> usize
    where
        F: FnMut(&EmbedTarget) -> Arc<dyn Surface>,
    {
        let mut mounted = 0;
        for target in discover(html) {
            let surface = surface_for(&target);
            let id = target.id.clone();
            match self.mount(target, surface) {
                Ok(_) => mounted += 1,
                Err(err) => tracing::warn!(%id, error = %err, "Skipping embed target"),
            }
        }
        mounted
    }

    /// Resolve every controller concurrently. Each chain stays sequential.
    pub async fn resolve_all(&self) -> Vec<State> {
        join_all(self.controllers.iter().map(|controller| self.resolver.resolve(controller))).await
    }

    /// Release object URLs as elements leave the page.
    ///
    /// Runs until [`PageEvent::Unload`] (releasing whatever is left) or the
    /// end of the stream. Returns how many object URLs were released.
    #[instrument(skip_all)]
    pub async fn watch(&self, events: impl Stream<Item = PageEvent>) -> usize {
        let mut events = pin!(events);
        let mut released = 0;
        while let Some(event) = events.next().await {
            match event {
                PageEvent::Detached(id) => {
                    let Some(controller) = self.controller(&id) else {
                        tracing::trace!(%id, "Detached element is not an embed");
                        continue;
                    };
                    if controller.release().await {
                        released += 1;
                    }
                },
                PageEvent::Unload => {
                    released += self.release_all().await;
                    tracing::debug!(released, "Page unloaded");
                    break;
                },
            }
        }
        released
    }

    /// Release every object URL still held. Returns how many were released.
    pub async fn release_all(&self) -> usize {
        let mut released = 0;
        for controller in &self.controllers {
            if controller.release().await {
                released += 1;
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Strings;
    use crate::strategy::DeliveryStrategy;
    use crate::surface::HeadlessSurface;
    use futures::stream;
    use lectern_fetch::{MockFetcher, MockOutcome, RequestMode, Url};
    use std::collections::HashMap;
    use std::time::Duration;

    const PAGE: &str = r#"
        <div id="a" data-pdf-src="/pdfs/04A/Sujet04A.pdf"></div>
        <div id="b" data-pdf-src="/pdfs/04B/Sujet04B.pdf"></div>
        <div id="c" data-pdf-src="/pdfs/04C/Sujet04C.pdf"></div>
    "#;

    fn base() -> Url {
        Url::parse("https://si.example/projet_04A.html").unwrap()
    }

    fn page(fetcher: MockFetcher) -> (Page, HashMap<String, Arc<HeadlessSurface>>) {
        let resolver = Resolver::new(Arc::new(fetcher), base(), Strings::default())
            .unwrap()
            .with_verify_delay(Duration::from_millis(10));
        let mut page = Page::new(Arc::new(resolver));
        let mut surfaces = HashMap::new();
        page.mount_html(PAGE, |target| {
            let surface = Arc::new(HeadlessSurface::new(base()));
            surfaces.insert(target.id.clone(), surface.clone());
            surface as Arc<dyn Surface>
        });
        (page, surfaces)
    }

    fn fetcher() -> MockFetcher {
        MockFetcher::default()
            .with_response("https://si.example/pdfs/04A/Sujet04A.pdf", 200, "%PDF-a")
            .with_response("https://si.example/pdfs/04B/Sujet04B.pdf", 200, "%PDF-b")
            .with_outcome("https://si.example/pdfs/04C/Sujet04C.pdf", None::<RequestMode>, MockOutcome::Opaque)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_all() {
        let (page, surfaces) = page(fetcher());
        assert_eq!(page.controllers().len(), 3);

        let states = page.resolve_all().await;
        assert_eq!(
            states,
            vec![
                State::Verified(DeliveryStrategy::CorsFetchBlob),
                State::Verified(DeliveryStrategy::CorsFetchBlob),
                State::Terminal(DeliveryStrategy::NativeObjectElement),
            ]
        );
        assert_eq!(surfaces["c"].fallbacks().len(), 1);
        assert_eq!(page.resolver().blobs().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_releases_on_detach_then_unload() {
        let (page, _surfaces) = page(fetcher());
        page.resolve_all().await;

        let events = stream::iter([
            PageEvent::Detached("b".into()),
            PageEvent::Detached("b".into()),
            PageEvent::Detached("not-an-embed".into()),
            PageEvent::Unload,
            PageEvent::Detached("a".into()),
        ]);
        assert_eq!(page.watch(events).await, 3);
        assert!(page.resolver().blobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_released_before_detach_or_unload() {
        let (page, _surfaces) = page(fetcher());
        page.resolve_all().await;

        assert_eq!(page.watch(stream::iter([PageEvent::Detached("a".into())])).await, 1);
        assert_eq!(page.resolver().blobs().len(), 2);
        assert!(page.controller("b").unwrap().blob_url().await.is_some());
    }

    #[test]
    fn test_containers_get_viewer_shell() {
        let (_page, surfaces) = page(fetcher());
        let shell = surfaces["a"].shell().unwrap();
        assert!(shell.contains(r#"id="a""#));
        assert!(shell.contains("par SI Sujet 2025"));

        let resolver = Resolver::new(Arc::new(MockFetcher::default()), base(), Strings::default()).unwrap();
        let mut page = Page::new(Arc::new(resolver));
        let surface = Arc::new(HeadlessSurface::new(base()));
        let frame = EmbedTarget::new("legacy", "/pdfs/30A/Sujet30A.pdf").with_kind(TargetKind::Iframe);
        page.mount(frame, surface.clone()).unwrap();
        assert_eq!(surface.shell(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_before_resolve_keeps_other_embeds() {
        let fetcher = MockFetcher::default()
            .with_response("https://si.example/a.pdf", 200, "%PDF-a")
            .with_response("https://si.example/b.pdf", 200, "%PDF-b");
        let resolver = Resolver::new(Arc::new(fetcher), base(), Strings::default())
            .unwrap()
            .with_verify_delay(Duration::from_millis(10));
        let mut page = Page::new(Arc::new(resolver));
        let html = r#"<div data-pdf-src="/a.pdf"></div><div id="pdf-embed-1" data-pdf-src="/b.pdf"></div>"#;
        page.mount_html(html, |_| Arc::new(HeadlessSurface::new(base())) as Arc<dyn Surface>);

        assert_eq!(page.watch(stream::iter([PageEvent::Detached("pdf-embed-1".into())])).await, 0);
        let states = page.resolve_all().await;
        assert_eq!(states, vec![State::Verified(DeliveryStrategy::CorsFetchBlob), State::Unresolved]);

        let a = page.controllers().iter().find(|c| c.target().src == "/a.pdf").unwrap();
        assert_eq!(a.target().id, "pdf-embed-2");
        assert!(a.blob_url().await.is_some());
        assert_eq!(page.resolver().blobs().len(), 1);
    }

    #[tokio::test]
    async fn test_mount_html_skips_unresolvable_sources() {
        let resolver = Resolver::new(Arc::new(MockFetcher::default()), base(), Strings::default()).unwrap();
        let mut page = Page::new(Arc::new(resolver));
        let html = r#"<div data-pdf-src="http://[::1"></div><div data-pdf-src="/ok.pdf"></div>"#;
        assert_eq!(page.mount_html(html, |_| Arc::new(HeadlessSurface::new(base())) as Arc<dyn Surface>), 1);
    }
}
