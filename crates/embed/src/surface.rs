//! The display element a target renders into.
//!
//! [`Surface`] is the narrow slice of the DOM the resolver needs: point the
//! frame at a source, ask whether anything rendered, and swap in fallback
//! markup. Containers also receive the viewer shell when mounted. [`HeadlessSurface`] implements it without a browser and records
//! everything done to it.

use crate::strategy::DeliveryStrategy;
use lectern_fetch::Url;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What the frame is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// An object URL over a fetched body of `size` bytes.
    Blob { url: String, size: usize },
    /// The document's own address.
    Remote(Url),
}

/// Result of introspecting a frame after it had time to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Rendered,
    /// The frame is readable but shows nothing.
    Empty,
    /// The frame cannot be read (cross-origin content).
    Denied,
}

/// Markup that replaces the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub strategy: DeliveryStrategy,
    pub html: String,
}

pub trait Surface: Send + Sync {
    /// Fill a container with the viewer shell (header, frame, actions).
    fn mount_shell(&self, html: &str);

    /// Point the frame at `source`, replacing whatever it showed.
    fn assign(&self, source: &Source);

    fn probe(&self) -> Probe;

    /// Hide the frame and insert `fallback` in its place.
    fn mount_fallback(&self, fallback: &Fallback);

    /// Text of the loading indicator; `None` hides it.
    fn set_notice(&self, notice: Option<&str>);

    /// Whether the element is still part of the page.
    fn is_attached(&self) -> bool;
}

#[derive(Debug, Default)]
struct Recorded {
    shell: Option<String>,
    sources: Vec<Source>,
    fallbacks: Vec<Fallback>,
    notice: Option<String>,
    probe: Option<Probe>,
    detached: bool,
}

/// Browser-less [`Surface`].
///
/// Unless a probe result is forced with [`with_probe`](Self::with_probe), the
/// probe is inferred from the current source: a non-empty blob renders, an
/// empty blob is empty, a remote document renders when it is on the page's
/// origin and is denied otherwise. A frame that was never assigned is empty.
#[derive(Debug)]
pub struct HeadlessSurface {
    origin: Url,
    recorded: Mutex<Recorded>,
}
impl HeadlessSurface {
    pub fn new(origin: Url) -> Self {
        Self { origin, recorded: Mutex::new(Recorded::default()) }
    }

    pub fn with_probe(self, probe: Probe) -> Self {
        self.lock().probe = Some(probe);
        self
    }

    /// Remove the element from the page.
    pub fn detach(&self) {
        self.lock().detached = true;
    }

    pub fn shell(&self) -> Option<String> {
        self.lock().shell.clone()
    }

    /// Every source assigned so far, oldest first.
    pub fn sources(&self) -> Vec<Source> {
        self.lock().sources.clone()
    }

    /// Every fallback inserted so far, oldest first.
    pub fn fallbacks(&self) -> Vec<Fallback> {
        self.lock().fallbacks.clone()
    }

    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // Recorded state stays consistent even if a holder panicked.
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
impl Surface for HeadlessSurface {
    fn mount_shell(&self, html: &str) {
        self.lock().shell = Some(html.to_string());
    }

    fn assign(&self, source: &Source) {
        self.lock().sources.push(source.clone());
    }

    fn probe(&self) -> Probe {
        let recorded = self.lock();
        if let Some(probe) = recorded.probe {
            return probe;
        }
        match recorded.sources.last() {
            Some(Source::Blob { size, .. }) if *size > 0 => Probe::Rendered,
            Some(Source::Remote(url)) if url.origin() == self.origin.origin() => Probe::Rendered,
            Some(Source::Remote(_)) => Probe::Denied,
            Some(Source::Blob { .. }) | None => Probe::Empty,
        }
    }

    fn mount_fallback(&self, fallback: &Fallback) {
        self.lock().fallbacks.push(fallback.clone());
    }

    fn set_notice(&self, notice: Option<&str>) {
        self.lock().notice = notice.map(str::to_string);
    }

    fn is_attached(&self) -> bool {
        !self.lock().detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn origin() -> Url {
        Url::parse("https://si.example/").unwrap()
    }

    #[rstest]
    #[case(None, Probe::Empty)]
    #[case(Some(Source::Blob { url: "blob:https://si.example/1".into(), size: 12 }), Probe::Rendered)]
    #[case(Some(Source::Blob { url: "blob:https://si.example/1".into(), size: 0 }), Probe::Empty)]
    #[case(Some(Source::Remote(Url::parse("https://si.example/a.pdf").unwrap())), Probe::Rendered)]
    #[case(Some(Source::Remote(Url::parse("https://cdn.example/a.pdf").unwrap())), Probe::Denied)]
    fn test_inferred_probe(#[case] source: Option<Source>, #[case] expected: Probe) {
        let surface = HeadlessSurface::new(origin());
        if let Some(source) = source {
            surface.assign(&source);
        }
        assert_eq!(surface.probe(), expected);
    }

    #[test]
    fn test_forced_probe_wins() {
        let surface = HeadlessSurface::new(origin()).with_probe(Probe::Denied);
        surface.assign(&Source::Blob { url: "blob:x".into(), size: 10 });
        assert_eq!(surface.probe(), Probe::Denied);
    }

    #[test]
    fn test_detach() {
        let surface = HeadlessSurface::new(origin());
        assert!(surface.is_attached());
        surface.detach();
        assert!(!surface.is_attached());
    }
}
