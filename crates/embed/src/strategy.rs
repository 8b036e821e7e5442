//! Delivery strategies, in the order they are attempted.

use derive_more::Display;
use lectern_fetch::RequestMode;

/// One way of getting a PDF in front of the reader.
///
/// Variants are declared in priority order, so `Ord` is attempt order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeliveryStrategy {
    #[display("cors-fetch-blob")]
    CorsFetchBlob,
    #[display("no-cors-fetch-blob")]
    NoCorsFetchBlob,
    #[display("same-origin-fetch-blob")]
    SameOriginFetchBlob,
    #[display("direct-src-iframe")]
    DirectSrcIframe,
    #[display("native-object-element")]
    NativeObjectElement,
    #[display("plain-link-fallback")]
    PlainLinkFallback,
}
impl DeliveryStrategy {
    /// Strategies that fetch the document and hand the frame an object URL.
    pub const NETWORK: [Self; 3] = [Self::CorsFetchBlob, Self::NoCorsFetchBlob, Self::SameOriginFetchBlob];

    /// The request mode a network strategy fetches with.
    pub fn request_mode(&self) -> Option<RequestMode> {
        match self {
            Self::CorsFetchBlob => Some(RequestMode::Cors),
            Self::NoCorsFetchBlob => Some(RequestMode::NoCors),
            Self::SameOriginFetchBlob => Some(RequestMode::SameOrigin),
            _ => None,
        }
    }

    /// Whether this strategy is a final, always-renderable fallback.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NativeObjectElement | Self::PlainLinkFallback)
    }
}
