//! PDF embedding with a delivery fallback chain.
//!
//! Pages declare the documents they want shown (see [`discover`]). Each one
//! gets an [`EmbedController`] that a [`Resolver`] drives through the
//! [`DeliveryStrategy`] chain until something visible is on screen: a fetched
//! blob, the remote document itself, an object element with links, or, on
//! devices without an inline viewer, a plain link.

mod blob;
mod capabilities;
mod consts;
mod discover;
pub mod error;
mod markup;
mod page;
mod resolver;
mod strategy;
mod surface;
mod target;

pub use crate::blob::{BlobLease, BlobStore};
pub use crate::capabilities::Capabilities;
pub use crate::discover::discover;
pub use crate::markup::{Markup, Strings, render_viewer};
pub use crate::page::{Page, PageEvent};
pub use crate::resolver::{Attempt, AttemptOutcome, DEFAULT_VERIFY_DELAY, EmbedController, Resolver, State};
pub use crate::strategy::DeliveryStrategy;
pub use crate::surface::{Fallback, HeadlessSurface, Probe, Source, Surface};
pub use crate::target::{EmbedTarget, Header, TargetKind};
