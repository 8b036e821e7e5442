use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Page-defined containers. `data-pdf-src` is the only required attribute.
selector!(CONTAINER_SELECTOR, "[data-pdf-src]");
// Pre-existing frames; whether they point at a PDF is decided afterwards.
selector!(IFRAME_SELECTOR, "iframe[src]");
// Every id the page already uses; generated ids must avoid them.
selector!(ID_SELECTOR, "[id]");
regex!(MOBILE_UA_REGEX, r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini");

pub(crate) const PDF_MIME: &str = "application/pdf";
pub(crate) const DEFAULT_TITLE: &str = "Document PDF";
pub(crate) const DEFAULT_AUTHOR: &str = "SI Sujet 2025";
