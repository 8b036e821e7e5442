use crate::consts::MOBILE_UA_REGEX;

/// What the reader's browser can do with an inline PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub mobile: bool,
    /// A PDF viewer plugin is registered for `application/pdf`.
    pub pdf_plugin: bool,
}
impl Default for Capabilities {
    /// A desktop browser with a built-in viewer.
    fn default() -> Self {
        Self { mobile: false, pdf_plugin: true }
    }
}
impl Capabilities {
    pub fn detect(user_agent: &str, pdf_plugin: bool) -> Self {
        Self { mobile: MOBILE_UA_REGEX.is_match(user_agent), pdf_plugin }
    }

    /// Mobile browsers and browsers without a viewer get the plain link
    /// straight away; no inline strategy would show anything.
    pub fn needs_link_preview(&self) -> bool {
        self.mobile || !self.pdf_plugin
    }
}
