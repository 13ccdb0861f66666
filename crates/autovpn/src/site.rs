//! Target site description.
//!
//! A site is described entirely by data: where to log in, which elements to
//! fill and click, and where the generated profiles appear. Site files are
//! TOML, for example:
//!
//! ```toml
//! name = "utunnel"
//! url = "https://reseller.example/login"
//! profile_page = "https://reseller.example/add/user"
//! ready = { css = "form#bulk-add" }
//! result = { css = "textarea#profiles" }
//!
//! [login]
//! username = { css = "input[name=email]" }
//! password = { css = "input[name=password]" }
//! submit = { css = "button[type=submit]" }
//! success_url = "dashboard"
//!
//! [[form]]
//! locator = { css = "input[name=prefix]" }
//! value = "{prefix}"
//! ```

use crate::error::{AutoVpnError, Result};
use crate::utils::js_escape;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// How an element is found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

impl Locator {
    /// JavaScript expression evaluating to the element or `null`.
    /// Throws for an invalid selector, which callers turn into a
    /// structure mismatch.
    pub fn lookup_js(&self) -> String {
        match self {
            Locator::Css(sel) => format!("document.querySelector('{}')", js_escape(sel)),
            Locator::Xpath(xp) => format!(
                "document.evaluate('{}', document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_escape(xp)
            ),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(sel) => write!(f, "css `{}`", sel),
            Locator::Xpath(xp) => write!(f, "xpath `{}`", xp),
        }
    }
}

/// Login form of the target site.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: Locator,
    pub password: Locator,
    pub submit: Locator,
    /// Element that shows a login error, e.g. "invalid credentials".
    #[serde(default)]
    pub error: Option<Locator>,
    /// URL substring that proves the login went through.
    #[serde(default)]
    pub success_url: Option<String>,
    /// URL substring that means an earlier session is still valid, so the
    /// login steps can be skipped.
    #[serde(default)]
    pub logged_in_marker: Option<String>,
}

/// How the generated listing is read from the `result` element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultMode {
    /// Text of the element, or its value for inputs.
    #[default]
    Text,
    /// The element is a download link; the linked file is fetched within the
    /// logged-in page.
    Download,
}

/// One input on the generation form. `value` is a template.
#[derive(Debug, Clone, Deserialize)]
pub struct FormField {
    pub locator: Locator,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteOptions {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub login: Option<LoginForm>,
    #[serde(default)]
    pub profile_page: Option<String>,
    /// Present once the profile page has finished loading.
    pub ready: Locator,
    /// Numeric credit balance shown on the profile page.
    #[serde(default)]
    pub credit: Option<Locator>,
    #[serde(default)]
    pub form: Vec<FormField>,
    #[serde(default)]
    pub submit: Option<Locator>,
    /// Error banner shown when generation fails.
    #[serde(default)]
    pub failure: Option<Locator>,
    /// Element holding the generated listing, read according to
    /// `result_mode`.
    pub result: Locator,
    #[serde(default)]
    pub result_mode: ResultMode,
}

impl SiteOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| AutoVpnError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let site: SiteOptions =
            toml::from_str(content).map_err(|e| AutoVpnError::Config(e.to_string()))?;
        site.validate()?;
        Ok(site)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AutoVpnError::Config("site name must not be empty".into()));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(AutoVpnError::Config(format!(
                "site url must be http(s), got '{}'",
                self.url
            )));
        }
        Ok(())
    }

    pub fn requires_login(&self) -> bool {
        self.login.is_some()
    }
}
