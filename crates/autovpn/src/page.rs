use crate::engine::{Element, PageDriver, StepError};
use crate::site::Locator;
use crate::utils::js_escape;
use headless_chrome::Tab;
use std::sync::Arc;

/// Marker returned by the injected scripts when a locator cannot be
/// evaluated (bad CSS selector or XPath expression).
const INVALID_LOCATOR: &str = "__autovpn_invalid_locator__:";

/// Fetches the link target with the page's cookies and resolves to its body.
const FETCH_LINK_BODY: &str = r#"var href = el.href || el.getAttribute('href');
    if (!href) return '';
    return fetch(href, { credentials: 'include' }).then(function(r) {
        if (!r.ok) throw new Error('HTTP ' + r.status);
        return r.text();
    });"#;

/// Chrome tab driven through injected JavaScript.
pub(crate) struct SiteTab(pub(crate) Arc<Tab>);

impl SiteTab {
    pub(crate) fn new(tab: Arc<Tab>) -> Self {
        Self(tab)
    }

    // ── Low-level JS evaluation helpers ──────────────────────────────────

    /// Evaluates JS and returns the string result, or `None` if null/undefined.
    /// With `await_promise` a returned promise is resolved first.
    fn eval_string(&self, js: &str, await_promise: bool) -> anyhow::Result<Option<String>> {
        Ok(self
            .0
            .evaluate(js, await_promise)?
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    /// Wraps `body` so that `el` holds the located element. Lookup failures
    /// come back as the invalid-locator marker.
    fn with_element(locator: &Locator, body: &str) -> String {
        format!(
            r#"(function() {{
    var el;
    try {{
        el = {lookup};
    }} catch (e) {{
        return '{marker}' + e.message;
    }}
    if (!el) return null;
    {body}
}})()"#,
            lookup = locator.lookup_js(),
            marker = INVALID_LOCATOR,
            body = body,
        )
    }

    /// Runs `body` against the element and classifies the outcome.
    fn run_on(&self, locator: &Locator, body: &str) -> Result<Option<String>, StepError> {
        self.run_script(locator, body, false)
    }

    fn run_script(
        &self,
        locator: &Locator,
        body: &str,
        await_promise: bool,
    ) -> Result<Option<String>, StepError> {
        let js = Self::with_element(locator, body);
        let out = self
            .eval_string(&js, await_promise)
            .map_err(|e| StepError::not_ready(format!("script failed on {}: {}", locator, e)))?;
        match out {
            Some(s) if s.starts_with(INVALID_LOCATOR) => Err(StepError::structure(format!(
                "{} is not a valid locator: {}",
                locator,
                &s[INVALID_LOCATOR.len()..]
            ))),
            other => Ok(other),
        }
    }

    fn act(&self, locator: &Locator, body: &str) -> Result<(), StepError> {
        match self.run_on(locator, body)? {
            Some(_) => Ok(()),
            None => Err(StepError::not_ready(format!("{} not present", locator))),
        }
    }
}

impl PageDriver for SiteTab {
    fn navigate(&self, url: &str) -> Result<(), StepError> {
        self.0
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| StepError::not_ready(format!("navigation to {} failed: {}", url, e)))
    }

    fn current_url(&self) -> String {
        self.0.get_url()
    }

    fn inspect(&self, locator: &Locator) -> Result<Option<Element>, StepError> {
        let body = r#"var text = (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.tagName === 'SELECT')
        ? el.value
        : (el.innerText || el.textContent || '');
    var visible = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    return (visible ? '1' : '0') + text;"#;

        Ok(self.run_on(locator, body)?.map(|raw| {
            let mut chars = raw.chars();
            let visible = chars.next() == Some('1');
            Element {
                text: chars.as_str().to_string(),
                visible,
            }
        }))
    }

    /// Sets the value and dispatches input/change events so framework-bound
    /// forms notice the change.
    fn fill(&self, locator: &Locator, value: &str) -> Result<(), StepError> {
        let body = format!(
            r#"el.focus();
    el.value = '{}';
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return 'ok';"#,
            js_escape(value)
        );
        self.act(locator, &body)
    }

    fn click(&self, locator: &Locator) -> Result<(), StepError> {
        self.act(locator, "el.click(); return 'ok';")
    }

    fn fetch_link(&self, locator: &Locator) -> Result<Option<String>, StepError> {
        self.run_script(locator, FETCH_LINK_BODY, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_guards_lookup_and_embeds_body() {
        let js = SiteTab::with_element(&Locator::Css("#x".into()), "return 'ok';");
        assert!(js.contains("try {"));
        assert!(js.contains("el = document.querySelector('#x');"));
        assert!(js.contains(INVALID_LOCATOR));
        assert!(js.contains("if (!el) return null;"));
        assert!(js.trim_end().ends_with("})()"));
    }

    #[test]
    fn link_fetch_keeps_the_session_cookies() {
        let js = SiteTab::with_element(&Locator::Css("a.csv".into()), FETCH_LINK_BODY);
        assert!(js.contains("credentials: 'include'"));
        assert!(js.contains("return r.text();"));
    }

    #[test]
    fn xpath_lookup_is_wrapped_too() {
        let js = SiteTab::with_element(&Locator::Xpath("//a[@id='go']".into()), "return 1;");
        assert!(js.contains(r"document.evaluate('//a[@id=\'go\']'"));
    }
}
