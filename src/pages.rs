//! HTML pages rendered with handlebars.

use axum::response::Html;
use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{JournalError, Result};

const LOGIN_TEMPLATE: &str = "login";
const JOURNAL_TEMPLATE: &str = "journal";

/// Everything the journal page shows.
#[derive(Debug, Default, Serialize)]
pub struct JournalView {
    pub identifier: String,
    pub text: String,
    pub max_chars: usize,
    pub success: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
}

impl JournalView {
    pub fn new(max_chars: usize) -> Self {
        JournalView {
            max_chars,
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct LoginView<'a> {
    error: Option<&'a str>,
}

/// Compiled templates, built once at startup.
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry
            .register_template_string(LOGIN_TEMPLATE, include_str!("./static/login.html"))
            .map_err(|e| JournalError::Template(e.to_string()))?;
        registry
            .register_template_string(JOURNAL_TEMPLATE, include_str!("./static/journal.html"))
            .map_err(|e| JournalError::Template(e.to_string()))?;
        Ok(Pages { registry })
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<Html<String>> {
        self.registry
            .render(name, data)
            .map(Html)
            .map_err(|e| JournalError::Template(e.to_string()))
    }

    pub fn login(&self, error: Option<&str>) -> Result<Html<String>> {
        self.render(LOGIN_TEMPLATE, &LoginView { error })
    }

    pub fn journal(&self, view: &JournalView) -> Result<Html<String>> {
        self.render(JOURNAL_TEMPLATE, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_shows_error() {
        let pages = Pages::new().unwrap();
        let Html(page) = pages.login(Some("Contraseña incorrecta.")).unwrap();
        assert!(page.contains("Contraseña incorrecta."));
        assert!(page.contains("name=\"password\""));

        let Html(page) = pages.login(None).unwrap();
        assert!(!page.contains("class=\"alert error\""));
    }

    #[test]
    fn journal_escapes_user_text() {
        let pages = Pages::new().unwrap();
        let mut view = JournalView::new(3000);
        view.identifier = "Ana".into();
        view.text = "<script>alert(1)</script>".into();
        let Html(page) = pages.journal(&view).unwrap();
        assert!(page.contains("value=\"Ana\""));
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("maxlength=\"3000\""));
    }

    #[test]
    fn journal_messages() {
        let pages = Pages::new().unwrap();
        let mut view = JournalView::new(3000);
        view.success = Some("Tu terapeuta ha recibido tu registro de forma segura".into());
        let Html(page) = pages.journal(&view).unwrap();
        assert!(page.contains("class=\"alert success\""));
        assert!(!page.contains("class=\"alert warning\""));
    }
}
