use axum::response::Html;
use axum_extra::extract::CookieJar;
use serde::Serialize;
use tera::{Context, Tera};

use warbler_types::models::Account;

use crate::error::AppError;
use crate::flash::{self, Flash};
use crate::state::AppState;

/// Every template, compiled into the binary.
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("macros.html", include_str!("../templates/macros.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("home-anon.html", include_str!("../templates/home-anon.html")),
    ("users/signup.html", include_str!("../templates/users/signup.html")),
    ("users/login.html", include_str!("../templates/users/login.html")),
    ("users/edit.html", include_str!("../templates/users/edit.html")),
    ("users/index.html", include_str!("../templates/users/index.html")),
    ("users/detail.html", include_str!("../templates/users/detail.html")),
    ("users/show.html", include_str!("../templates/users/show.html")),
    ("users/following.html", include_str!("../templates/users/following.html")),
    ("users/followers.html", include_str!("../templates/users/followers.html")),
    ("users/likes.html", include_str!("../templates/users/likes.html")),
    ("messages/new.html", include_str!("../templates/messages/new.html")),
    ("messages/show.html", include_str!("../templates/messages/show.html")),
];

pub fn load_templates() -> anyhow::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.iter().copied())?;
    Ok(tera)
}

/// A page about to be rendered: template, context, and any notices raised
/// while handling this same request.
pub struct Page {
    template: &'static str,
    context: Context,
    notices: Vec<Flash>,
}

impl Page {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            context: Context::new(),
            notices: Vec::new(),
        }
    }

    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        self.context.insert(key, value);
        self
    }

    pub fn notice(mut self, notice: Flash) -> Self {
        self.notices.push(notice);
        self
    }

    /// Form validation errors, shown as danger notices.
    pub fn errors(mut self, errors: Vec<String>) -> Self {
        self.notices.extend(errors.into_iter().map(Flash::danger));
        self
    }

    /// Renders the page, consuming notices queued by an earlier redirect.
    pub fn render(
        self,
        state: &AppState,
        jar: CookieJar,
        viewer: Option<&Account>,
    ) -> Result<(CookieJar, Html<String>), AppError> {
        let (jar, mut flashes) = flash::take(jar);
        flashes.extend(self.notices);

        let mut context = self.context;
        context.insert("flashes", &flashes);
        context.insert("current_user", &viewer);
        // Macros cannot see the outer context, so templates pass this along.
        context.insert("viewer_id", &viewer.map(|a| a.id));

        let html = state
            .templates
            .render(self.template, &context)
            .map_err(anyhow::Error::from)?;
        Ok((jar, Html(html)))
    }
}
