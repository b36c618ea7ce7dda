//! HTML pages. Every page carries `user`, the logged-in username shown in
//! the navigation bar.

use askama::Template;
use axum::response::Html;

use crate::forms::FormErrors;

pub fn render<T: Template>(page: &T) -> Result<Html<String>, askama::Error> {
    page.render().map(Html)
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomePage {
    pub user: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage {
    pub user: Option<String>,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub user: Option<String>,
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "logged_out.html")]
pub struct LoggedOutPage {
    pub user: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub user: Option<String>,
    pub username: String,
    pub email: String,
    pub picture_url: String,
    pub date_joined: String,
}

#[derive(Template)]
#[template(path = "edit_profile.html")]
pub struct EditProfilePage {
    pub user: Option<String>,
    pub email: String,
    pub picture_url: String,
    pub has_custom_picture: bool,
    pub user_errors: FormErrors,
    pub profile_errors: FormErrors,
}

pub struct AdminRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub last_login: String,
    pub picture_url: String,
    pub is_self: bool,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminPage {
    pub user: Option<String>,
    pub rows: Vec<AdminRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub status: u16,
    pub message: String,
    pub user: Option<String>,
}

/// Formats timestamps the way every page shows them.
pub fn display_time(t: time::OffsetDateTime) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    t.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| t.to_string())
}
