use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, MAX_BIO_LEN, MAX_MESSAGE_LEN, MAX_USERNAME_LEN,
    MIN_PASSWORD_LEN,
};

// Fields default to empty so a missing input is reported as a validation
// error on the re-rendered form instead of a bare 422.

// -- Auth --

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub image_url: String,
}

impl SignupForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_email(&self.email, &mut errors);
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            ));
        }
        errors
    }

    pub fn image_url_or_default(&self) -> String {
        or_default(&self.image_url, DEFAULT_IMAGE_URL)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("Username is required.".to_string());
        }
        if self.password.is_empty() {
            errors.push("Password is required.".to_string());
        }
        errors
    }
}

// -- Profile --

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EditProfileForm {
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    /// Current password, re-checked before anything is changed.
    #[serde(skip_serializing)]
    pub password: String,
}

impl EditProfileForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_email(&self.email, &mut errors);
        if self.bio.chars().count() > MAX_BIO_LEN {
            errors.push(format!("Bio must be at most {MAX_BIO_LEN} characters."));
        }
        if self.password.is_empty() {
            errors.push("Enter your current password to confirm changes.".to_string());
        }
        errors
    }

    pub fn image_url_or_default(&self) -> String {
        or_default(&self.image_url, DEFAULT_IMAGE_URL)
    }

    pub fn header_image_url_or_default(&self) -> String {
        or_default(&self.header_image_url, DEFAULT_HEADER_IMAGE_URL)
    }
}

// -- Messages --

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MessageForm {
    pub text: String,
}

impl MessageForm {
    pub fn validate(&self) -> Vec<String> {
        let len = self.text.trim().chars().count();
        if len == 0 {
            vec!["Message text is required.".to_string()]
        } else if len > MAX_MESSAGE_LEN {
            vec![format!("Messages are limited to {MAX_MESSAGE_LEN} characters.")]
        } else {
            vec![]
        }
    }
}

// -- Search --

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    /// The search term, or `None` when absent or blank.
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

fn check_username(username: &str, errors: &mut Vec<String>) {
    let len = username.chars().count();
    if len == 0 {
        errors.push("Username is required.".to_string());
    } else if len > MAX_USERNAME_LEN {
        errors.push(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters."
        ));
    } else if username.chars().any(char::is_whitespace) {
        errors.push("Username cannot contain spaces.".to_string());
    }
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    if !EmailAddress::is_valid(email.trim()) {
        errors.push("Enter a valid email address.".to_string());
    }
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
