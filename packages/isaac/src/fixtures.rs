use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::Path;

/// An Isaac account the suite logs in with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
}

impl User {
    pub fn new(email: &str, firstname: &str, lastname: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            password: password.to_string(),
        }
    }
}

// Passwords stay out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<User: '{}' - '{}' '{}'>",
            self.email, self.firstname, self.lastname
        )
    }
}

/// One pre-existing account per role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestUsers {
    pub student: User,
    pub teacher: User,
    pub editor: User,
    pub event: User,
    pub admin: User,
}

/// The site's account roles, from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
    ContentEditor,
    EventManager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Teacher,
        Role::ContentEditor,
        Role::EventManager,
        Role::Admin,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::ContentEditor => "Content Editor",
            Role::EventManager => "Event Manager",
            Role::Admin => "Admin",
        })
    }
}

impl TestUsers {
    pub fn get(&self, role: Role) -> &User {
        match role {
            Role::Student => &self.student,
            Role::Teacher => &self.teacher,
            Role::ContentEditor => &self.editor,
            Role::EventManager => &self.event,
            Role::Admin => &self.admin,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading test users from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// The throwaway account created by SIGNUP and removed by DELETE_USER.
///
/// Tests that change its password record the change here so that later
/// tests log in with the current credentials.
#[derive(Debug)]
pub struct TempAccount {
    user: RefCell<User>,
    verify_link: RefCell<Option<String>>,
    pub new_email: String,
    pub new_password: String,
}

impl TempAccount {
    pub fn new(user: User, new_email: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            user: RefCell::new(user),
            verify_link: RefCell::new(None),
            new_email: new_email.into(),
            new_password: new_password.into(),
        }
    }

    pub fn user(&self) -> User {
        self.user.borrow().clone()
    }

    pub fn email(&self) -> String {
        self.user.borrow().email.clone()
    }

    pub fn set_email(&self, email: &str) {
        self.user.borrow_mut().email = email.to_string();
    }

    pub fn set_password(&self, password: &str) {
        self.user.borrow_mut().password = password.to_string();
    }

    /// Keeps the emailed verification link for a pending address change.
    pub fn set_verify_link(&self, link: String) {
        *self.verify_link.borrow_mut() = Some(link);
    }

    pub fn verify_link(&self) -> Option<String> {
        self.verify_link.borrow().clone()
    }
}
