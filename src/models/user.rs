use std::fmt;

pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKind {
    Local,
    Federated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub kind: UserKind,
}

impl User {
    pub fn local(username: impl Into<String>) -> Self {
        let id = username.into();
        Self {
            display_name: id.clone(),
            id,
            kind: UserKind::Local,
        }
    }

    pub fn federated(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: uid.into(),
            display_name: display_name.into(),
            kind: UserKind::Federated,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            f.write_str(&self.id)
        } else {
            f.write_str(&self.display_name)
        }
    }
}
