use authz_core_types::SubjectId;
use parking_lot::RwLock;

/// Supplies the acting subject. `None` means no session yet.
pub trait SubjectProvider: Send + Sync {
    fn current_subject(&self) -> Option<SubjectId>;
}

/// Fixed subject, e.g. from a CLI flag.
#[derive(Clone, Debug, Default)]
pub struct StaticSubject(Option<SubjectId>);

impl StaticSubject {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(Some(SubjectId::new(subject)))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl SubjectProvider for StaticSubject {
    fn current_subject(&self) -> Option<SubjectId> {
        self.0.clone()
    }
}

/// Mutable session subject updated on login and logout.
#[derive(Debug, Default)]
pub struct SessionSubject {
    current: RwLock<Option<SubjectId>>,
}

impl SessionSubject {
    pub fn new(subject: Option<SubjectId>) -> Self {
        Self {
            current: RwLock::new(subject),
        }
    }

    pub fn sign_in(&self, subject: SubjectId) {
        *self.current.write() = Some(subject);
    }

    pub fn sign_out(&self) {
        *self.current.write() = None;
    }
}

impl SubjectProvider for SessionSubject {
    fn current_subject(&self) -> Option<SubjectId> {
        self.current.read().clone()
    }
}
