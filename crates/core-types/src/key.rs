use std::fmt;

use serde::{Deserialize, Serialize};

/// Acting identity on whose behalf decisions are requested.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource being checked.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: String,
    pub object_type: String,
}

impl ObjectRef {
    pub fn new(object_id: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            object_type: object_type.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// Opaque slot identifier for one `(object_id, object_type, subject_id)` tuple.
///
/// Each part is length-prefixed so distinct tuples can never render to the
/// same key, whatever characters the ids contain.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(object_id: &str, object_type: &str, subject_id: &SubjectId) -> Self {
        Self(format!(
            "{}:{}|{}:{}|{}:{}",
            object_type.len(),
            object_type,
            object_id.len(),
            object_id,
            subject_id.0.len(),
            subject_id.0
        ))
    }

    pub fn for_object(object: &ObjectRef, subject_id: &SubjectId) -> Self {
        Self::new(&object.object_id, &object.object_type, subject_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
