use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifier of a stored assignment record.
pub type AssignmentId = i64;

/// Identifier of a stored grading session record.
pub type SessionId = i64;

// Defines a new type that wraps a String for use as an ID.
macro_rules! idtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn from(s: String) -> Self {
                Self(s)
            }

            #[allow(dead_code)]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

idtype!(StudentId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_id_displays_inner_string() {
        let id = StudentId::from("STU-1-001".to_string());
        assert_eq!(id.to_string(), "STU-1-001");
        assert_eq!(id, StudentId::from("STU-1-001".to_string()));
    }
}
