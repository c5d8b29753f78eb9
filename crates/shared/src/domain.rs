use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(NodeId);
id_newtype!(BindingId);

/// Issues monotonically increasing identifiers. One counter per owner; the
/// mutex serializes callers on different threads.
#[derive(Debug)]
pub struct IdCounter {
    next: Mutex<i64>,
}

impl IdCounter {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: Mutex::new(first),
        }
    }

    pub fn next<T: From<i64>>(&self) -> T {
        let mut next = self.next.lock();
        let id = *next;
        *next += 1;
        T::from(id)
    }

    /// Moves the counter past `seen` so restored ids are never reissued.
    pub fn bump_past(&self, seen: i64) {
        let mut next = self.next.lock();
        if *next <= seen {
            *next = seen + 1;
        }
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
