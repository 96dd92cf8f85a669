//! Session handles, principals and caller identity.
//!
//! A caller's identity is an explicit token threaded through call
//! chains, not an ambient thread lookup, so reentrant checkout works
//! the same under OS threads, task schedulers or tests.

use std::fmt;
use std::sync::Mutex;

use uuid::Uuid;

/// An authenticated user of the storage core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: String,
    dba: bool,
}

impl Principal {
    /// An ordinary principal.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dba: false,
        }
    }

    /// A principal with the administrative role, which gates service
    /// mode and other privileged operations.
    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dba: true,
        }
    }

    /// The principal's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the principal carries the administrative role.
    pub fn is_admin(&self) -> bool {
        self.dba
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Opaque caller-identity token for reentrant checkout.
///
/// Two `get` calls with the same token receive the same session; a
/// fresh token is a distinct caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(Uuid);

impl CallerId {
    /// A fresh caller identity.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One caller's exclusive access path into the storage engine.
///
/// Owned by the pool; bound to a principal while checked out.
pub struct Session {
    id: Uuid,
    principal: Mutex<Option<Principal>>,
}

impl Session {
    pub(crate) fn create() -> Self {
        Self {
            id: Uuid::new_v4(),
            principal: Mutex::new(None),
        }
    }

    /// Stable identity of this session handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The principal the session is currently bound to.
    pub fn principal(&self) -> Option<Principal> {
        self.principal.lock().unwrap().clone()
    }

    pub(crate) fn bind(&self, principal: Principal) {
        *self.principal.lock().unwrap() = Some(principal);
    }

    pub(crate) fn unbind(&self) {
        *self.principal.lock().unwrap() = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("principal", &self.principal())
            .finish()
    }
}
