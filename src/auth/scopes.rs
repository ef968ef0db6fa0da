//! OneRoster v1.2 OAuth scopes guarding the gradebook routes.

pub const SCOPE_PREFIX: &str = "https://purl.imsglobal.org/spec/or/v1p2/scope/";

pub const ROSTER_CORE_READONLY: &str = "https://purl.imsglobal.org/spec/or/v1p2/scope/roster-core.readonly";
pub const RESULTS_READONLY: &str = "https://purl.imsglobal.org/spec/or/v1p2/scope/results.readonly";
pub const RESULTS_CREATEPUT: &str = "https://purl.imsglobal.org/spec/or/v1p2/scope/results.createput";
pub const RESULTS_DELETE: &str = "https://purl.imsglobal.org/spec/or/v1p2/scope/results.delete";

/// The operation class a route performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Delete,
}

/// Scopes a resource type requires for each access class
#[derive(Debug, Clone, Copy)]
pub struct ScopeSet {
    pub read: &'static str,
    pub write: &'static str,
    pub delete: &'static str,
}

impl ScopeSet {
    pub fn required(&self, access: Access) -> &'static str {
        match access {
            Access::Read => self.read,
            Access::Write => self.write,
            Access::Delete => self.delete,
        }
    }
}
