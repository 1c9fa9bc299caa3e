//! User-Agent string shared by the portal and download clients.

const PROJECT_UA_URL: &str = "https://github.com/fierce/label-harvester";

/// Identifies the tool and crate version on every request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("label-harvester/{version} (+{PROJECT_UA_URL})")
}
