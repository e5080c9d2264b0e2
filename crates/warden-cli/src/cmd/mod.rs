pub mod chain;
pub mod dag;
pub mod failure;
pub mod gates;
pub mod session;
pub mod subagent;

use warden_core::session::{Session, SessionStore};

/// Persist session state, tolerating failure: the decision envelope is
/// authoritative, audit loss is not.
pub(crate) fn persist_session(store: &SessionStore, session: &Session) {
    if let Err(e) = store.save(session) {
        tracing::warn!(error = %e, "failed to persist session state");
    }
}
