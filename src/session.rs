//! Session ids: read once per proxy on the client, carried as the
//! `sessionId` cookie, and exposed to services through [`current`].

use uuid::Uuid;

pub const COOKIE_NAME: &str = "sessionId";

/// Supplies the caller's session id. [`Uuid::nil`] means "no session".
pub trait SessionSource: Send + Sync {
    fn current_session(&self) -> Uuid;
}

impl<F> SessionSource for F
where
    F: Fn() -> Uuid + Send + Sync,
{
    fn current_session(&self) -> Uuid {
        self()
    }
}

/// Never attaches a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

impl SessionSource for NoSession {
    fn current_session(&self) -> Uuid {
        Uuid::nil()
    }
}

pub(crate) fn cookie_header(session: Uuid) -> Option<String> {
    (!session.is_nil()).then(|| format!("{COOKIE_NAME}={session}"))
}

/// Picks `sessionId` out of a `Cookie` header. Anything unparseable is
/// treated as no session.
pub fn parse_cookie(header: &str) -> Option<Uuid> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .and_then(|(_, value)| Uuid::parse_str(value.trim().trim_matches('"')).ok())
}

tokio::task_local! {
    static CURRENT: Option<Uuid>;
}

/// Session id of the call being dispatched on this task, if the caller sent
/// one. Always `None` outside a dispatched call.
pub fn current() -> Option<Uuid> {
    CURRENT.try_with(|session| *session).ok().flatten()
}

pub(crate) async fn scope<F: std::future::Future>(session: Option<Uuid>, fut: F) -> F::Output {
    CURRENT.scope(session, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_only_sent_for_real_sessions() {
        assert_eq!(cookie_header(Uuid::nil()), None);

        let id = Uuid::new_v4();
        assert_eq!(cookie_header(id), Some(format!("sessionId={id}")));
    }

    #[test]
    fn parse_cookie_among_others() {
        let id = Uuid::new_v4();
        let header = format!("theme=dark; sessionId={id}; lang=en");
        assert_eq!(parse_cookie(&header), Some(id));
        assert_eq!(parse_cookie("sessionId=not-a-uuid"), None);
        assert_eq!(parse_cookie("other=1"), None);
        assert_eq!(parse_cookie(""), None);
    }

    #[tokio::test]
    async fn current_is_scoped_to_the_call() {
        let id = Uuid::new_v4();
        assert_eq!(current(), None);
        assert_eq!(scope(Some(id), async { current() }).await, Some(id));
        assert_eq!(scope(None, async { current() }).await, None);
        assert_eq!(current(), None);
    }
}
