use crate::engine::{Engine, ObjectHandle};
use crate::session::Session;
use rekon_common::DomainName;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Restrictions on top-level window enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowQuery<'a> {
    /// Only this domain, from `Domain=` or a prefixed type name.
    pub domain: Option<DomainName>,
    /// Only windows of the process with this name.
    pub process: Option<&'a str>,
    /// Popups may only be discoverable once extra surfaces are active.
    pub menu_search: bool,
}

#[derive(Debug)]
struct Report {
    handle: ObjectHandle,
    domain: DomainName,
    identity: Option<String>,
}

/// Candidate top-level windows across enabled domains, in precedence
/// order, owned windows following their owner, one report per native
/// window.
pub async fn top_windows<E: Engine + ?Sized>(
    engine: &E,
    session: &mut Session,
    query: &WindowQuery<'_>,
) -> Vec<ObjectHandle> {
    let mut windows = enumerate(engine, session, query).await;
    if query.menu_search && activate_surfaces(engine, session).await {
        windows = enumerate(engine, session, query).await;
    }
    windows
}

/// Force-activate extra technology surfaces, at most once per session.
/// Returns true when the engine activated anything new.
pub async fn activate_surfaces<E: Engine + ?Sized>(engine: &E, session: &mut Session) -> bool {
    let caps = session.capabilities(engine).await;
    if !caps.surface_activation
        || !session.config().search.activate_surfaces
        || session.surfaces_activated()
    {
        return false;
    }
    session.mark_surfaces_activated();

    match engine.activate_surfaces().await {
        Ok(count) => {
            info!(count, "technology surfaces activated");
            count > 0
        }
        Err(e) => {
            warn!(error = %e, "surface activation failed");
            false
        }
    }
}

async fn enabled_domains<E: Engine + ?Sized>(
    engine: &E,
    session: &Session,
    query: &WindowQuery<'_>,
) -> Vec<DomainName> {
    let available = match engine.domains().await {
        Ok(available) => available,
        Err(e) => {
            warn!(error = %e, "domain listing failed");
            return Vec::new();
        }
    };

    match query.domain {
        Some(want) if available.contains(&want) => vec![want],
        Some(want) => {
            debug!(domain = %want, "requested domain not available");
            Vec::new()
        }
        None => session
            .config()
            .enabled_domains
            .iter()
            .copied()
            .filter(|d| available.contains(d))
            .collect(),
    }
}

async fn enumerate<E: Engine + ?Sized>(
    engine: &E,
    session: &mut Session,
    query: &WindowQuery<'_>,
) -> Vec<ObjectHandle> {
    let mut reports = Vec::new();

    for domain in enabled_domains(engine, session, query).await {
        let windows = match engine.top_windows(domain).await {
            Ok(windows) => windows,
            Err(e) => {
                warn!(%domain, error = %e, "window enumeration failed");
                continue;
            }
        };
        for window in windows {
            let window = window.or_domain(Some(domain));
            let owned = owned_windows(engine, &window, domain).await;
            reports.push(report(engine, window, domain).await);
            for handle in owned {
                reports.push(report(engine, handle, domain).await);
            }
        }
    }

    if let Some(process) = query.process {
        let mut kept = Vec::with_capacity(reports.len());
        for r in reports {
            match engine.process_name(&r.handle).await {
                Ok(Some(name)) if name.eq_ignore_ascii_case(process) => kept.push(r),
                _ => {}
            }
        }
        reports = kept;
    }

    dedup(session, reports)
}

async fn report<E: Engine + ?Sized>(engine: &E, handle: ObjectHandle, domain: DomainName) -> Report {
    let identity = engine.native_identity(&handle).await.ok().flatten();
    Report {
        handle,
        domain,
        identity,
    }
}

/// Owned windows sharing the owner's communication context, tagged with
/// the owner's domain. Cross-context owned windows are false positives.
async fn owned_windows<E: Engine + ?Sized>(
    engine: &E,
    owner: &ObjectHandle,
    domain: DomainName,
) -> Vec<ObjectHandle> {
    let owned = match engine.owned_windows(owner).await {
        Ok(owned) if !owned.is_empty() => owned,
        Ok(_) => return Vec::new(),
        Err(e) => {
            debug!(id = owner.id, error = %e, "owned window enumeration failed");
            return Vec::new();
        }
    };
    let Ok(owner_context) = engine.context_id(owner).await else {
        return Vec::new();
    };

    let mut accepted = Vec::new();
    for handle in owned {
        match engine.context_id(&handle).await {
            Ok(context) if context == owner_context => {
                accepted.push(ObjectHandle::new(handle.id, Some(domain)));
            }
            Ok(context) => {
                debug!(id = handle.id, %context, owner = %owner_context, "owned window rejected");
            }
            Err(_) => {}
        }
    }
    accepted
}

/// One report per native identity: the more specific domain wins, equal
/// specificity keeps the first by precedence. A losing generic report is
/// banned for the rest of the session.
fn dedup(session: &mut Session, reports: Vec<Report>) -> Vec<ObjectHandle> {
    let mut kept: Vec<Report> = Vec::with_capacity(reports.len());
    let mut by_identity: HashMap<String, usize> = HashMap::new();
    let mut ids = HashSet::new();

    for r in reports {
        if !ids.insert(r.handle.id) {
            continue;
        }
        let Some(identity) = r.identity.clone() else {
            kept.push(r);
            continue;
        };
        if session.is_banned(r.domain, &identity) {
            debug!(domain = %r.domain, identity = identity.as_str(), "skipping banned report");
            continue;
        }

        let Some(slot) = by_identity.get(&identity).copied() else {
            by_identity.insert(identity, kept.len());
            kept.push(r);
            continue;
        };
        let existing = kept[slot].domain;
        if r.domain.specificity() > existing.specificity() {
            if existing.is_generic() {
                session.ban(existing, &identity);
            }
            kept[slot] = r;
        } else if r.domain.specificity() < existing.specificity() && r.domain.is_generic() {
            session.ban(r.domain, &identity);
        }
    }

    kept.into_iter().map(|r| r.handle).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: u64, domain: DomainName, identity: Option<&str>) -> Report {
        Report {
            handle: ObjectHandle::new(id, Some(domain)),
            domain,
            identity: identity.map(str::to_string),
        }
    }

    #[test]
    fn specific_domain_wins_and_generic_is_banned() {
        let mut session = Session::default();
        let kept = dedup(
            &mut session,
            vec![
                r(1, DomainName::Win, Some("hwnd:7")),
                r(2, DomainName::Net, Some("hwnd:7")),
                r(3, DomainName::Win, Some("hwnd:8")),
            ],
        );
        let ids: Vec<_> = kept.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(session.is_banned(DomainName::Win, "hwnd:7"));
        assert!(!session.is_banned(DomainName::Win, "hwnd:8"));
    }

    #[test]
    fn banned_reports_stay_out() {
        let mut session = Session::default();
        session.ban(DomainName::Win, "hwnd:7");
        let kept = dedup(&mut session, vec![r(1, DomainName::Win, Some("hwnd:7"))]);
        assert!(kept.is_empty());
    }

    #[test]
    fn equal_specificity_keeps_first() {
        let mut session = Session::default();
        let kept = dedup(
            &mut session,
            vec![
                r(1, DomainName::Java, Some("hwnd:1")),
                r(2, DomainName::Swt, Some("hwnd:1")),
                r(3, DomainName::Html, None),
            ],
        );
        let ids: Vec<_> = kept.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(session.banned_count(), 0);
    }
}
