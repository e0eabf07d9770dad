//! Per-session resolution state.
//!
//! A [`Session`] owns everything that outlives a single lookup: the
//! two-tier cache, the set of banned (domain, native identity) reports,
//! and the negotiated engine capabilities. Independent test sessions use
//! independent `Session` values and never share state.

use crate::cache::{CacheScope, ResolutionCache};
use crate::config::ResolverConfig;
use crate::engine::{Engine, EngineCapabilities};
use rekon_common::DomainName;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct Session {
    config: ResolverConfig,
    cache: ResolutionCache,
    banned: HashSet<(DomainName, String)>,
    capabilities: Option<EngineCapabilities>,
    surfaces_activated: bool,
}

impl Session {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResolutionCache {
        &mut self.cache
    }

    /// Start a new step: the operation scope is reset.
    pub fn begin_operation(&mut self) {
        self.cache.reset_operation();
    }

    /// Negotiate capabilities on first use; later calls reuse the answer.
    pub async fn capabilities<E: Engine + ?Sized>(&mut self, engine: &E) -> EngineCapabilities {
        if let Some(caps) = &self.capabilities {
            return caps.clone();
        }
        let caps = engine.capabilities().await;
        info!(
            find = caps.find,
            path_lookup = caps.path_lookup,
            surface_activation = caps.surface_activation,
            "engine capabilities negotiated"
        );
        self.capabilities = Some(caps.clone());
        caps
    }

    pub fn is_banned(&self, domain: DomainName, identity: &str) -> bool {
        self.banned.contains(&(domain, identity.to_string()))
    }

    pub fn ban(&mut self, domain: DomainName, identity: &str) {
        if self.banned.insert((domain, identity.to_string())) {
            debug!(%domain, identity, "domain report banned");
        }
    }

    pub fn banned_count(&self) -> usize {
        self.banned.len()
    }

    pub fn reset_domain_bans(&mut self) {
        self.banned.clear();
    }

    pub(crate) fn surfaces_activated(&self) -> bool {
        self.surfaces_activated
    }

    pub(crate) fn mark_surfaces_activated(&mut self) {
        self.surfaces_activated = true;
    }

    /// Release every cached handle.
    pub async fn clear<E: Engine + ?Sized>(&mut self, engine: &E) {
        self.cache.invalidate_all(CacheScope::Operation, engine).await;
        self.cache.invalidate_all(CacheScope::Application, engine).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bans_are_per_domain_and_resettable() {
        let mut session = Session::new(ResolverConfig::default());
        session.ban(DomainName::Win, "hwnd:10");
        assert!(session.is_banned(DomainName::Win, "hwnd:10"));
        assert!(!session.is_banned(DomainName::Net, "hwnd:10"));
        assert!(!session.is_banned(DomainName::Win, "hwnd:11"));

        session.reset_domain_bans();
        assert_eq!(session.banned_count(), 0);
    }

    #[test]
    fn sessions_do_not_share_bans() {
        let mut a = Session::default();
        let b = Session::default();
        a.ban(DomainName::Win, "hwnd:1");
        assert!(!b.is_banned(DomainName::Win, "hwnd:1"));
    }
}
