//! Time domains and the provider chain that decides which one an object uses.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bbt::Bbt;
use crate::map::TempoMap;

/// Which timeline a position is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDomain {
    #[default]
    Sample,
    Musical,
}

impl TimeDomain {
    fn encode(domain: Option<TimeDomain>) -> u8 {
        match domain {
            None => 0,
            Some(TimeDomain::Sample) => 1,
            Some(TimeDomain::Musical) => 2,
        }
    }

    fn decode(raw: u8) -> Option<TimeDomain> {
        match raw {
            1 => Some(TimeDomain::Sample),
            2 => Some(TimeDomain::Musical),
            _ => None,
        }
    }
}

pub trait TimeDomainProvider {
    fn time_domain(&self) -> TimeDomain;
}

pub type SharedDomainProvider = Arc<dyn TimeDomainProvider + Send + Sync>;

/// A provider with an optional domain of its own and an optional parent.
///
/// Answers with its own domain when set, else asks the parent, else falls
/// back to [`TimeDomain::Sample`]. The own domain can be changed through a
/// shared reference from any thread.
#[derive(Default)]
pub struct DomainProvider {
    own: AtomicU8,
    parent: Option<SharedDomainProvider>,
}

impl DomainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(domain: TimeDomain) -> Self {
        let provider = Self::new();
        provider.set_time_domain(domain);
        provider
    }

    pub fn with_parent(parent: SharedDomainProvider) -> Self {
        Self {
            own: AtomicU8::new(0),
            parent: Some(parent),
        }
    }

    pub fn set_time_domain(&self, domain: TimeDomain) {
        self.own
            .store(TimeDomain::encode(Some(domain)), Ordering::Release);
    }

    /// Drops the own domain so the parent decides again.
    pub fn clear_time_domain(&self) {
        self.own.store(TimeDomain::encode(None), Ordering::Release);
    }

    pub fn own_time_domain(&self) -> Option<TimeDomain> {
        TimeDomain::decode(self.own.load(Ordering::Acquire))
    }

    pub fn has_own_time_domain(&self) -> bool {
        self.own_time_domain().is_some()
    }

    pub fn parent(&self) -> Option<&SharedDomainProvider> {
        self.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: Option<SharedDomainProvider>) {
        self.parent = parent;
    }
}

impl TimeDomainProvider for DomainProvider {
    fn time_domain(&self) -> TimeDomain {
        self.own_time_domain()
            .or_else(|| self.parent.as_ref().map(|parent| parent.time_domain()))
            .unwrap_or_default()
    }
}

impl fmt::Debug for DomainProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainProvider")
            .field("own", &self.own_time_domain())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// A position in either domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePosition {
    Sample(i64),
    Musical(Bbt),
}

impl TimePosition {
    pub fn domain(&self) -> TimeDomain {
        match self {
            TimePosition::Sample(_) => TimeDomain::Sample,
            TimePosition::Musical(_) => TimeDomain::Musical,
        }
    }
}

impl From<Bbt> for TimePosition {
    fn from(bbt: Bbt) -> Self {
        TimePosition::Musical(bbt)
    }
}

impl TempoMap {
    /// Expresses `position` in `domain`, converting only when the domains
    /// differ.
    pub fn resolve(&self, position: TimePosition, domain: TimeDomain) -> TimePosition {
        match (position, domain) {
            (TimePosition::Musical(bbt), TimeDomain::Sample) => {
                TimePosition::Sample(self.musical_to_sample(bbt))
            }
            (TimePosition::Sample(sample), TimeDomain::Musical) => {
                TimePosition::Musical(self.sample_to_musical(sample))
            }
            (unchanged, _) => unchanged,
        }
    }

    pub fn to_sample(&self, position: TimePosition) -> i64 {
        match position {
            TimePosition::Sample(sample) => sample,
            TimePosition::Musical(bbt) => self.musical_to_sample(bbt),
        }
    }

    pub fn to_musical(&self, position: TimePosition) -> Bbt {
        match position {
            TimePosition::Sample(sample) => self.sample_to_musical(sample),
            TimePosition::Musical(bbt) => bbt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_sample_domain() {
        assert_eq!(DomainProvider::new().time_domain(), TimeDomain::Sample);
        assert!(!DomainProvider::new().has_own_time_domain());
    }

    #[test]
    fn own_domain_wins_over_parent() {
        let parent: SharedDomainProvider = Arc::new(DomainProvider::with_domain(TimeDomain::Musical));
        let child = DomainProvider::with_parent(parent);
        assert_eq!(child.time_domain(), TimeDomain::Musical);

        child.set_time_domain(TimeDomain::Sample);
        assert_eq!(child.time_domain(), TimeDomain::Sample);
        assert_eq!(child.own_time_domain(), Some(TimeDomain::Sample));

        child.clear_time_domain();
        assert_eq!(child.time_domain(), TimeDomain::Musical);
    }

    #[test]
    fn chain_follows_parent_changes() {
        let root = Arc::new(DomainProvider::new());
        let middle: SharedDomainProvider = Arc::new(DomainProvider::with_parent(root.clone()));
        let leaf = DomainProvider::with_parent(middle);
        assert_eq!(leaf.time_domain(), TimeDomain::Sample);

        root.set_time_domain(TimeDomain::Musical);
        assert_eq!(leaf.time_domain(), TimeDomain::Musical);
    }

    #[test]
    fn detaching_parent_falls_back() {
        let parent: SharedDomainProvider = Arc::new(DomainProvider::with_domain(TimeDomain::Musical));
        let mut child = DomainProvider::with_parent(parent);
        child.set_parent(None);
        assert_eq!(child.time_domain(), TimeDomain::Sample);
        assert!(child.parent().is_none());
    }

    #[test]
    fn positions_convert_between_domains() {
        let map = TempoMap::default();
        let bar_two = Bbt::new(2, 1, 0).unwrap();
        assert_eq!(
            map.resolve(bar_two.into(), TimeDomain::Sample),
            TimePosition::Sample(96_000)
        );
        assert_eq!(
            map.resolve(TimePosition::Sample(96_000), TimeDomain::Musical),
            TimePosition::Musical(bar_two)
        );
        assert_eq!(
            map.resolve(TimePosition::Sample(5), TimeDomain::Sample),
            TimePosition::Sample(5)
        );
        assert_eq!(map.to_sample(bar_two.into()), 96_000);
        assert_eq!(map.to_musical(TimePosition::Sample(48_000)), Bbt::new(1, 3, 0).unwrap());
        assert_eq!(TimePosition::Sample(0).domain(), TimeDomain::Sample);
    }
}
