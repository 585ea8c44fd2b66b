//! Activation strategies and the registry mapping strategy names to them.
//!
//! A [`Strategy`] is instantiated once per gate from the parameters of a
//! [`crate::model::StrategyRef`] and yields a [`Predicate`] over the runtime
//! context. The built-in set matches the names and semantics the toggle
//! service ships with.

use crate::model::Context;
use md5::{Digest, Md5};
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// A compiled gate: evaluates a runtime context to a decision.
pub type Predicate = Box<dyn Fn(&Context) -> bool + Send + Sync>;

/// Map an (identifier, group) pair to a stable bucket in `[0, 100)`.
///
/// MD5 of `"{group}:{identifier}"`, last four hex characters as a base-16
/// integer, modulo 100. Servers and other clients of the same service bucket
/// identically, so none of this may change.
pub fn normalize(identifier: &str, group: &str) -> u32 {
    let digest = Md5::digest(format!("{group}:{identifier}").as_bytes());
    let encoded = hex::encode(digest);
    u32::from_str_radix(&encoded[encoded.len() - 4..], 16).unwrap_or(0) % 100
}

/// Integer-range entropy source for the random rollout strategy, uniform over
/// `[0, 100)`. Injectable so tests can pin the dice.
pub trait Die: Send + Sync {
    fn roll(&self) -> u32;
}

/// Default entropy source backed by the thread-local generator.
#[derive(Debug, Default)]
pub struct ThreadRngDie;

impl Die for ThreadRngDie {
    fn roll(&self) -> u32 {
        rand::rng().random_range(0..100)
    }
}

/// A named activation strategy: given configuration parameters, produce a
/// predicate over the runtime context.
pub trait Strategy: Send + Sync {
    fn instantiate(&self, parameters: &FxHashMap<String, String>) -> Predicate;
}

fn parse_percentage(raw: Option<&String>) -> u32 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

/// `default`: always on.
struct DefaultStrategy;

impl Strategy for DefaultStrategy {
    fn instantiate(&self, _parameters: &FxHashMap<String, String>) -> Predicate {
        Box::new(|_| true)
    }
}

/// `gradualRolloutRandom`: on with probability `percentage`/100, decided
/// independently per call.
struct GradualRolloutRandom {
    die: Arc<dyn Die>,
}

impl Strategy for GradualRolloutRandom {
    fn instantiate(&self, parameters: &FxHashMap<String, String>) -> Predicate {
        let percentage = parse_percentage(parameters.get("percentage"));
        let die = Arc::clone(&self.die);
        Box::new(move |_| die.roll() < percentage)
    }
}

/// `gradualRolloutUserId` / `gradualRolloutSessionId`: on iff the hash bucket
/// of the keyed context attribute under `groupId` falls below `percentage`.
struct GradualRollout {
    context_key: &'static str,
}

impl Strategy for GradualRollout {
    fn instantiate(&self, parameters: &FxHashMap<String, String>) -> Predicate {
        let group_id = parameters.get("groupId").cloned().unwrap_or_default();
        let percentage = parse_percentage(parameters.get("percentage"));
        let context_key = self.context_key;
        Box::new(move |context| normalize(context.get(context_key), &group_id) < percentage)
    }
}

/// `userWithId` / `remoteAddress` / `applicationHostname`: on iff the keyed
/// context attribute is a member of the comma-separated parameter list.
struct ExplicitSet {
    parameter: &'static str,
    context_key: &'static str,
}

impl Strategy for ExplicitSet {
    fn instantiate(&self, parameters: &FxHashMap<String, String>) -> Predicate {
        let members: FxHashSet<String> = parameters
            .get(self.parameter)
            .map(|raw| raw.split(',').map(str::to_owned).collect())
            .unwrap_or_default();
        let context_key = self.context_key;
        Box::new(move |context| members.contains(context.get(context_key)))
    }
}

/// Name-keyed strategy lookup, pre-populated with the built-ins and open for
/// extension by the embedding application.
pub struct StrategyRegistry {
    strategies: FxHashMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// An empty registry with no strategies at all.
    pub fn empty() -> Self {
        Self {
            strategies: FxHashMap::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::with_die(Arc::new(ThreadRngDie))
    }

    /// The built-in strategies, with the random rollout drawing from `die`.
    pub fn with_die(die: Arc<dyn Die>) -> Self {
        let mut registry = Self::empty();
        registry.register("default", Arc::new(DefaultStrategy));
        registry.register("gradualRolloutRandom", Arc::new(GradualRolloutRandom { die }));
        registry.register(
            "gradualRolloutUserId",
            Arc::new(GradualRollout {
                context_key: "user_id",
            }),
        );
        registry.register(
            "gradualRolloutSessionId",
            Arc::new(GradualRollout {
                context_key: "session_id",
            }),
        );
        registry.register(
            "userWithId",
            Arc::new(ExplicitSet {
                parameter: "userIds",
                context_key: "user_id",
            }),
        );
        registry.register(
            "remoteAddress",
            Arc::new(ExplicitSet {
                parameter: "IPs",
                context_key: "remote_addr",
            }),
        );
        registry.register(
            "applicationHostname",
            Arc::new(ExplicitSet {
                parameter: "hostNames",
                context_key: "host",
            }),
        );
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(name.into(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Strategy>> {
        self.strategies.get(name)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn gate(name: &str, parameters: &[(&str, &str)]) -> Predicate {
        StrategyRegistry::with_defaults()
            .get(name)
            .expect("built-in strategy")
            .instantiate(&params(parameters))
    }

    #[test]
    fn normalize_matches_reference_vectors() {
        let buckets: Vec<u32> = (0..10).map(|i| normalize(&format!("a{i}"), "group")).collect();
        assert_eq!(buckets, vec![59, 67, 9, 27, 69, 82, 53, 39, 76, 18]);
    }

    #[test]
    fn normalize_is_stable_across_calls() {
        assert_eq!(normalize("a1", "group"), normalize("a1", "group"));
    }

    #[test]
    fn default_strategy_always_passes() {
        let gate = gate("default", &[]);
        assert!(gate(&Context::new()));
        assert!(gate(&Context::new().with_user_id("anyone")));
    }

    #[test]
    fn gradual_rollout_user_id_matches_reference_sequence() {
        let gate = gate("gradualRolloutUserId", &[("groupId", "TEST"), ("percentage", "25")]);
        let results: Vec<bool> = (0..10)
            .map(|i| gate(&Context::new().with_user_id(format!("a{i}"))))
            .collect();
        assert_eq!(
            results,
            vec![false, true, false, false, true, false, false, false, false, false]
        );
    }

    #[test]
    fn gradual_rollout_user_id_matches_reference_bitfield() {
        let gate = gate("gradualRolloutUserId", &[("groupId", "TEST"), ("percentage", "25")]);
        let bits: Vec<bool> = (0..100)
            .map(|i| gate(&Context::new().with_user_id(format!("b{i}"))))
            .collect();
        // Pack 8 decisions per byte, matching the recorded service fixture.
        let packed: Vec<u16> = bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .fold(0u16, |acc, &bit| (acc << 1) | u16::from(bit))
            })
            .collect();
        assert_eq!(
            packed,
            vec![0x02, 0x2c, 0x2c, 0x00, 0x4d, 0x09, 0x18, 0xa4, 0x01, 0x00, 0xc0, 0x02, 0x00]
        );
    }

    #[test]
    fn gradual_rollout_session_id_keys_on_session() {
        let by_session =
            gate("gradualRolloutSessionId", &[("groupId", "TEST"), ("percentage", "25")]);
        let by_user = gate("gradualRolloutUserId", &[("groupId", "TEST"), ("percentage", "25")]);
        for i in 0..20 {
            let id = format!("a{i}");
            assert_eq!(
                by_session(&Context::new().with_session_id(&id)),
                by_user(&Context::new().with_user_id(&id)),
            );
        }
        // The session variant ignores user_id entirely.
        assert!(!by_session(&Context::new().with_user_id("a1")));
    }

    #[test]
    fn gradual_rollout_defaults_to_zero_percentage() {
        let gate = gate("gradualRolloutUserId", &[("groupId", "TEST")]);
        assert!((0..50).all(|i| !gate(&Context::new().with_user_id(format!("a{i}")))));
    }

    #[test]
    fn explicit_set_membership() {
        let gate = gate("userWithId", &[("userIds", "able,baker,cast")]);
        assert!(gate(&Context::new().with_user_id("able")));
        assert!(!gate(&Context::new().with_user_id("easy")));
        assert!(!gate(&Context::new().with_attribute("unrelated", "value")));
    }

    #[test]
    fn remote_address_and_hostname_read_their_own_keys() {
        let by_addr = gate("remoteAddress", &[("IPs", "10.0.0.1,10.0.0.2")]);
        assert!(by_addr(&Context::new().with_remote_addr("10.0.0.2")));
        assert!(!by_addr(&Context::new().with_host("10.0.0.2")));

        let by_host = gate("applicationHostname", &[("hostNames", "web-1,web-2")]);
        assert!(by_host(&Context::new().with_host("web-1")));
        assert!(!by_host(&Context::new().with_remote_addr("web-1")));
    }

    #[test]
    fn random_rollout_uses_injected_die() {
        struct FixedDie(u32);
        impl Die for FixedDie {
            fn roll(&self) -> u32 {
                self.0
            }
        }

        let below = StrategyRegistry::with_die(Arc::new(FixedDie(10)))
            .get("gradualRolloutRandom")
            .expect("built-in strategy")
            .instantiate(&params(&[("percentage", "25")]));
        assert!(below(&Context::new()));

        let at = StrategyRegistry::with_die(Arc::new(FixedDie(25)))
            .get("gradualRolloutRandom")
            .expect("built-in strategy")
            .instantiate(&params(&[("percentage", "25")]));
        assert!(!at(&Context::new()));
    }

    #[test]
    fn registry_is_extensible() {
        struct AlwaysOff;
        impl Strategy for AlwaysOff {
            fn instantiate(&self, _parameters: &FxHashMap<String, String>) -> Predicate {
                Box::new(|_| false)
            }
        }

        let mut registry = StrategyRegistry::with_defaults();
        registry.register("alwaysOff", Arc::new(AlwaysOff));
        let gate = registry
            .get("alwaysOff")
            .expect("registered strategy")
            .instantiate(&FxHashMap::default());
        assert!(!gate(&Context::new()));
        assert!(registry.get("default").is_some());
    }
}
