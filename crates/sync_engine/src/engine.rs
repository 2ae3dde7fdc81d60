//! Two-way PTP-style offset estimation, one state machine per node.
//!
//! Four timestamps drive one exchange: `t1` (gateway transmits SYNC_REQ),
//! `t2` (node receives it), `t3` (node transmits SYNC_RESP), `t4` (gateway
//! receives it). `t1`..`t3` travel on the wire inside [`mash_wire::SyncRespFrame`];
//! `t4` is stamped by the gateway the instant the response lands.

use mash_types::{NodeId, SyncSnapshot};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct SyncEngineConfig {
    /// EMA smoothing factor, applied to every post-bootstrap exchange.
    pub alpha: f64,
    /// Exchanges implying a negative or implausibly large path delay are
    /// discarded outright.
    pub path_delay_ceiling_us: i64,
    /// Post-bootstrap exchanges whose raw offset jumps further than this
    /// from the current smoothed offset are discarded as step noise.
    pub step_threshold_us: i64,
    /// Number of leading exchanges that bypass step-rejection and set
    /// `smoothed` directly, to converge quickly from a cold start.
    pub bootstrap_samples: u8,
    /// Consecutive rejections before a node is flagged faulted and forced
    /// back into bootstrap.
    pub max_consecutive_rejects: u32,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            alpha: 0.125,
            path_delay_ceiling_us: 50_000,
            step_threshold_us: 5_000,
            bootstrap_samples: 3,
            max_consecutive_rejects: 5,
        }
    }
}

/// The four raw timestamps of one exchange, in gateway-clock-for-t1/t4 and
/// node-clock-for-t2/t3 domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpExchange {
    pub t1_us: u64,
    pub t2_us: u64,
    pub t3_us: u64,
    pub t4_us: u64,
}

/// Outcome of feeding one [`PtpExchange`] to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExchangeOutcome {
    /// Accepted and applied; `smoothed_offset_us` now reflects it.
    Accepted {
        offset_raw_us: i64,
        path_delay_us: i64,
        smoothed_offset_us: i64,
    },
    /// Discarded: implied path delay was negative or past the ceiling.
    RejectedPathDelay { path_delay_us: i64 },
    /// Discarded: raw offset stepped too far from the current smoothed value.
    RejectedStep { offset_raw_us: i64, delta_us: i64 },
}

#[derive(Debug, Clone, Default)]
struct NodeState {
    smoothed_offset_us: i64,
    last_raw_offset_us: i64,
    last_path_delay_us: i64,
    bootstrap_remaining: u8,
    consecutive_rejects: u32,
    sync_fault: bool,
}

impl NodeState {
    fn fresh(bootstrap_samples: u8) -> Self {
        Self {
            bootstrap_remaining: bootstrap_samples,
            ..Default::default()
        }
    }
}

/// Owns per-node PTP state. Nothing outside this engine may mutate a
/// node's smoothed offset; other components read it through
/// [`SyncEngine::snapshot`].
pub struct SyncEngine {
    config: SyncEngineConfig,
    nodes: HashMap<NodeId, NodeState>,
}

impl SyncEngine {
    pub fn new(config: SyncEngineConfig) -> Self {
        Self {
            config,
            nodes: HashMap::new(),
        }
    }

    fn state_mut(&mut self, node_id: NodeId) -> &mut NodeState {
        self.nodes
            .entry(node_id)
            .or_insert_with(|| NodeState::fresh(self.config.bootstrap_samples))
    }

    /// Feeds one completed two-way exchange for `node_id`. On acceptance,
    /// both the raw and smoothed offsets are updated together — never one
    /// without the other.
    pub fn process_exchange(&mut self, node_id: NodeId, ex: PtpExchange) -> ExchangeOutcome {
        let offset_raw_us = ((ex.t2_us as i64 - ex.t1_us as i64) + (ex.t3_us as i64 - ex.t4_us as i64)) / 2;
        let path_delay_us = ((ex.t4_us as i64 - ex.t1_us as i64) - (ex.t3_us as i64 - ex.t2_us as i64)) / 2;

        if path_delay_us < 0 || path_delay_us > self.config.path_delay_ceiling_us {
            self.reject(node_id);
            warn!(%node_id, path_delay_us, "sync exchange rejected: path delay out of range");
            return ExchangeOutcome::RejectedPathDelay { path_delay_us };
        }

        let bootstrap_samples = self.config.bootstrap_samples;
        let alpha = self.config.alpha;
        let step_threshold_us = self.config.step_threshold_us;
        let state = self.state_mut(node_id);

        if state.bootstrap_remaining == 0 {
            let delta_us = (offset_raw_us - state.smoothed_offset_us).abs();
            if delta_us > step_threshold_us {
                state.consecutive_rejects += 1;
                if state.consecutive_rejects > self.config.max_consecutive_rejects {
                    state.sync_fault = true;
                    state.bootstrap_remaining = bootstrap_samples;
                    warn!(%node_id, "sync fault: too many consecutive rejects, forcing rebootstrap");
                }
                return ExchangeOutcome::RejectedStep {
                    offset_raw_us,
                    delta_us,
                };
            }
        }

        state.consecutive_rejects = 0;
        state.sync_fault = false;
        state.last_raw_offset_us = offset_raw_us;
        state.last_path_delay_us = path_delay_us;

        if state.bootstrap_remaining > 0 {
            state.smoothed_offset_us = offset_raw_us;
            state.bootstrap_remaining -= 1;
        } else {
            let delta = offset_raw_us as f64 - state.smoothed_offset_us as f64;
            state.smoothed_offset_us = (state.smoothed_offset_us as f64 + alpha * delta).round() as i64;
        }

        debug!(%node_id, offset_raw_us, path_delay_us, smoothed = state.smoothed_offset_us, "sync exchange accepted");

        ExchangeOutcome::Accepted {
            offset_raw_us,
            path_delay_us,
            smoothed_offset_us: state.smoothed_offset_us,
        }
    }

    fn reject(&mut self, node_id: NodeId) {
        let max = self.config.max_consecutive_rejects;
        let bootstrap_samples = self.config.bootstrap_samples;
        let state = self.state_mut(node_id);
        state.consecutive_rejects += 1;
        if state.consecutive_rejects > max {
            state.sync_fault = true;
            state.bootstrap_remaining = bootstrap_samples;
        }
    }

    pub fn smoothed_offset_us(&self, node_id: NodeId) -> i64 {
        self.nodes.get(&node_id).map(|s| s.smoothed_offset_us).unwrap_or(0)
    }

    pub fn snapshot(&self, node_id: NodeId) -> SyncSnapshot {
        match self.nodes.get(&node_id) {
            Some(s) => SyncSnapshot {
                smoothed_offset_us: s.smoothed_offset_us,
                last_raw_offset_us: s.last_raw_offset_us,
                last_path_delay_us: s.last_path_delay_us,
                bootstrap_remaining: s.bootstrap_remaining,
                consecutive_rejects: s.consecutive_rejects,
                sync_fault: s.sync_fault,
            },
            None => SyncSnapshot::default(),
        }
    }

    /// Drops all state for a node, e.g. after the topology prunes it.
    pub fn forget(&mut self, node_id: NodeId) {
        self.nodes.remove(&node_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mash_types::NodeId;

    fn node() -> NodeId {
        NodeId::new(1).unwrap()
    }

    #[test]
    fn bootstrap_sets_smoothed_directly() {
        let mut engine = SyncEngine::new(SyncEngineConfig {
            bootstrap_samples: 1,
            ..Default::default()
        });
        let ex = PtpExchange {
            t1_us: 1_000,
            t2_us: 2_200,
            t3_us: 2_250,
            t4_us: 1_300,
        };
        let outcome = engine.process_exchange(node(), ex);
        match outcome {
            ExchangeOutcome::Accepted {
                smoothed_offset_us, ..
            } => {
                let snap = engine.snapshot(node());
                assert_eq!(snap.smoothed_offset_us, smoothed_offset_us);
                assert_eq!(snap.bootstrap_remaining, 0);
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn every_accepted_exchange_updates_raw_and_smoothed_together() {
        // Canonical regression: both fields must move together on every
        // successful exchange, never just one of them.
        let mut engine = SyncEngine::new(SyncEngineConfig {
            bootstrap_samples: 1,
            alpha: 0.5,
            ..Default::default()
        });
        let first = PtpExchange {
            t1_us: 1_000,
            t2_us: 2_200,
            t3_us: 2_250,
            t4_us: 1_300,
        };
        engine.process_exchange(node(), first);
        let before = engine.snapshot(node());

        let second = PtpExchange {
            t1_us: 10_000,
            t2_us: 11_500,
            t3_us: 11_550,
            t4_us: 10_300,
        };
        let outcome = engine.process_exchange(node(), second);
        let after = engine.snapshot(node());

        match outcome {
            ExchangeOutcome::Accepted { .. } => {
                assert_ne!(after.last_raw_offset_us, 0);
                assert_ne!(
                    (before.smoothed_offset_us, before.last_raw_offset_us),
                    (after.smoothed_offset_us, after.last_raw_offset_us)
                );
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn negative_path_delay_is_rejected() {
        let mut engine = SyncEngine::new(SyncEngineConfig::default());
        let ex = PtpExchange {
            t1_us: 10_000,
            t2_us: 9_000,
            t3_us: 9_050,
            t4_us: 9_200,
        };
        let outcome = engine.process_exchange(node(), ex);
        assert!(matches!(outcome, ExchangeOutcome::RejectedPathDelay { .. }));
    }

    #[test]
    fn step_rejection_after_bootstrap() {
        let mut engine = SyncEngine::new(SyncEngineConfig {
            bootstrap_samples: 1,
            step_threshold_us: 100,
            ..Default::default()
        });
        engine.process_exchange(
            node(),
            PtpExchange {
                t1_us: 1_000,
                t2_us: 2_200,
                t3_us: 2_250,
                t4_us: 1_300,
            },
        );
        // A wildly different offset should be rejected as a step once bootstrapped.
        let outcome = engine.process_exchange(
            node(),
            PtpExchange {
                t1_us: 1_000,
                t2_us: 50_000,
                t3_us: 50_050,
                t4_us: 1_300,
            },
        );
        assert!(matches!(outcome, ExchangeOutcome::RejectedStep { .. }));
    }

    #[test]
    fn consecutive_rejects_force_sync_fault_and_rebootstrap() {
        let mut engine = SyncEngine::new(SyncEngineConfig {
            bootstrap_samples: 1,
            step_threshold_us: 100,
            max_consecutive_rejects: 2,
            ..Default::default()
        });
        engine.process_exchange(
            node(),
            PtpExchange {
                t1_us: 1_000,
                t2_us: 2_200,
                t3_us: 2_250,
                t4_us: 1_300,
            },
        );
        for _ in 0..3 {
            engine.process_exchange(
                node(),
                PtpExchange {
                    t1_us: 1_000,
                    t2_us: 80_000,
                    t3_us: 80_050,
                    t4_us: 1_300,
                },
            );
        }
        let snap = engine.snapshot(node());
        assert!(snap.sync_fault);
        assert_eq!(snap.bootstrap_remaining, 1);
    }
}
