//! Force-close event channel (spec §9 redesign note): the brain and the
//! Risk & Emergency Layer need to demand an immediate close without holding
//! a back-reference into the Exit Optimizer. Publishing a request here and
//! letting every per-position monitor subscribe breaks that cycle while
//! preserving the invariant that only the optimizer ever closes a position.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::trading::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceCloseReason {
    EmergencyBlock,
    CircuitBreaker,
}

/// `position_id`/`side` narrow the request; leaving either `None` broadcasts
/// to every open position on `symbol` (e.g. a side-specific reversal block
/// force-closing every open SHORT on that symbol).
#[derive(Debug, Clone)]
pub struct ForceCloseRequest {
    pub position_id: Option<Uuid>,
    pub symbol: String,
    pub side: Option<Side>,
    pub reason: ForceCloseReason,
}

impl ForceCloseRequest {
    pub fn matches(&self, symbol: &str, side: Side, position_id: Uuid) -> bool {
        if self.symbol != symbol {
            return false;
        }
        if let Some(s) = self.side {
            if s != side {
                return false;
            }
        }
        if let Some(id) = self.position_id {
            if id != position_id {
                return false;
            }
        }
        true
    }
}

const DEFAULT_CAPACITY: usize = 64;

/// One bus per running engine. Each per-position monitor task holds its own
/// `subscribe()`d receiver; a lagged receiver (monitor briefly offline
/// during a respawn) simply resumes from the next published event rather
/// than erroring, since a missed force-close is also re-armed on the next
/// emergency-layer tick.
pub struct ForceCloseBus {
    sender: broadcast::Sender<ForceCloseRequest>,
}

impl ForceCloseBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, request: ForceCloseRequest) {
        // No receivers yet (engine still starting up) is not an error.
        let _ = self.sender.send(request);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ForceCloseRequest> {
        self.sender.subscribe()
    }
}

impl Default for ForceCloseBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_matches_narrows_on_position_and_side() {
        let position_id = Uuid::new_v4();
        let request = ForceCloseRequest {
            position_id: Some(position_id),
            symbol: "BTC/USDT".to_string(),
            side: Some(Side::Long),
            reason: ForceCloseReason::EmergencyBlock,
        };
        assert!(request.matches("BTC/USDT", Side::Long, position_id));
        assert!(!request.matches("BTC/USDT", Side::Short, position_id));
        assert!(!request.matches("BTC/USDT", Side::Long, Uuid::new_v4()));
        assert!(!request.matches("ETH/USDT", Side::Long, position_id));
    }

    #[test]
    fn symbol_wide_request_matches_any_position() {
        let request = ForceCloseRequest {
            position_id: None,
            symbol: "BTC/USDT".to_string(),
            side: Some(Side::Short),
            reason: ForceCloseReason::CircuitBreaker,
        };
        assert!(request.matches("BTC/USDT", Side::Short, Uuid::new_v4()));
        assert!(!request.matches("BTC/USDT", Side::Long, Uuid::new_v4()));
    }

    #[tokio::test]
    async fn published_request_reaches_subscriber() {
        let bus = ForceCloseBus::new();
        let mut rx = bus.subscribe();
        bus.publish(ForceCloseRequest {
            position_id: None,
            symbol: "BTC/USDT".to_string(),
            side: None,
            reason: ForceCloseReason::EmergencyBlock,
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.symbol, "BTC/USDT");
    }
}
