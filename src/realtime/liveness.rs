use std::sync::Arc;
use tokio::sync::watch;

/// Lifetime flag shared between an owner (a view, a CLI session) and the
/// async work it started. Once killed, results that arrive late must be
/// dropped instead of written.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<watch::Sender<bool>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        let (alive, _) = watch::channel(true);
        Self {
            alive: Arc::new(alive),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Irreversible.
    pub fn kill(&self) {
        self.alive.send_replace(false);
    }

    /// Resolves once the flag is killed.
    pub async fn dead(&self) {
        let mut rx = self.alive.subscribe();
        // the sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|alive| !*alive).await;
    }

    /// Kills the flag when dropped.
    pub fn guard(&self) -> LivenessGuard {
        LivenessGuard {
            liveness: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct LivenessGuard {
    liveness: Liveness,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.liveness.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guard_kills_on_drop() {
        let liveness = Liveness::new();
        {
            let _guard = liveness.guard();
            assert!(liveness.is_alive());
        }
        assert!(!liveness.is_alive());
    }

    #[tokio::test]
    async fn test_dead_wakes_waiters() {
        let liveness = Liveness::new();
        let waiter = {
            let liveness = liveness.clone();
            tokio::spawn(async move { liveness.dead().await })
        };

        liveness.kill();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dead_resolves_immediately_when_already_killed() {
        let liveness = Liveness::new();
        liveness.kill();
        liveness.dead().await;
    }
}
