use anyhow::{bail, Result};

use crate::workflow::{can_transition, next_states, BidStatus};

pub struct CheckCommand {
    pub from: BidStatus,
    pub to: BidStatus,
}

impl CheckCommand {
    pub fn new(from: BidStatus, to: BidStatus) -> Self {
        Self { from, to }
    }

    pub async fn execute(&self) -> Result<()> {
        if can_transition(self.from, self.to) {
            println!("✅ {} → {} is allowed", self.from, self.to);
            return Ok(());
        }

        println!("❌ {} → {} is not allowed", self.from, self.to);
        let options: Vec<&str> = next_states(self.from).iter().map(|s| s.as_str()).collect();
        if options.is_empty() {
            println!("   🏁 {} is terminal", self.from);
        } else {
            println!("   💡 From {} a bid can move to: {}", self.from, options.join(", "));
        }
        bail!("forbidden transition {} -> {}", self.from, self.to)
    }
}
