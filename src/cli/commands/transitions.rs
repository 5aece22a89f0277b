use anyhow::Result;

use crate::workflow::{is_terminal, next_states_str, workflow_steps, BidStatus};

pub struct TransitionsCommand {
    pub status: String,
}

impl TransitionsCommand {
    pub fn new(status: String) -> Self {
        Self { status }
    }

    /// Lines to print; unknown statuses simply have no successors.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let Ok(current) = self.status.parse::<BidStatus>() else {
            lines.push(format!("❓ '{}' is not a known status; no transitions", self.status));
            let known: Vec<&str> = workflow_steps()
                .iter()
                .map(|step| step.status.as_str())
                .collect();
            lines.push(format!("   Known statuses: {}", known.join(", ")));
            return lines;
        };

        lines.push(format!("📍 {} ({})", current.display_name(), current));
        if is_terminal(current) {
            lines.push("   🏁 Terminal status, no further transitions".to_string());
            return lines;
        }
        for next in next_states_str(&self.status) {
            lines.push(format!("   → {} ({})", next.display_name(), next));
        }
        lines
    }

    pub async fn execute(&self) -> Result<()> {
        for line in self.render() {
            println!("{line}");
        }
        Ok(())
    }
}
