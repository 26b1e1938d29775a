use std::time::Instant;
use tracing::info;

/// Logs the wall-clock duration of a scope when dropped.
pub struct Timer {
    label: &'static str,
    started: Instant,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        info!("Starting: {}", label);
        Self {
            label,
            started: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("Finished: {} (took {:.2?})", self.label, self.started.elapsed());
    }
}

/// Thousands-separated rendering for run summaries.
pub fn fmt_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
